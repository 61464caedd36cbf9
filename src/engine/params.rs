//! Engine parameters
//!
//! The single governance-owned record of tunables: smoothing factors for
//! the EMA tracks, the risk-signal weights and thresholds, and the pause
//! switch. Only the configured authority may mutate it, every successful
//! mutation bumps `version`, and updates arrive as a sparse patch where an
//! absent field means "leave unchanged" — never a zero sentinel.

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use crate::identity::Identity;

/// Smoothing factors are basis points of the fixed-point scale.
pub const ALPHA_MAX: u16 = super::fixed::SCALE;

/// Each risk weight is capped so no single signal can dominate the blend.
pub const WEIGHT_MAX: u8 = 50;

/// Versioned, authority-gated engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Only this identity may mutate the record.
    pub authority: Identity,

    // EMA smoothing factors (basis points, 1..=10000)
    pub alpha_fast: u16,
    pub alpha_slow: u16,
    pub alpha_volatility: u16,
    pub alpha_arrival: u16,

    // Risk-signal weights (each 0..=50)
    pub weight_sybil: u8,
    pub weight_burst: u8,
    pub weight_stagnation: u8,
    pub weight_shock: u8,
    pub weight_volatility: u8,
    pub weight_arrival: u8,

    // Signal thresholds
    /// Diversity ratio (0-100 percent terms) below which volume looks sybil.
    pub diversity_threshold: u8,
    /// Burst pressure (0-255) above which repeat callers look coordinated.
    pub burst_threshold: u8,
    /// Fast/slow EMA gap (0-10000) that reads as a reputation shock.
    pub shock_threshold: u16,
    /// Smoothed deviation (0-10000) that reads as sustained volatility.
    pub volatility_threshold: u16,

    /// Rejects every mutating call while set.
    pub paused: bool,
    /// Increments on every successful update.
    pub version: u64,
}

impl EngineParams {
    pub fn new(authority: Identity) -> Self {
        Self {
            authority,
            alpha_fast: 3000,
            alpha_slow: 500,
            alpha_volatility: 2000,
            alpha_arrival: 2000,
            weight_sybil: 25,
            weight_burst: 20,
            weight_stagnation: 10,
            weight_shock: 20,
            weight_volatility: 15,
            weight_arrival: 10,
            diversity_threshold: 50,
            burst_threshold: 200,
            shock_threshold: 2500,
            volatility_threshold: 1500,
            paused: false,
            version: 0,
        }
    }

    /// Apply a sparse patch. The whole patch is validated before any field
    /// is assigned, so a bad value leaves the record (and `version`)
    /// untouched.
    pub fn apply_patch(&mut self, patch: &ParamsPatch) -> Result<u64, EngineError> {
        patch.validate()?;

        if let Some(v) = patch.alpha_fast {
            self.alpha_fast = v;
        }
        if let Some(v) = patch.alpha_slow {
            self.alpha_slow = v;
        }
        if let Some(v) = patch.alpha_volatility {
            self.alpha_volatility = v;
        }
        if let Some(v) = patch.alpha_arrival {
            self.alpha_arrival = v;
        }
        if let Some(v) = patch.weight_sybil {
            self.weight_sybil = v;
        }
        if let Some(v) = patch.weight_burst {
            self.weight_burst = v;
        }
        if let Some(v) = patch.weight_stagnation {
            self.weight_stagnation = v;
        }
        if let Some(v) = patch.weight_shock {
            self.weight_shock = v;
        }
        if let Some(v) = patch.weight_volatility {
            self.weight_volatility = v;
        }
        if let Some(v) = patch.weight_arrival {
            self.weight_arrival = v;
        }
        if let Some(v) = patch.diversity_threshold {
            self.diversity_threshold = v;
        }
        if let Some(v) = patch.burst_threshold {
            self.burst_threshold = v;
        }
        if let Some(v) = patch.shock_threshold {
            self.shock_threshold = v;
        }
        if let Some(v) = patch.volatility_threshold {
            self.volatility_threshold = v;
        }
        if let Some(v) = patch.paused {
            self.paused = v;
        }

        self.version += 1;
        Ok(self.version)
    }
}

/// Sparse update for `EngineParams`: `None` means "leave unchanged".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ParamsPatch {
    pub alpha_fast: Option<u16>,
    pub alpha_slow: Option<u16>,
    pub alpha_volatility: Option<u16>,
    pub alpha_arrival: Option<u16>,
    pub weight_sybil: Option<u8>,
    pub weight_burst: Option<u8>,
    pub weight_stagnation: Option<u8>,
    pub weight_shock: Option<u8>,
    pub weight_volatility: Option<u8>,
    pub weight_arrival: Option<u8>,
    pub diversity_threshold: Option<u8>,
    pub burst_threshold: Option<u8>,
    pub shock_threshold: Option<u16>,
    pub volatility_threshold: Option<u16>,
    pub paused: Option<bool>,
}

impl ParamsPatch {
    /// A patch that only toggles the pause switch.
    pub fn pause(paused: bool) -> Self {
        Self {
            paused: Some(paused),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        for alpha in [
            self.alpha_fast,
            self.alpha_slow,
            self.alpha_volatility,
            self.alpha_arrival,
        ]
        .into_iter()
        .flatten()
        {
            if alpha == 0 || alpha > ALPHA_MAX {
                return Err(EngineError::InvalidParameter);
            }
        }

        for weight in [
            self.weight_sybil,
            self.weight_burst,
            self.weight_stagnation,
            self.weight_shock,
            self.weight_volatility,
            self.weight_arrival,
        ]
        .into_iter()
        .flatten()
        {
            if weight > WEIGHT_MAX {
                return Err(EngineError::InvalidParameter);
            }
        }

        if let Some(v) = self.diversity_threshold {
            if v > 100 {
                return Err(EngineError::InvalidParameter);
            }
        }
        for threshold in [self.shock_threshold, self.volatility_threshold]
            .into_iter()
            .flatten()
        {
            if threshold > ALPHA_MAX {
                return Err(EngineError::InvalidParameter);
            }
        }
        // burst_threshold spans the full u8 range; nothing to reject.

        Ok(())
    }
}
