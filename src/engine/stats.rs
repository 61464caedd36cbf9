//! Per-agent reputation record and the core update algorithm
//!
//! `ReputationStats` is the engine's only mutable aggregate: a compact,
//! lossy rolling summary of every feedback an agent has ever received.
//! Each accepted feedback moves the dual EMA tracks, the score bounds, the
//! burst ring and the diversity estimator, then rederives the published
//! outputs (quality, risk, confidence, trust tier) from engine parameters.
//! Everything is integer fixed point, so the same event sequence always
//! produces the same record bytes.
//!
//! Callers stage updates on a copy of the record and commit only on
//! success; `apply` validates before it mutates, so a rejected event never
//! leaves a half-written record even without staging.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::EngineError;
use super::fixed::{checked_increment, ema_step, ilog2_safe, score_points};
use super::hll::Hll;
use super::params::EngineParams;
use crate::identity::Identity;

/// Scores live in 0..=100.
pub const SCORE_MAX: u8 = 100;

/// Agents below this feedback volume stay `Unrated`.
pub const MIN_RATED_FEEDBACK: u64 = 5;

/// Record layout version, bumped on incompatible changes.
pub const SCHEMA_VERSION: u8 = 1;

/// Seed prefix for derived record addresses.
const RECORD_SEED: &[u8] = b"rep_stats";

/// Arrival-log EMA ceiling (ilog2 of the sequence gap, in track units).
const ARRIVAL_LOG_CEILING: u16 = 1500;

/// Smoothed arrival-log below this reads as machine-speed submissions.
const ARRIVAL_RISK_CEILING: u16 = 100;

/// Drawdown from the historical peak that reads as decay/stagnation.
const DRAWDOWN_RISK_FLOOR: u16 = 2500;

/// Ordinal trust classification derived from the quality/risk/confidence
/// signals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum TrustTier {
    #[default]
    Unrated,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl TrustTier {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// One feedback flowing through the update path. Live submissions and
/// replayed history use the same shape.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackEvent {
    /// Hashed client identity; the raw identity is never stored.
    pub commitment: [u8; 32],
    /// Score in 0..=100.
    pub score: u8,
    /// Position in the serialized event sequence.
    pub sequence: u64,
}

/// Derived outputs returned to the caller after a successful update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub feedback_index: u64,
    pub trust_tier: TrustTier,
    pub quality_score: u16,
    pub risk_score: u8,
    pub confidence: u16,
    pub diversity_ratio: u8,
    /// True when the diversity estimator grew (likely new unique client).
    pub hll_changed: bool,
}

/// Rolling reputation aggregate for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationStats {
    /// The agent this record summarizes.
    pub agent: Identity,
    /// Derived record address: `Sha256("rep_stats" || agent)`.
    #[serde(with = "crate::identity::hex32")]
    pub record_key: [u8; 32],
    pub schema_version: u8,

    /// Total accepted feedbacks. Monotonic; revocation upstream never
    /// rolls it back.
    pub feedback_count: u64,

    // Score bounds (0-100)
    pub first_score: u8,
    pub last_score: u8,
    pub min_score: u8,
    pub max_score: u8,

    // EMA tracks (0-10000)
    pub ema_score_fast: u16,
    pub ema_score_slow: u16,
    /// Smoothed |fast - slow|.
    pub ema_volatility: u16,
    /// Smoothed ilog2 of the sequence gap between feedbacks.
    pub ema_arrival_log: u16,
    /// Historical peak of the slow track.
    pub peak_ema: u16,
    /// Worst peak-to-current drop of the slow track.
    pub max_drawdown: u16,

    // Burst detection
    /// Fingerprints of the three most recent callers.
    pub recent_callers: [u16; 3],
    /// EMA of repeat-caller pressure (0-255).
    pub burst_pressure: u8,
    /// Updates since the diversity estimator last grew.
    pub updates_since_hll_change: u8,

    // Diversity
    pub hll: Hll,
    pub diversity_ratio: u8,

    // Derived outputs
    pub quality_score: u16,
    pub risk_score: u8,
    pub confidence: u16,
    pub trust_tier: TrustTier,

    // Sequencing
    pub first_event_seq: u64,
    pub last_event_seq: u64,
}

impl ReputationStats {
    /// Fresh, zeroed record. The first `apply` call initializes it.
    pub fn new(agent: Identity) -> Self {
        Self {
            agent,
            record_key: derive_record_key(&agent),
            schema_version: SCHEMA_VERSION,
            feedback_count: 0,
            first_score: 0,
            last_score: 0,
            min_score: 0,
            max_score: 0,
            ema_score_fast: 0,
            ema_score_slow: 0,
            ema_volatility: 0,
            ema_arrival_log: 0,
            peak_ema: 0,
            max_drawdown: 0,
            recent_callers: [0; 3],
            burst_pressure: 0,
            updates_since_hll_change: 0,
            hll: Hll::new(),
            diversity_ratio: 0,
            quality_score: 0,
            risk_score: 0,
            confidence: 0,
            trust_tier: TrustTier::Unrated,
            first_event_seq: 0,
            last_event_seq: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.feedback_count > 0
    }

    /// Apply one feedback event. Validation happens before any field is
    /// touched; arithmetic faults abort with the record conceptually
    /// unchanged (callers commit a staged copy).
    pub fn apply(
        &mut self,
        event: &FeedbackEvent,
        params: &EngineParams,
    ) -> Result<UpdateOutcome, EngineError> {
        if event.score > SCORE_MAX {
            return Err(EngineError::InvalidScore);
        }

        let hll_changed = if self.is_initialized() {
            self.update(event, params)?
        } else {
            self.initialize(event)
        };

        self.diversity_ratio = self.hll.diversity_ratio(self.feedback_count);
        self.derive_signals(params);

        Ok(UpdateOutcome {
            feedback_index: self.feedback_count,
            trust_tier: self.trust_tier,
            quality_score: self.quality_score,
            risk_score: self.risk_score,
            confidence: self.confidence,
            diversity_ratio: self.diversity_ratio,
            hll_changed,
        })
    }

    /// First feedback seeds every track at the observed score.
    fn initialize(&mut self, event: &FeedbackEvent) -> bool {
        let pts = score_points(event.score);

        self.feedback_count = 1;
        self.first_score = event.score;
        self.last_score = event.score;
        self.min_score = event.score;
        self.max_score = event.score;
        self.ema_score_fast = pts;
        self.ema_score_slow = pts;
        self.peak_ema = pts;
        self.first_event_seq = event.sequence;
        self.last_event_seq = event.sequence;

        push_caller(&mut self.recent_callers, fingerprint16(&event.commitment));
        self.hll.observe(&event.commitment)
    }

    fn update(
        &mut self,
        event: &FeedbackEvent,
        params: &EngineParams,
    ) -> Result<bool, EngineError> {
        let pts = score_points(event.score);

        self.feedback_count = checked_increment(self.feedback_count)?;
        self.last_score = event.score;
        self.min_score = self.min_score.min(event.score);
        self.max_score = self.max_score.max(event.score);

        self.ema_score_fast = ema_step(self.ema_score_fast, pts, params.alpha_fast)?;
        self.ema_score_slow = ema_step(self.ema_score_slow, pts, params.alpha_slow)?;

        let deviation = self.ema_score_fast.abs_diff(self.ema_score_slow);
        self.ema_volatility = ema_step(self.ema_volatility, deviation, params.alpha_volatility)?;

        self.peak_ema = self.peak_ema.max(self.ema_score_slow);
        self.max_drawdown = self.max_drawdown.max(self.peak_ema - self.ema_score_slow);

        let gap = event.sequence.saturating_sub(self.last_event_seq);
        let arrival = (u16::from(ilog2_safe(gap)) * 100).min(ARRIVAL_LOG_CEILING);
        self.ema_arrival_log = ema_step(self.ema_arrival_log, arrival, params.alpha_arrival)?;
        self.last_event_seq = event.sequence;

        let fp = fingerprint16(&event.commitment);
        if is_recent_caller(&self.recent_callers, fp) {
            self.burst_pressure += (255 - self.burst_pressure) >> 2;
        } else {
            self.burst_pressure -= self.burst_pressure >> 2;
        }
        push_caller(&mut self.recent_callers, fp);

        let hll_changed = self.hll.observe(&event.commitment);
        self.updates_since_hll_change = if hll_changed {
            0
        } else {
            self.updates_since_hll_change.saturating_add(1)
        };

        Ok(hll_changed)
    }

    /// Rederive the published outputs from the raw tracks. Every
    /// coefficient comes from `EngineParams`, so the outputs are
    /// reproducible from (params version, event sequence).
    fn derive_signals(&mut self, params: &EngineParams) {
        let shock_gap = self.ema_score_fast.abs_diff(self.ema_score_slow);

        let mut risk: u32 = 0;
        if self.feedback_count >= MIN_RATED_FEEDBACK {
            // Sybil: feedback volume without client diversity.
            let diversity_pct = u32::from(self.diversity_ratio) * 100 / 255;
            if diversity_pct < u32::from(params.diversity_threshold) {
                risk += u32::from(params.weight_sybil);
            }
            // Arrival: sustained machine-speed submission cadence.
            if self.ema_arrival_log < ARRIVAL_RISK_CEILING {
                risk += u32::from(params.weight_arrival);
            }
        }
        if self.burst_pressure > params.burst_threshold {
            risk += u32::from(params.weight_burst);
        }
        if shock_gap > params.shock_threshold {
            risk += u32::from(params.weight_shock);
        }
        if self.ema_volatility > params.volatility_threshold {
            risk += u32::from(params.weight_volatility);
        }
        if self.max_drawdown > DRAWDOWN_RISK_FLOOR {
            risk += u32::from(params.weight_stagnation);
        }
        self.risk_score = risk.min(100) as u8;

        // Quality: the long-run track, damped while behavior is unstable.
        self.quality_score = self.ema_score_slow.saturating_sub(self.ema_volatility / 2);

        // Confidence grows with sample size and client diversity.
        let volume = self.feedback_count.min(50) as u32 * 120;
        let diversity = u32::from(self.diversity_ratio) * 4000 / 255;
        self.confidence = (volume + diversity).min(10_000) as u16;

        self.trust_tier = if self.feedback_count < MIN_RATED_FEEDBACK {
            TrustTier::Unrated
        } else if self.quality_score >= 8500 && self.confidence >= 6000 && self.risk_score < 20 {
            TrustTier::Platinum
        } else if self.quality_score >= 7000 && self.confidence >= 4000 && self.risk_score < 35 {
            TrustTier::Gold
        } else if self.quality_score >= 5000 && self.confidence >= 2500 && self.risk_score < 50 {
            TrustTier::Silver
        } else {
            TrustTier::Bronze
        };
    }
}

/// Record address derivation: independent keyed records joined by the
/// agent identifier, never an owning pointer.
pub fn derive_record_key(agent: &Identity) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(RECORD_SEED);
    hasher.update(agent.as_bytes());
    hasher.finalize().into()
}

/// 16-bit caller fingerprint via splitmix64 over the commitment prefix.
fn fingerprint16(commitment: &[u8; 32]) -> u16 {
    let mut z = u64::from_le_bytes(commitment[0..8].try_into().expect("8-byte slice"));
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    ((z ^ (z >> 31)) & 0xFFFF) as u16
}

fn is_recent_caller(recent: &[u16; 3], fp: u16) -> bool {
    recent[0] == fp || recent[1] == fp || recent[2] == fp
}

fn push_caller(recent: &mut [u16; 3], fp: u16) {
    recent[2] = recent[1];
    recent[1] = recent[0];
    recent[0] = fp;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EngineParams {
        EngineParams::new(Identity([0xAA; 32]))
    }

    fn commitment(seed: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(seed.to_le_bytes());
        hasher.finalize().into()
    }

    fn event(seed: u64, score: u8, sequence: u64) -> FeedbackEvent {
        FeedbackEvent {
            commitment: commitment(seed),
            score,
            sequence,
        }
    }

    fn agent() -> Identity {
        Identity([0x11; 32])
    }

    #[test]
    fn test_first_feedback_initializes() {
        let mut stats = ReputationStats::new(agent());
        assert!(!stats.is_initialized());

        let outcome = stats.apply(&event(1, 80, 1), &params()).unwrap();

        assert_eq!(stats.feedback_count, 1);
        assert_eq!(stats.first_score, 80);
        assert_eq!(stats.last_score, 80);
        assert_eq!(stats.min_score, 80);
        assert_eq!(stats.max_score, 80);
        assert_eq!(stats.ema_score_fast, 8000);
        assert_eq!(stats.ema_score_slow, 8000);
        assert_eq!(stats.first_event_seq, 1);
        assert!(outcome.hll_changed);
    }

    #[test]
    fn test_min_max_bracket_scores() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        for (i, score) in [60u8, 20, 95, 40].into_iter().enumerate() {
            stats.apply(&event(i as u64, score, i as u64 + 1), &p).unwrap();
        }
        assert_eq!(stats.min_score, 20);
        assert_eq!(stats.max_score, 95);
        assert_eq!(stats.last_score, 40);
        assert!(stats.min_score <= stats.max_score);
    }

    #[test]
    fn test_invalid_score_rejected_before_mutation() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        stats.apply(&event(1, 50, 1), &p).unwrap();
        let before = stats;

        assert_eq!(
            stats.apply(&event(2, 101, 2), &p),
            Err(EngineError::InvalidScore)
        );
        assert_eq!(stats, before);
    }

    #[test]
    fn test_fast_ema_reacts_and_recedes() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        stats.apply(&event(1, 50, 1), &p).unwrap();

        stats.apply(&event(2, 100, 2), &p).unwrap();
        let after_high = stats.ema_score_fast;
        // 5000 + (10000 - 5000) * 0.30
        assert_eq!(after_high, 6500);

        stats.apply(&event(3, 0, 3), &p).unwrap();
        let after_low = stats.ema_score_fast;
        assert!(after_low < after_high);
        assert_eq!(after_low, 4550);
    }

    #[test]
    fn test_slow_ema_smooths_harder_than_fast() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        stats.apply(&event(1, 50, 1), &p).unwrap();
        stats.apply(&event(2, 100, 2), &p).unwrap();

        // alpha 0.05 moves 250; alpha 0.30 moves 1500.
        assert_eq!(stats.ema_score_slow, 5250);
        assert!(stats.ema_score_fast > stats.ema_score_slow);
    }

    #[test]
    fn test_single_client_volume_flags_sybil() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        for seq in 1..=6u64 {
            // Same commitment every time.
            stats.apply(&event(42, 80, seq), &p).unwrap();
        }

        assert!(stats.diversity_ratio < 100);
        // Sybil weight is in the blend once volume crosses the floor.
        assert!(stats.risk_score >= p.weight_sybil);
    }

    #[test]
    fn test_diverse_clients_stay_clean() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        for seq in 1..=5u64 {
            stats.apply(&event(seq, 80, seq), &p).unwrap();
        }

        assert!(stats.diversity_ratio >= 200);
        assert!(stats.risk_score < p.weight_sybil);
    }

    #[test]
    fn test_burst_pressure_builds_on_repeat_callers() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        for seq in 1..=8u64 {
            stats.apply(&event(7, 80, seq), &p).unwrap();
        }
        let repeated = stats.burst_pressure;

        let mut diverse = ReputationStats::new(agent());
        for seq in 1..=8u64 {
            diverse.apply(&event(seq, 80, seq), &p).unwrap();
        }

        assert!(repeated > 100);
        assert_eq!(diverse.burst_pressure, 0);
    }

    #[test]
    fn test_consistent_history_reaches_platinum() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        for seq in 1..=20u64 {
            stats.apply(&event(seq, 95, seq), &p).unwrap();
        }

        assert_eq!(stats.quality_score, 9500);
        assert!(stats.confidence >= 6000);
        assert_eq!(stats.trust_tier, TrustTier::Platinum);
    }

    #[test]
    fn test_low_volume_stays_unrated() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        for seq in 1..=(MIN_RATED_FEEDBACK - 1) {
            stats.apply(&event(seq, 95, seq), &p).unwrap();
        }
        assert_eq!(stats.trust_tier, TrustTier::Unrated);
    }

    #[test]
    fn test_shock_raises_risk() {
        let mut stats = ReputationStats::new(agent());
        let p = params();
        for seq in 1..=10u64 {
            stats.apply(&event(seq, 95, seq), &p).unwrap();
        }
        let calm = stats.risk_score;

        // A run of zero scores tears fast away from slow.
        for seq in 11..=14u64 {
            stats.apply(&event(seq + 100, 0, seq), &p).unwrap();
        }
        assert!(stats.risk_score > calm);
    }

    #[test]
    fn test_record_key_is_stable_and_distinct() {
        let a = ReputationStats::new(Identity([1; 32]));
        let b = ReputationStats::new(Identity([2; 32]));
        assert_eq!(a.record_key, derive_record_key(&Identity([1; 32])));
        assert_ne!(a.record_key, b.record_key);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(TrustTier::Platinum > TrustTier::Gold);
        assert!(TrustTier::Bronze > TrustTier::Unrated);
        assert_eq!(TrustTier::Unrated.as_u8(), 0);
        assert_eq!(TrustTier::Platinum.as_u8(), 4);
    }
}
