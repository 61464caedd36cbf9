//! Checkpoints and replay events
//!
//! The reputation record is a lossy rolling aggregate, so history cannot
//! be reconstructed from it. Checkpoints anchor a tamper-evident SHA-256
//! commitment of the record at known feedback counts: strictly
//! increasing, gapless indices, one allowed per `CHECKPOINT_INTERVAL`
//! accepted feedbacks. Together with an external durable event log they
//! let an operator audit or rebuild state (via `replay_batch`) without
//! re-storing full history on the hot path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::EngineError;
use super::stats::ReputationStats;
use crate::identity::Identity;

/// Feedbacks that must accumulate between consecutive checkpoints.
pub const CHECKPOINT_INTERVAL: u64 = 10;

/// A tamper-evident anchor of one agent's reputation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub agent: Identity,
    /// Strictly increasing, gapless per agent, starting at 0.
    pub checkpoint_index: u64,
    /// Feedback count at the moment the anchor was taken.
    pub feedback_count: u64,
    /// SHA-256 over the canonical record encoding.
    #[serde(with = "crate::identity::hex32")]
    pub state_hash: [u8; 32],
    pub created_at: DateTime<Utc>,
}

/// One historical feedback supplied to `replay_batch`. The commitment is
/// already the hashed client form, exactly as the live path would have
/// produced it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReplayEvent {
    #[serde(with = "crate::identity::hex32")]
    pub client_commitment: [u8; 32],
    pub score: u8,
    pub sequence_marker: u64,
}

/// Canonical commitment of a reputation record: every field in a fixed
/// order, integers little-endian. Two records hash equal iff every
/// statistic matches.
pub fn state_hash(stats: &ReputationStats) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"atom_state_v1");
    hasher.update(stats.agent.as_bytes());
    hasher.update([stats.schema_version]);
    hasher.update(stats.feedback_count.to_le_bytes());
    hasher.update([
        stats.first_score,
        stats.last_score,
        stats.min_score,
        stats.max_score,
    ]);
    hasher.update(stats.ema_score_fast.to_le_bytes());
    hasher.update(stats.ema_score_slow.to_le_bytes());
    hasher.update(stats.ema_volatility.to_le_bytes());
    hasher.update(stats.ema_arrival_log.to_le_bytes());
    hasher.update(stats.peak_ema.to_le_bytes());
    hasher.update(stats.max_drawdown.to_le_bytes());
    for fp in stats.recent_callers {
        hasher.update(fp.to_le_bytes());
    }
    hasher.update([stats.burst_pressure, stats.updates_since_hll_change]);
    hasher.update(stats.hll.as_bytes());
    hasher.update([stats.diversity_ratio]);
    hasher.update(stats.quality_score.to_le_bytes());
    hasher.update([stats.risk_score]);
    hasher.update(stats.confidence.to_le_bytes());
    hasher.update([stats.trust_tier.as_u8()]);
    hasher.update(stats.first_event_seq.to_le_bytes());
    hasher.update(stats.last_event_seq.to_le_bytes());
    hasher.finalize().into()
}

/// Validate sequencing and build the next checkpoint for an agent.
///
/// `expected_hash` lets an external log keeper assert the state they
/// believe they anchored; a mismatch is rejected before anything is
/// recorded.
pub fn create_checkpoint(
    stats: &ReputationStats,
    previous: Option<&Checkpoint>,
    index: u64,
    expected_hash: Option<[u8; 32]>,
) -> Result<Checkpoint, EngineError> {
    let next_index = match previous {
        Some(prev) => prev.checkpoint_index + 1,
        None => 0,
    };
    if index != next_index {
        return Err(EngineError::InvalidCheckpointIndex);
    }

    let baseline = previous.map(|prev| prev.feedback_count).unwrap_or(0);
    if stats.feedback_count < baseline + CHECKPOINT_INTERVAL {
        return Err(EngineError::CheckpointIntervalNotReached);
    }

    let hash = state_hash(stats);
    if let Some(expected) = expected_hash {
        if expected != hash {
            return Err(EngineError::CheckpointHashMismatch);
        }
    }

    Ok(Checkpoint {
        agent: stats.agent,
        checkpoint_index: index,
        feedback_count: stats.feedback_count,
        state_hash: hash,
        created_at: Utc::now(),
    })
}
