//! Engine error taxonomy
//!
//! Four families, all reported synchronously and all leaving state
//! untouched: validation (caller-correctable), authorization, sequencing
//! (retry later) and operational. Arithmetic overflow is kept distinct —
//! it signals a parameter/input combination outside designed bounds and
//! aborts the enclosing mutation instead of wrapping.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    // Validation
    #[error("score must be in 0..=100")]
    InvalidScore,

    #[error("value decimals must be <= 9")]
    InvalidDecimals,

    #[error("replay batch is empty or contains invalid events")]
    InvalidReplayBatch,

    #[error("config parameter out of bounds")]
    InvalidParameter,

    #[error("checkpoint index must be exactly previous + 1")]
    InvalidCheckpointIndex,

    #[error("checkpoint hash does not match engine state")]
    CheckpointHashMismatch,

    // Authorization
    #[error("agent owners cannot rate their own agent")]
    SelfFeedbackNotAllowed,

    #[error("agent owners cannot validate their own agent")]
    SelfValidationNotAllowed,

    #[error("caller is not the config authority")]
    NotAuthority,

    // Sequencing
    #[error("feedback count has not advanced a full checkpoint interval")]
    CheckpointIntervalNotReached,

    // Operational
    #[error("engine is paused by its authority")]
    Paused,

    #[error("agent is not registered")]
    UnknownAgent,

    #[error("agent has no reputation record yet")]
    StatsNotInitialized,

    // Fatal
    #[error("fixed-point arithmetic overflow")]
    ArithmeticOverflow,
}

impl EngineError {
    /// True for errors the caller can correct and resubmit.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidScore
                | EngineError::InvalidDecimals
                | EngineError::InvalidReplayBatch
                | EngineError::InvalidParameter
                | EngineError::InvalidCheckpointIndex
                | EngineError::CheckpointHashMismatch
        )
    }

    /// True for authorization failures.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            EngineError::SelfFeedbackNotAllowed
                | EngineError::SelfValidationNotAllowed
                | EngineError::NotAuthority
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_families() {
        assert!(EngineError::InvalidScore.is_validation());
        assert!(EngineError::SelfFeedbackNotAllowed.is_authorization());
        assert!(!EngineError::Paused.is_validation());
        assert!(!EngineError::ArithmeticOverflow.is_authorization());
    }
}
