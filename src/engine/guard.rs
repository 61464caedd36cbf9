//! Anti-gaming guard
//!
//! Stateless predicates checked before any reputation-bearing mutation:
//! an agent's owner may neither rate nor validate their own agent, and
//! config/replay governance is restricted to the configured authority.
//! Each check runs before any state is touched, so a violation mutates
//! nothing.

use super::error::EngineError;
use super::params::EngineParams;
use crate::identity::Identity;

/// Reject feedback submitted by the subject agent's own owner.
pub fn ensure_not_owner(client: &Identity, owner: &Identity) -> Result<(), EngineError> {
    if client == owner {
        return Err(EngineError::SelfFeedbackNotAllowed);
    }
    Ok(())
}

/// Reject validation-adjacent actions performed by the subject agent's
/// own owner.
pub fn ensure_not_owner_validation(validator: &Identity, owner: &Identity) -> Result<(), EngineError> {
    if validator == owner {
        return Err(EngineError::SelfValidationNotAllowed);
    }
    Ok(())
}

/// Restrict governance operations (config updates, batch replay) to the
/// configured authority.
pub fn ensure_authority(actor: &Identity, params: &EngineParams) -> Result<(), EngineError> {
    if *actor != params.authority {
        return Err(EngineError::NotAuthority);
    }
    Ok(())
}
