//! ATOM Trust-Scoring Engine
//!
//! Turns an unbounded, adversarial stream of client feedback into a
//! compact, continuously-updated trust summary per agent, while resisting
//! gaming by the agent's own owner.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────────┐
//! │ EngineParams │────►│  EngineManager    │◄────│ AgentDirectory   │
//! │ (governance) │     │  (orchestrator)   │     │ (owner lookup)   │
//! └──────────────┘     └───────────────────┘     └──────────────────┘
//!                               │
//!                guard ► pause ► validate
//!                               ▼
//!                      ┌──────────────────┐
//!                      │ ReputationStats  │── fixed-point EMA tracks
//!                      │ (one per agent)  │── HLL diversity counter
//!                      └──────────────────┘── derived trust outputs
//!                               │
//!                               ▼
//!                      ┌──────────────────┐
//!                      │ Checkpoint &     │
//!                      │ Replay (recovery)│
//!                      └──────────────────┘
//! ```
//!
//! ## Determinism
//!
//! The core modules (`fixed`, `hll`, `stats`, `params`, `checkpoint`,
//! `guard`) are synchronous, integer-only and reproducible: the same
//! parameter version and event sequence always produce the same record
//! bytes. The async manager supplies the serialized execution the
//! surrounding platform would.

pub mod checkpoint;
pub mod error;
pub mod fixed;
pub mod guard;
pub mod hll;
pub mod manager;
pub mod params;
pub mod stats;

pub use checkpoint::{Checkpoint, ReplayEvent, CHECKPOINT_INTERVAL};
pub use error::EngineError;
pub use hll::Hll;
pub use manager::{
    EngineManager, FeedbackContext, FeedbackReceipt, ReplayOutcome, Summary, MAX_REPLAY_BATCH,
    MAX_VALUE_DECIMALS,
};
pub use params::{EngineParams, ParamsPatch};
pub use stats::{
    FeedbackEvent, ReputationStats, TrustTier, UpdateOutcome, MIN_RATED_FEEDBACK, SCORE_MAX,
};
