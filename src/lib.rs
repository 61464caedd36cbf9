//! ATOM Reputation Engine
//!
//! Trust scoring for registered agents: clients submit feedback, the
//! engine folds it into a compact per-agent summary (dual-EMA tracks,
//! score bounds, an O(1)-space client diversity estimate, derived
//! quality/risk/confidence and a trust tier) while an anti-gaming guard
//! keeps agent owners from rating themselves. Checkpoints and
//! authority-only replay provide the recovery path for a state that is,
//! by design, too compact to reconstruct from itself.
//!
//! ## Module Structure
//!
//! ```text
//! atom-engine/src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── identity.rs    - Opaque 32-byte identities & hex serde
//! ├── engine/        - The trust-scoring engine
//! │   ├── fixed.rs      - Deterministic fixed-point arithmetic
//! │   ├── hll.rs        - HyperLogLog client diversity counter
//! │   ├── stats.rs      - Per-agent record & core update algorithm
//! │   ├── params.rs     - Versioned, authority-gated tunables
//! │   ├── checkpoint.rs - State anchors & replay events
//! │   ├── guard.rs      - Anti-gaming predicates
//! │   ├── error.rs      - Error taxonomy
//! │   └── manager.rs    - Async orchestrator
//! ├── registry/      - Agent directory boundary (owner lookups)
//! └── api/           - HTTP API endpoints
//!     ├── engine.rs  - Feedback, summaries, params, checkpoint/replay
//!     └── registry.rs - Agent registration & owner lookup
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod identity;
pub mod registry;

// Re-export main types for convenience
pub use config::AtomConfig;
pub use engine::{
    Checkpoint, EngineError, EngineManager, EngineParams, FeedbackContext, FeedbackReceipt,
    ParamsPatch, ReplayEvent, ReplayOutcome, ReputationStats, Summary, TrustTier,
    CHECKPOINT_INTERVAL, MIN_RATED_FEEDBACK, SCORE_MAX,
};
pub use identity::{client_commitment, Identity};
pub use registry::{AgentDirectory, InMemoryDirectory};

// Re-export API types
pub use api::{
    create_engine_router, create_registry_router, EngineApiState, RegistryApiState,
};
