//! HTTP API endpoints for the ATOM engine
//!
//! Provides REST APIs for:
//! - Engine (feedback submission, summaries, params, checkpoint/replay)
//! - Registry (agent/owner directory, the engine's collaborator boundary)

pub mod engine;
pub mod registry;

pub use engine::{EngineApiState, create_engine_router};
pub use registry::{RegistryApiState, create_registry_router};
