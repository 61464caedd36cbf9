//! Registry API Endpoints
//!
//! Thin CRUD over the agent directory. The directory is a collaborator of
//! the engine, not part of it: the engine only consumes owner lookups.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::identity::Identity;
use crate::registry::{AgentDirectory, InMemoryDirectory};

/// API state for registry endpoints
#[derive(Clone)]
pub struct RegistryApiState {
    pub directory: Arc<InMemoryDirectory>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub agent: Identity,
    pub owner: Identity,
}

#[derive(Debug, Serialize)]
pub struct AgentOwnerResponse {
    pub agent: Identity,
    pub owner: Identity,
}

#[derive(Debug, Serialize)]
pub struct RegistryStatsResponse {
    pub registered_agents: usize,
}

/// POST /registry/agents - Register an agent with its owner
pub async fn register_agent(
    State(state): State<RegistryApiState>,
    Json(payload): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<AgentOwnerResponse>), (StatusCode, String)> {
    if !state.directory.register(payload.agent, payload.owner) {
        return Err((
            StatusCode::CONFLICT,
            "agent is already registered".to_string(),
        ));
    }

    info!(agent = %payload.agent.short(), "agent registered");
    Ok((
        StatusCode::CREATED,
        Json(AgentOwnerResponse {
            agent: payload.agent,
            owner: payload.owner,
        }),
    ))
}

/// GET /registry/agents/{agent}/owner - Look up an agent's owner
pub async fn get_owner(
    State(state): State<RegistryApiState>,
    Path(agent): Path<String>,
) -> Result<Json<AgentOwnerResponse>, (StatusCode, String)> {
    let agent = Identity::from_hex(&agent)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid agent identity: {e}")))?;

    match state.directory.owner_of(&agent) {
        Some(owner) => Ok(Json(AgentOwnerResponse { agent, owner })),
        None => Err((StatusCode::NOT_FOUND, "agent is not registered".to_string())),
    }
}

/// GET /registry/stats - Directory counters
pub async fn get_stats(State(state): State<RegistryApiState>) -> Json<RegistryStatsResponse> {
    Json(RegistryStatsResponse {
        registered_agents: state.directory.len(),
    })
}

/// Create the registry API router
pub fn create_registry_router(state: RegistryApiState) -> Router {
    Router::new()
        .route("/agents", post(register_agent))
        .route("/agents/{agent}/owner", get(get_owner))
        .route("/stats", get(get_stats))
        .with_state(state)
}
