//! Engine API Endpoints
//!
//! Feedback submission, trust summaries, parameter governance, and the
//! checkpoint/replay recovery surface.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::{
    Checkpoint, EngineError, EngineManager, EngineParams, FeedbackContext, FeedbackReceipt,
    ParamsPatch, ReplayEvent, ReplayOutcome, Summary,
};
use crate::identity::Identity;

/// API state for engine endpoints
#[derive(Clone)]
pub struct EngineApiState {
    pub manager: Arc<EngineManager>,
}

// Request types

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub agent: Identity,
    pub client: Identity,
    pub score: u8,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub value: Option<u64>,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default, with = "crate::identity::hex32_opt")]
    pub uri_commitment: Option<[u8; 32]>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParamsRequest {
    /// Must match the configured engine authority.
    pub authority: Identity,
    #[serde(flatten)]
    pub patch: ParamsPatch,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckpointRequest {
    pub index: u64,
    #[serde(default, with = "crate::identity::hex32_opt")]
    pub expected_hash: Option<[u8; 32]>,
}

#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    /// Must match the configured engine authority.
    pub authority: Identity,
    pub agent: Identity,
    pub events: Vec<ReplayEvent>,
}

// Response types

#[derive(Debug, Serialize)]
pub struct CheckpointListResponse {
    pub agent: Identity,
    pub total: usize,
    pub checkpoints: Vec<Checkpoint>,
}

/// Map engine errors onto HTTP statuses: validation 400, authorization
/// 403, missing records 404, sequencing 409, paused 503, overflow 500.
fn error_response(err: EngineError) -> (StatusCode, String) {
    let status = match err {
        EngineError::InvalidScore
        | EngineError::InvalidDecimals
        | EngineError::InvalidReplayBatch
        | EngineError::InvalidParameter
        | EngineError::InvalidCheckpointIndex
        | EngineError::CheckpointHashMismatch => StatusCode::BAD_REQUEST,
        EngineError::SelfFeedbackNotAllowed
        | EngineError::SelfValidationNotAllowed
        | EngineError::NotAuthority => StatusCode::FORBIDDEN,
        EngineError::UnknownAgent | EngineError::StatsNotInitialized => StatusCode::NOT_FOUND,
        EngineError::CheckpointIntervalNotReached => StatusCode::CONFLICT,
        EngineError::Paused => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::ArithmeticOverflow => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn parse_agent(raw: &str) -> Result<Identity, (StatusCode, String)> {
    Identity::from_hex(raw)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid agent identity: {e}")))
}

// Endpoints

/// POST /engine/feedback - Submit feedback about an agent
pub async fn submit_feedback(
    State(state): State<EngineApiState>,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> Result<Json<FeedbackReceipt>, (StatusCode, String)> {
    let context = FeedbackContext {
        tag: payload.tag,
        value: payload.value,
        decimals: payload.decimals,
        uri_commitment: payload.uri_commitment,
    };

    let receipt = state
        .manager
        .submit_feedback(payload.client, payload.agent, payload.score, context)
        .await
        .map_err(error_response)?;

    Ok(Json(receipt))
}

/// GET /engine/agents/{agent}/summary - Read the agent's trust summary
pub async fn get_summary(
    State(state): State<EngineApiState>,
    Path(agent): Path<String>,
) -> Result<Json<Summary>, (StatusCode, String)> {
    let agent = parse_agent(&agent)?;

    match state.manager.get_summary(&agent).await {
        Some(summary) => Ok(Json(summary)),
        None => Err((
            StatusCode::NOT_FOUND,
            "agent has no reputation record yet".to_string(),
        )),
    }
}

/// GET /engine/params - Current engine parameters
pub async fn get_params(State(state): State<EngineApiState>) -> Json<EngineParams> {
    Json(state.manager.params().await)
}

/// PUT /engine/params - Sparse parameter update (authority only)
pub async fn update_params(
    State(state): State<EngineApiState>,
    Json(payload): Json<UpdateParamsRequest>,
) -> Result<Json<EngineParams>, (StatusCode, String)> {
    let params = state
        .manager
        .update_params(payload.authority, payload.patch)
        .await
        .map_err(error_response)?;

    Ok(Json(params))
}

/// POST /engine/agents/{agent}/checkpoints - Anchor the agent's state
pub async fn create_checkpoint(
    State(state): State<EngineApiState>,
    Path(agent): Path<String>,
    Json(payload): Json<CreateCheckpointRequest>,
) -> Result<Json<Checkpoint>, (StatusCode, String)> {
    let agent = parse_agent(&agent)?;

    let checkpoint = state
        .manager
        .create_checkpoint(agent, payload.index, payload.expected_hash)
        .await
        .map_err(error_response)?;

    Ok(Json(checkpoint))
}

/// GET /engine/agents/{agent}/checkpoints - List the agent's checkpoints
pub async fn list_checkpoints(
    State(state): State<EngineApiState>,
    Path(agent): Path<String>,
) -> Result<Json<CheckpointListResponse>, (StatusCode, String)> {
    let agent = parse_agent(&agent)?;
    let checkpoints = state.manager.checkpoints(&agent).await;

    Ok(Json(CheckpointListResponse {
        agent,
        total: checkpoints.len(),
        checkpoints,
    }))
}

/// POST /engine/replay - Reconstruct a record from history (authority only)
pub async fn replay_batch(
    State(state): State<EngineApiState>,
    Json(payload): Json<ReplayRequest>,
) -> Result<Json<ReplayOutcome>, (StatusCode, String)> {
    let outcome = state
        .manager
        .replay_batch(payload.authority, payload.agent, &payload.events)
        .await
        .map_err(error_response)?;

    Ok(Json(outcome))
}

/// Create the engine API router
pub fn create_engine_router(state: EngineApiState) -> Router {
    Router::new()
        .route("/feedback", post(submit_feedback))
        .route("/params", get(get_params).put(update_params))
        .route("/replay", post(replay_batch))
        .route("/agents/{agent}/summary", get(get_summary))
        .route(
            "/agents/{agent}/checkpoints",
            get(list_checkpoints).post(create_checkpoint),
        )
        .with_state(state)
}
