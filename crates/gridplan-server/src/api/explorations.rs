//! Exploration session endpoints.
//!
//! Sessions run in the background; clients poll a snapshot or subscribe to
//! the stream.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gridplan_core::{ExplorationRules, ExplorationSession, Grid, Point};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::loops::exploration_loop::spawn_exploration;
use crate::state::{AppState, SessionView};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExplorationRequest {
    pub grid: Grid,
    /// Must hold exactly one point
    pub seeds: Vec<Point>,
    pub rules: Option<ExplorationRules>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateExplorationResponse {
    pub session_id: String,
}

/// Start a new exploration session.
pub async fn create_exploration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateExplorationRequest>,
) -> Result<(StatusCode, Json<CreateExplorationResponse>), ApiError> {
    let rules = req
        .rules
        .unwrap_or_else(|| state.config().exploration_rules.clone());
    let session = ExplorationSession::new(req.grid, &req.seeds, rules)?;

    let session_id = spawn_exploration(&state, session).ok_or(ApiError::TooManySessions {
        limit: state.config().max_sessions,
    })?;
    tracing::info!("Created exploration session {}", session_id);

    Ok((StatusCode::CREATED, Json(CreateExplorationResponse { session_id })))
}

/// Latest snapshot, plus the report once finished.
pub async fn get_exploration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    state
        .session_view(&id)
        .map(Json)
        .ok_or(ApiError::SessionNotFound(id))
}

/// Cancel a session. Movement stops before the next step.
pub async fn cancel_exploration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.cancel_session(&id) {
        tracing::info!("Cancelled exploration session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}
