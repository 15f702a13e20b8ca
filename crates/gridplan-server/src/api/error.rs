//! API error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gridplan_core::PlanError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session limit of {limit} reached")]
    TooManySessions { limit: usize },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Plan(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManySessions { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Plan(err) => err.kind(),
            ApiError::SessionNotFound(_) => "session_not_found",
            ApiError::TooManySessions { .. } => "too_many_sessions",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
