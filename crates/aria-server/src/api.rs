//! Shared API plumbing and the public status endpoints.

use crate::AppState;
use aria_tools::ToolError;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
///
/// Responses carry a JSON body `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream failure: {0}")]
    UpstreamFailed(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::UpstreamFailed(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ToolError> for ApiError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ToolError::NotFound(what) => ApiError::NotFound(what),
            ToolError::Config(msg) => ApiError::Unavailable(msg),
            ToolError::Upstream { .. } | ToolError::Transport(_) | ToolError::Parse(_) => {
                ApiError::UpstreamFailed(e.to_string())
            }
        }
    }
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version. Used by load balancers,
/// monitoring, and CI to verify the server is running.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "aria",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /api/config` — client configuration: the LiveKit URL and which
/// features this deployment actually has available.
pub async fn config_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "livekit_url": state.voice_service.get_url(),
        "features": state.features,
    }))
}
