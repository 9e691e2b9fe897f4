//! Interaction logging and the user-context read path.

use crate::api::ApiError;
use crate::AppState;
use aria_types::InteractionRecord;
use axum::{
    extract::{Extension, Path},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Records returned by the context endpoint.
const CONTEXT_RECENT_LIMIT: usize = 20;

/// `POST /interactions/log` — appends one interaction record.
pub async fn log_interaction_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(record): Json<InteractionRecord>,
) -> Result<Json<Value>, ApiError> {
    if record.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if record.content.is_empty() {
        return Err(ApiError::BadRequest("content is required".to_string()));
    }

    tracing::debug!(
        user_id = %record.user_id,
        kind = record.kind.label(),
        "interaction logged"
    );
    state.interactions.append(record);

    Ok(Json(json!({ "status": "logged" })))
}

/// `GET /user/{userId}/context` — recent interactions and preferences.
///
/// Preferences have no write path in this system, so the object is always
/// empty; it is kept in the shape for client compatibility.
pub async fn user_context_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }

    let recent = state.interactions.recent(&user_id, CONTEXT_RECENT_LIMIT);

    Ok(Json(json!({
        "user_id": user_id,
        "preferences": {},
        "recent_interactions": recent,
    })))
}
