//! Agent-facing event ingestion.

use crate::api::ApiError;
use crate::api_ws::OutgoingMessage;
use crate::AppState;
use aria_types::AgentEvent;
use axum::{extract::Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// `POST /agent/event` — accepts an event from the agent and forwards it to
/// connected WebSocket clients.
///
/// Events carrying a `user_id` in their data map are delivered to that
/// user's sessions only; everything else is broadcast. Delivery is best
/// effort — events are not queued for clients that connect later.
pub async fn agent_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(event): Json<AgentEvent>,
) -> Result<Json<Value>, ApiError> {
    if event.event_type.trim().is_empty() {
        return Err(ApiError::BadRequest("event_type is required".to_string()));
    }

    tracing::info!(event_type = %event.event_type, "agent event received");

    let outgoing = OutgoingMessage::Event {
        event_type: event.event_type.clone(),
        data: Value::Object(event.data.clone()),
    };
    let frame = serde_json::to_string(&outgoing)
        .map_err(|e| ApiError::InternalServerError(format!("serialize event: {}", e)))?;

    let delivered = match event.data.get("user_id").and_then(Value::as_str) {
        Some(user_id) => state.sessions.send(user_id, frame).await,
        None => state.sessions.broadcast_all(frame).await,
    };

    Ok(Json(json!({
        "status": "accepted",
        "delivered_sessions": delivered,
    })))
}
