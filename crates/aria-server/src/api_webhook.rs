//! HMAC-verified webhook ingestion for external integrations.

use crate::api::ApiError;
use crate::api_ws::OutgoingMessage;
use crate::middleware::{verify_webhook_signature, SignatureCheck};
use crate::AppState;
use aria_types::AgentEvent;
use axum::{
    body::Bytes,
    extract::Extension,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// `POST /webhooks/event` — accepts an externally-signed event.
///
/// The signature is HMAC-SHA256 over the raw request body, hex-encoded in
/// the `X-Signature` header. Verification happens before the body is parsed
/// so unauthenticated payloads never reach the JSON layer.
pub async fn webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers.get("X-Signature").and_then(|v| v.to_str().ok());

    match verify_webhook_signature(&state.webhook_secret, signature, &body) {
        SignatureCheck::Valid => {}
        SignatureCheck::NotConfigured => {
            tracing::warn!("webhook rejected: no webhook secret configured");
            return Err(ApiError::Forbidden(
                "webhook signature verification failed".to_string(),
            ));
        }
        SignatureCheck::MissingSignature => {
            tracing::warn!("webhook rejected: missing X-Signature header");
            return Err(ApiError::Forbidden(
                "webhook signature verification failed".to_string(),
            ));
        }
        SignatureCheck::Invalid => {
            tracing::warn!("webhook rejected: invalid signature");
            return Err(ApiError::Forbidden("invalid webhook signature".to_string()));
        }
    }

    let event: AgentEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook payload: {}", e)))?;

    tracing::info!(event_type = %event.event_type, "webhook event accepted");

    let outgoing = OutgoingMessage::Event {
        event_type: event.event_type.clone(),
        data: Value::Object(event.data.clone()),
    };
    if let Ok(frame) = serde_json::to_string(&outgoing) {
        state.sessions.broadcast_all(frame).await;
    }

    Ok(Json(json!({ "status": "accepted" })))
}
