//! Room lifecycle endpoints for web/mobile clients.

use crate::api::ApiError;
use crate::AppState;
use aria_voice::VoiceService;
use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// `POST /create-room` — allocates a fresh room name.
///
/// The room itself is created lazily by LiveKit when the first participant
/// joins; this endpoint only hands out the name and the server URL.
pub async fn create_room_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let room_name = VoiceService::generate_room_name();
    tracing::info!(room = %room_name, "created room");

    Ok(Json(json!({
        "success": true,
        "room_name": room_name,
        "livekit_url": state.voice_service.get_url(),
    })))
}

/// Query parameters for `GET /token`.
#[derive(Debug, Deserialize)]
pub struct TokenParams {
    #[serde(rename = "roomName")]
    pub room_name: Option<String>,
    pub identity: Option<String>,
}

/// `GET /token?roomName=...&identity=...` — issues a LiveKit join token.
///
/// `roomName` is required; `identity` defaults to a fresh `user-<hex8>`.
/// The token grants join/publish/subscribe/publish-data for that room only.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<TokenParams>,
) -> Result<Json<Value>, ApiError> {
    let room_name = params
        .room_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("roomName parameter is required".to_string()))?;

    if !state.voice_service.is_enabled() {
        return Err(ApiError::Unavailable(
            "voice is not configured on this server".to_string(),
        ));
    }

    let identity = params
        .identity
        .filter(|identity| !identity.trim().is_empty())
        .unwrap_or_else(VoiceService::generate_identity);

    let token = state
        .voice_service
        .generate_join_token(room_name, &identity, &identity)
        .map_err(|e| {
            tracing::error!(room = %room_name, "failed to generate token: {}", e);
            ApiError::InternalServerError(format!("failed to generate token: {}", e))
        })?;

    Ok(Json(json!({ "token": token, "identity": identity })))
}
