use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::Room;
use std::time::Duration;
use uuid::Uuid;

/// Server-side LiveKit operations: join tokens and room lifecycle.
#[derive(Debug)]
pub struct VoiceService {
    config: LiveKitConfig,
    room_client: RoomClient,
}

impl VoiceService {
    pub fn new(config: LiveKitConfig) -> Self {
        let room_client =
            RoomClient::with_api_key(&config.url, &config.api_key, &config.api_secret);
        Self {
            config,
            room_client,
        }
    }

    /// Voice is enabled when a LiveKit URL is configured.
    pub fn is_enabled(&self) -> bool {
        !self.config.url.is_empty()
    }

    pub fn get_url(&self) -> &str {
        &self.config.url
    }

    /// Generates a fresh room name in the platform's `room-<hex8>` format.
    pub fn generate_room_name() -> String {
        format!("room-{}", &Uuid::new_v4().simple().to_string()[..8])
    }

    /// Generates a fallback client identity in the `user-<hex8>` format.
    pub fn generate_identity() -> String {
        format!("user-{}", &Uuid::new_v4().simple().to_string()[..8])
    }

    pub async fn create_room(&self, name: &str) -> Result<Room, VoiceError> {
        let options = CreateRoomOptions::default();

        self.room_client
            .create_room(name, options)
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }

    /// Generates a signed join token granting publish/subscribe in `room_name`.
    pub fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError> {
        if self.config.api_key.is_empty() || self.config.api_secret.is_empty() {
            return Err(VoiceError::Config(
                "LiveKit API key/secret are not configured".to_string(),
            ));
        }

        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }

    pub async fn remove_participant(&self, room: &str, identity: &str) -> Result<(), VoiceError> {
        self.room_client
            .remove_participant(room, identity)
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }

    /// Returns the number of participants currently in a room.
    /// Returns 0 if the room does not exist.
    pub async fn participant_count(&self, room_name: &str) -> Result<u32, VoiceError> {
        match self.room_client.list_participants(room_name).await {
            Ok(participants) => Ok(participants.len() as u32),
            Err(_) => Ok(0), // Room doesn't exist yet
        }
    }
}
