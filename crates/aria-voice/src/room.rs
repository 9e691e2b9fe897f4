use crate::error::VoiceError;
use tokio::sync::broadcast;
use tracing::info;

/// Default capacity for the per-agent transcription broadcast channel.
const DEFAULT_TRANSCRIPTION_BROADCAST_CAPACITY: usize = 256;

/// Maximum accepted transcript length (8 KiB). A single utterance never
/// legitimately approaches this.
const MAX_TRANSCRIPT_LEN: usize = 8 * 1024;

/// Event emitted when speech in the room is transcribed.
#[derive(Debug, Clone)]
pub struct TranscriptionEvent {
    pub room_name: String,
    pub speaker_identity: String,
    pub text: String,
}

/// The agent's handle on a LiveKit room.
///
/// Media transport and speech-to-text run in the realtime pipeline; this
/// client receives the resulting transcripts as text and fans them out to
/// subscribers (the assistant session) via a broadcast channel.
#[derive(Debug)]
pub struct AgentRoomClient {
    pub room_url: String,
    pub room_name: String,
    connected: bool,
    transcription_tx: broadcast::Sender<TranscriptionEvent>,
    // Held for reconnects; never logged.
    #[allow(dead_code)]
    token: String,
}

impl AgentRoomClient {
    /// Connects to a LiveKit room with a pre-generated join token.
    pub async fn connect(url: &str, token: &str, room_name: &str) -> Result<Self, VoiceError> {
        if url.is_empty() {
            return Err(VoiceError::Config("room URL is empty".to_string()));
        }
        if token.is_empty() {
            return Err(VoiceError::Config("join token is empty".to_string()));
        }

        info!(room = %room_name, url = %url, "agent connecting to room");

        let (tx, _) = broadcast::channel(DEFAULT_TRANSCRIPTION_BROADCAST_CAPACITY);

        Ok(Self {
            room_url: url.to_string(),
            room_name: room_name.to_string(),
            connected: true,
            transcription_tx: tx,
            token: token.to_string(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Feeds a transcript heard in the room into the pipeline.
    ///
    /// Called by the transport layer whenever the realtime model finishes
    /// transcribing an utterance. Subscribers that have lagged past the
    /// channel capacity miss events rather than blocking the room.
    pub fn ingest_transcript(&self, speaker: &str, text: &str) -> Result<(), VoiceError> {
        if !self.connected {
            return Err(VoiceError::NotConnected);
        }
        if text.len() > MAX_TRANSCRIPT_LEN {
            return Err(VoiceError::RoomService(format!(
                "transcript exceeds maximum length of {} bytes",
                MAX_TRANSCRIPT_LEN
            )));
        }

        let event = TranscriptionEvent {
            room_name: self.room_name.clone(),
            speaker_identity: speaker.to_string(),
            text: text.to_string(),
        };

        // No receivers is fine: the assistant may not have subscribed yet.
        let _ = self.transcription_tx.send(event);
        Ok(())
    }

    /// Subscribes to transcripts heard in this room.
    pub fn subscribe_transcriptions(&self) -> broadcast::Receiver<TranscriptionEvent> {
        self.transcription_tx.subscribe()
    }

    pub fn disconnect(&mut self) {
        if self.connected {
            info!(room = %self.room_name, "agent disconnecting from room");
            self.connected = false;
        }
    }
}
