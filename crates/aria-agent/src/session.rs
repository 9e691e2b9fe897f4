//! Session lifecycle: room connection with bounded retry, then the
//! transcript-consume loop.

use crate::assistant::Assistant;
use aria_voice::{AgentRoomClient, TranscriptionEvent, VoiceError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Connection attempts before giving up.
const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Wait between attempts grows linearly: `unit × attempt`.
const CONNECT_BACKOFF_UNIT: Duration = Duration::from_secs(5);

/// Capacity of the reply broadcast channel.
const REPLY_BROADCAST_CAPACITY: usize = 64;

/// A reply the assistant produced for an utterance.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub user_id: String,
    pub text: String,
}

/// Runs `op` up to `max_attempts` times, sleeping `unit × attempt` between
/// failures. The final error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(
    max_attempts: u32,
    unit: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let wait = unit * attempt;
                tracing::error!(
                    attempt,
                    max_attempts,
                    "operation failed: {}; retrying in {:?}",
                    e,
                    wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(max_attempts, "operation failed after final attempt: {}", e);
                return Err(e);
            }
        }
    }
}

/// An active assistant session bound to one room.
pub struct AgentSession {
    client: Arc<AgentRoomClient>,
    reply_tx: broadcast::Sender<AgentReply>,
}

impl AgentSession {
    /// Connects to the room, retrying on failure, and returns the session.
    pub async fn start(
        url: &str,
        token: &str,
        room_name: &str,
    ) -> Result<Self, VoiceError> {
        Self::start_with_backoff(url, token, room_name, CONNECT_BACKOFF_UNIT).await
    }

    /// [`AgentSession::start`] with an explicit backoff unit (tests use a
    /// millisecond unit).
    pub async fn start_with_backoff(
        url: &str,
        token: &str,
        room_name: &str,
        backoff_unit: Duration,
    ) -> Result<Self, VoiceError> {
        let client = with_retry(MAX_CONNECT_ATTEMPTS, backoff_unit, |attempt| {
            tracing::info!(attempt, max = MAX_CONNECT_ATTEMPTS, room = %room_name, "starting agent session");
            AgentRoomClient::connect(url, token, room_name)
        })
        .await?;

        let (reply_tx, _) = broadcast::channel(REPLY_BROADCAST_CAPACITY);
        Ok(Self {
            client: Arc::new(client),
            reply_tx,
        })
    }

    /// The underlying room client; the transport layer feeds transcripts
    /// through it.
    pub fn client(&self) -> Arc<AgentRoomClient> {
        self.client.clone()
    }

    /// Subscribes to the replies this session produces.
    pub fn subscribe_replies(&self) -> broadcast::Receiver<AgentReply> {
        self.reply_tx.subscribe()
    }

    /// Consumes transcripts and runs each through the assistant until the
    /// room disconnects (the transcript channel closes).
    pub async fn run(&self, assistant: Assistant) {
        let mut transcripts = self.client.subscribe_transcriptions();

        tracing::info!(room = %self.client.room_name, "agent session started successfully");

        loop {
            let event: TranscriptionEvent = match transcripts.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "transcript consumer lagged; continuing");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let reply = assistant
                .handle_user_input(&event.speaker_identity, &event.text)
                .await;

            let _ = self.reply_tx.send(AgentReply {
                user_id: event.speaker_identity,
                text: reply,
            });
        }

        tracing::info!(room = %self.client.room_name, "agent session ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use aria_tools::{EmailRequest, ToolError, ToolSuite};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NoTools;

    #[async_trait]
    impl ToolSuite for NoTools {
        async fn weather(&self, city: &str) -> Result<String, ToolError> {
            Ok(format!("{}: clear", city))
        }
        async fn search(&self, query: &str) -> Result<String, ToolError> {
            Ok(format!("results for {}", query))
        }
        async fn send_email(&self, _request: &EmailRequest) -> Result<String, ToolError> {
            Err(ToolError::Config("no mailer in tests".to_string()))
        }
    }

    #[tokio::test]
    async fn retry_succeeds_on_later_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, VoiceError> =
            with_retry(3, Duration::from_millis(1), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(VoiceError::RoomService("transient".to_string()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), VoiceError> =
            with_retry(3, Duration::from_millis(1), |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VoiceError::RoomService("permanent".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3, "exactly three attempts");
    }

    #[tokio::test]
    async fn session_replies_to_transcripts() {
        let session = AgentSession::start_with_backoff(
            "wss://example",
            "tok",
            "room-test",
            Duration::from_millis(1),
        )
        .await
        .expect("session start failed");

        let client = session.client();
        let mut replies = session.subscribe_replies();

        let assistant = Assistant::new(AgentConfig::default(), Arc::new(NoTools), None);
        let run_session = tokio::spawn(async move { session.run(assistant).await });

        client
            .ingest_transcript("user-1", "what's the weather in Oslo")
            .expect("ingest failed");

        let reply = tokio::time::timeout(Duration::from_secs(5), replies.recv())
            .await
            .expect("timed out waiting for reply")
            .expect("reply channel closed");

        assert_eq!(reply.user_id, "user-1");
        assert!(reply.text.contains("Oslo"), "got: {}", reply.text);

        run_session.abort();
    }

    #[tokio::test]
    async fn connect_failure_surfaces_after_retries() {
        // Empty URL fails deterministically on every attempt.
        let result = AgentSession::start_with_backoff(
            "",
            "tok",
            "room-test",
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(VoiceError::Config(_))));
    }
}
