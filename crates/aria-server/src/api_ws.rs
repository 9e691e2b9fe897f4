//! WebSocket API handler and session management.
//!
//! Clients connect to `GET /ws?userId=...` and exchange JSON frames tagged
//! by a `type` field. Transcripts run through the same
//! detect→dispatch→reply pipeline the voice agent uses; agent events posted
//! to `/agent/event` are pushed out through the same sessions.

use crate::store::InteractionStore;
use crate::AppState;
use aria_intent::{detect_intent, Intent, IntentMatch};
use aria_types::{InteractionKind, InteractionRecord};
use aria_voice::VoiceService;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        Extension, Query, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Maximum accepted transcript length (8 KiB).
const MAX_TRANSCRIPT_LEN: usize = 8 * 1024;

/// Per-session outbound buffer. Slow consumers past this drop frames
/// rather than blocking the server.
const SESSION_BUFFER_FRAMES: usize = 256;

/// Query parameters for the WebSocket connection.
#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    /// Client identity; a fresh `user-<hex8>` is minted when absent.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Incoming WebSocket frame types.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    /// A finished speech transcript (or typed message) to handle.
    #[serde(rename = "transcript")]
    Transcript { text: String },
    /// Liveness probe.
    #[serde(rename = "ping")]
    Ping,
}

/// Outgoing WebSocket frame types.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    /// The assistant's reply to a transcript.
    #[serde(rename = "reply")]
    Reply {
        intent: Option<String>,
        text: String,
    },
    /// An agent or webhook event pushed to the client.
    #[serde(rename = "event")]
    Event {
        #[serde(rename = "eventType")]
        event_type: String,
        data: Value,
    },
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error { message: String },
}

/// Type alias for the session map.
type SessionMap = HashMap<String, (Uuid, mpsc::Sender<String>)>;

/// Manages active WebSocket sessions, keyed by user identity.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<SessionMap>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a session for a user, replacing any previous one.
    /// Returns the unique session ID.
    pub async fn add_session(&self, user_id: String, sender: mpsc::Sender<String>) -> Uuid {
        let session_id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        if sessions.insert(user_id.clone(), (session_id, sender)).is_some() {
            tracing::info!(user_id = %user_id, "replaced existing WebSocket session");
        }
        session_id
    }

    /// Removes a session if the session ID still matches (a newer session
    /// for the same user must not be torn down by a stale disconnect).
    pub async fn remove_session(&self, user_id: &str, session_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some((current_id, _)) = sessions.get(user_id) {
            if *current_id == session_id {
                sessions.remove(user_id);
            }
        }
    }

    /// Sends a frame to one user. Returns the number of sessions reached.
    pub async fn send(&self, user_id: &str, frame: String) -> usize {
        let sessions = self.sessions.read().await;
        match sessions.get(user_id) {
            Some((_, sender)) => match sender.try_send(frame) {
                Ok(()) => 1,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        "dropping frame for slow consumer: {}",
                        e
                    );
                    0
                }
            },
            None => 0,
        }
    }

    /// Broadcasts a frame to every connected session. Returns the number of
    /// sessions reached.
    pub async fn broadcast_all(&self, frame: String) -> usize {
        let sessions = self.sessions.read().await;
        let mut delivered = 0;
        for (user_id, (_, sender)) in sessions.iter() {
            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        "dropping broadcast frame for slow consumer: {}",
                        e
                    );
                }
            }
        }
        delivered
    }

    /// Number of currently connected sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// WebSocket handler: `GET /ws?userId=...`.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
    Query(params): Query<WsConnectParams>,
) -> impl IntoResponse {
    let user_id = params
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(VoiceService::generate_identity);

    tracing::info!(user_id = %user_id, "websocket connection");
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// Sends a JSON-serialized error frame over the session channel.
fn send_ws_error(tx: &mpsc::Sender<String>, message: String) {
    match serde_json::to_string(&OutgoingMessage::Error { message }) {
        Ok(frame) => {
            if let Err(e) = tx.try_send(frame) {
                tracing::warn!("failed to send WebSocket error to client: {}", e);
            }
        }
        Err(e) => {
            tracing::error!("failed to serialize WebSocket error frame: {}", e);
        }
    }
}

/// Handles one WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<String>(SESSION_BUFFER_FRAMES);
    let session_id = state.sessions.add_session(user_id.clone(), tx.clone()).await;

    // Forward frames from the session channel to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(AxumMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            AxumMessage::Text(text) => {
                let incoming = match serde_json::from_str::<IncomingMessage>(text.as_str()) {
                    Ok(incoming) => incoming,
                    Err(_) => {
                        tracing::warn!(user_id = %user_id, "failed to parse incoming frame");
                        send_ws_error(&tx, "invalid message format".to_string());
                        continue;
                    }
                };

                match incoming {
                    IncomingMessage::Ping => {
                        match serde_json::to_string(&OutgoingMessage::Pong) {
                            Ok(frame) => {
                                let _ = tx.try_send(frame);
                            }
                            Err(e) => {
                                tracing::error!("failed to serialize pong: {}", e);
                            }
                        }
                    }
                    IncomingMessage::Transcript { text } => {
                        if text.len() > MAX_TRANSCRIPT_LEN {
                            send_ws_error(
                                &tx,
                                format!(
                                    "transcript exceeds maximum length of {} bytes",
                                    MAX_TRANSCRIPT_LEN
                                ),
                            );
                            continue;
                        }
                        if text.trim().is_empty() {
                            send_ws_error(&tx, "transcript is empty".to_string());
                            continue;
                        }

                        let (intent, reply) = run_pipeline(&state, &user_id, &text).await;
                        let outgoing = OutgoingMessage::Reply {
                            intent: intent.map(|i| i.label().to_string()),
                            text: reply,
                        };
                        match serde_json::to_string(&outgoing) {
                            Ok(frame) => {
                                let _ = tx.try_send(frame);
                            }
                            Err(e) => {
                                tracing::error!(user_id = %user_id, "failed to serialize reply: {}", e);
                            }
                        }
                    }
                }
            }
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }

    state.sessions.remove_session(&user_id, session_id).await;
    send_task.abort();
    tracing::info!(user_id = %user_id, "websocket disconnected");
}

/// The transcript pipeline: log input, detect, dispatch, log outcome.
///
/// Mirrors the voice agent's handling, except interactions land directly in
/// the server's own store instead of crossing HTTP.
async fn run_pipeline(
    state: &Arc<AppState>,
    user_id: &str,
    text: &str,
) -> (Option<Intent>, String) {
    state
        .interactions
        .append(InteractionRecord::new(user_id, InteractionKind::Input, text));

    let Some(matched) = detect_intent(text) else {
        let reply = "I'm processing your request. Please wait.".to_string();
        append_output(&state.interactions, user_id, &reply, None);
        return (None, reply);
    };

    tracing::info!(
        user_id = %user_id,
        intent = matched.intent.label(),
        keyword = %matched.keyword,
        "intent detected"
    );

    match dispatch(state, user_id, &matched).await {
        Ok(reply) => {
            append_output(&state.interactions, user_id, &reply, Some(matched.intent));
            (Some(matched.intent), reply)
        }
        Err(e) => {
            tracing::error!(
                user_id = %user_id,
                intent = matched.intent.label(),
                "intent handler failed: {}",
                e
            );
            state.interactions.append(InteractionRecord::new(
                user_id,
                InteractionKind::Error,
                e.to_string(),
            ));
            let reply = friendly_failure(&matched);
            (Some(matched.intent), reply)
        }
    }
}

fn append_output(
    interactions: &InteractionStore,
    user_id: &str,
    reply: &str,
    intent: Option<Intent>,
) {
    let mut record = InteractionRecord::new(user_id, InteractionKind::Output, reply);
    if let Some(intent) = intent {
        record = record.with_metadata("intent", json!(intent.label()));
    }
    interactions.append(record);
}

/// Routes a matched intent to its handler. At most one tool call.
async fn dispatch(
    state: &Arc<AppState>,
    user_id: &str,
    matched: &IntentMatch,
) -> Result<String, aria_tools::ToolError> {
    match matched.intent {
        Intent::Weather => match matched.argument.as_deref() {
            Some(city) => state.tools.weather(city).await,
            None => Ok(
                "I can help you with weather. Which city would you like to know about?"
                    .to_string(),
            ),
        },
        Intent::Search => match matched.argument.as_deref() {
            Some(query) => state.tools.search(query).await,
            None => {
                Ok("I can search the web for you. What would you like me to search?".to_string())
            }
        },
        Intent::Email => {
            Ok("I can help you send an email. Please provide the recipient and message."
                .to_string())
        }
        Intent::Context => {
            let recent = state.interactions.recent(user_id, 5);
            if recent.is_empty() {
                Ok("I don't have any stored context for you yet.".to_string())
            } else {
                let lines: Vec<String> = recent
                    .iter()
                    .map(|r| format!("[{}] {}", r.kind.label(), r.content))
                    .collect();
                Ok(format!(
                    "Here is your recent context:\n{}",
                    lines.join("\n")
                ))
            }
        }
    }
}

fn friendly_failure(matched: &IntentMatch) -> String {
    match matched.intent {
        Intent::Weather => {
            let city = matched.argument.as_deref().unwrap_or("that location");
            format!("An error occurred while retrieving weather for {}.", city)
        }
        Intent::Search => {
            let query = matched.argument.as_deref().unwrap_or("that");
            format!("An error occurred while searching the web for '{}'.", query)
        }
        Intent::Email => "Email sending failed.".to_string(),
        Intent::Context => "I couldn't reach your stored context right now.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outgoing_reply_is_type_tagged() {
        let out = OutgoingMessage::Reply {
            intent: Some("weather".to_string()),
            text: "Oslo: clear".to_string(),
        };
        let frame = serde_json::to_value(&out).expect("serialization failed");
        assert_eq!(frame["type"], "reply");
        assert_eq!(frame["intent"], "weather");
        assert_eq!(frame["text"], "Oslo: clear");
    }

    #[test]
    fn outgoing_event_uses_camel_case_tag() {
        let out = OutgoingMessage::Event {
            event_type: "intent_detected".to_string(),
            data: json!({ "intent": "weather" }),
        };
        let frame = serde_json::to_value(&out).expect("serialization failed");
        assert_eq!(frame["type"], "event");
        assert_eq!(frame["eventType"], "intent_detected");
        assert!(frame.get("event_type").is_none());
    }

    #[test]
    fn incoming_frames_parse_by_type_tag() {
        let msg: IncomingMessage =
            serde_json::from_str(r#"{"type":"transcript","text":"hello"}"#).expect("parse failed");
        assert!(matches!(msg, IncomingMessage::Transcript { text } if text == "hello"));

        let msg: IncomingMessage = serde_json::from_str(r#"{"type":"ping"}"#).expect("parse failed");
        assert!(matches!(msg, IncomingMessage::Ping));

        assert!(serde_json::from_str::<IncomingMessage>(r#"{"type":"nope"}"#).is_err());
    }

    #[tokio::test]
    async fn session_manager_send_and_broadcast() {
        let manager = SessionManager::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        manager.add_session("alice".to_string(), tx_a).await;
        manager.add_session("bob".to_string(), tx_b).await;

        assert_eq!(manager.send("alice", "hi".to_string()).await, 1);
        assert_eq!(rx_a.recv().await.as_deref(), Some("hi"));

        assert_eq!(manager.broadcast_all("all".to_string()).await, 2);
        assert_eq!(rx_a.recv().await.as_deref(), Some("all"));
        assert_eq!(rx_b.recv().await.as_deref(), Some("all"));

        assert_eq!(manager.send("nobody", "x".to_string()).await, 0);
    }

    #[tokio::test]
    async fn stale_disconnect_does_not_remove_newer_session() {
        let manager = SessionManager::new();
        let (tx_old, _rx_old) = mpsc::channel(8);
        let old_id = manager.add_session("alice".to_string(), tx_old).await;

        let (tx_new, mut rx_new) = mpsc::channel(8);
        let _new_id = manager.add_session("alice".to_string(), tx_new).await;

        // The old socket's cleanup fires after the replacement connected.
        manager.remove_session("alice", old_id).await;
        assert_eq!(manager.session_count().await, 1, "newer session survives");
        assert_eq!(manager.send("alice", "still here".to_string()).await, 1);
        assert_eq!(rx_new.recv().await.as_deref(), Some("still here"));
    }
}
