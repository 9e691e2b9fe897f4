//! Shared types and constants for the Aria platform.
//!
//! This crate provides the foundational record types used across all Aria
//! crates: agent events, interaction log records, and client feature flags.
//! Every record here is transient — produced and consumed within a single
//! request, never persisted across process restarts.
//!
//! No crate in the workspace depends on anything *except* `aria-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An event emitted by the agent toward the backend.
///
/// Sent once over HTTP, never retried, never stored beyond the interaction
/// log. `data` is an open JSON map because event payloads vary by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Event type tag (e.g. `"intent_detected"`, `"error"`).
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// When the event was produced.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    pub fn new(event_type: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Direction/kind of a logged agent-user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Speech or text received from the user.
    Input,
    /// A reply produced for the user.
    Output,
    /// An external tool invocation.
    ToolCall,
    /// A failure surfaced while handling the user.
    Error,
}

impl InteractionKind {
    /// Returns the wire label for this kind.
    pub fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::ToolCall => "tool_call",
            Self::Error => "error",
        }
    }
}

/// A single agent-user interaction, append-only and write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// The user this interaction belongs to.
    pub user_id: String,
    /// What kind of interaction this is.
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    /// Interaction content (utterance, reply, or error text).
    pub content: String,
    /// Additional metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// When the interaction happened.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(
        user_id: impl Into<String>,
        kind: InteractionKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            content: content.into(),
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attaches a metadata entry, consuming and returning the record.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Feature availability advertised to clients via `GET /api/config`.
///
/// Mirrors what the deployment actually has configured: email is only
/// advertised when a sender account is present.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub voice_assistant: bool,
    pub weather_lookup: bool,
    pub web_search: bool,
    pub email_sending: bool,
    pub video_support: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            voice_assistant: true,
            weather_lookup: true,
            web_search: true,
            email_sending: false,
            video_support: true,
        }
    }
}
