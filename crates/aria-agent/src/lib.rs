//! The Aria assistant: intent handling and session lifecycle.
//!
//! The assistant consumes speech transcripts, detects keyword intents,
//! dispatches each to its single fixed handler, and reports interactions and
//! events to the backend over the authenticated API client. The session
//! layer owns the room connection, including the bounded connect retry.

pub mod assistant;
pub mod config;
pub mod session;

pub use assistant::Assistant;
pub use config::AgentConfig;
pub use session::{with_retry, AgentReply, AgentSession};
