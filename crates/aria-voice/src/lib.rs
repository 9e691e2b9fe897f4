//! Voice infrastructure for the Aria platform.
//!
//! Wraps LiveKit for real-time voice transport: join-token generation for
//! web/mobile clients, room lifecycle calls for the backend, and the agent's
//! room client, which fans incoming speech transcripts out to subscribers.
//!
//! Humans speak over WebRTC; the realtime model transcribes speech, so
//! transcripts enter this crate as text and flow to the agent through a
//! broadcast channel.

pub mod config;
pub mod error;
pub mod room;
pub mod service;

pub use config::LiveKitConfig;
pub use error::VoiceError;
pub use room::{AgentRoomClient, TranscriptionEvent};
pub use service::VoiceService;
