//! Aria agent worker — joins a LiveKit room and serves intents.
//!
//! Builds the assistant from environment configuration, generates its own
//! join token, connects to the room (with bounded retry), and then consumes
//! transcripts until shutdown.

use aria_agent::{AgentConfig, AgentSession, Assistant};
use aria_client::{ApiClient, ApiClientConfig};
use aria_tools::{GmailConfig, GmailMailer, LiveToolSuite, SearchService, WeatherService};
use aria_voice::{LiveKitConfig, VoiceService};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let agent_config = AgentConfig::from_env();
    let livekit_config = LiveKitConfig::from_env();

    if livekit_config.url.is_empty() {
        tracing::error!("LIVEKIT_URL is not set — the agent cannot join a room");
        std::process::exit(1);
    }

    let voice = VoiceService::new(livekit_config);

    let room_name = if agent_config.room_name.is_empty() {
        VoiceService::generate_room_name()
    } else {
        agent_config.room_name.clone()
    };

    let identity = format!("agent-{}", agent_config.name.to_lowercase());
    let token = voice
        .generate_join_token(&room_name, &identity, &agent_config.name)
        .expect("failed to generate agent join token — check LiveKit credentials");

    let api = match ApiClient::new(ApiClientConfig::default()) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!("backend client unavailable, running standalone: {}", e);
            None
        }
    };

    let tools = Arc::new(LiveToolSuite::new(
        WeatherService::new(),
        SearchService::new(),
        GmailMailer::new(GmailConfig::from_env()),
    ));

    let assistant = Assistant::new(agent_config, tools, api);
    tracing::info!(room = %room_name, "{}", assistant.greeting());

    let session = AgentSession::start(voice.get_url(), &token, &room_name)
        .await
        .expect("failed to start agent session after retries");

    tokio::select! {
        () = session.run(assistant) => {
            tracing::info!("session ended");
        }
        result = tokio::signal::ctrl_c() => {
            result.expect("failed to install Ctrl+C handler");
            tracing::info!("received SIGINT, shutting down agent");
        }
    }
}
