//! Aria server binary — the backend for the Aria voice-assistant platform.
//!
//! Starts an axum HTTP server with structured logging, the middleware stack
//! (CORS, auth, rate limiting), and graceful shutdown on SIGTERM/SIGINT.

use aria_server::{app, background, config, AppState};
use aria_tools::{GmailConfig, GmailMailer, LiveToolSuite, SearchService, WeatherService};
use aria_types::FeatureFlags;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("ARIA_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Wire the live tool connectors
    let gmail_config = GmailConfig::from_env();
    let features = FeatureFlags {
        voice_assistant: !config.livekit.url.is_empty(),
        weather_lookup: true,
        web_search: true,
        email_sending: gmail_config.is_configured(),
        video_support: true,
    };
    let tools = Arc::new(LiveToolSuite::new(
        WeatherService::new(),
        SearchService::new(),
        GmailMailer::new(gmail_config),
    ));

    let state = AppState::new(&config, tools, features);
    tracing::info!(
        origins = ?config.allowed_origins(),
        "CORS configured"
    );

    // Background maintenance
    let maintenance_state = Arc::new(state.clone());
    tokio::spawn(background::start_maintenance_task(maintenance_state));

    // Build application
    let router = app(state, &config);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting aria server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown. ConnectInfo is required: the rate
    // limiter falls back to client IPs for unauthenticated requests.
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    tracing::info!("aria server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
