//! Aria server library logic.

pub mod api;
pub mod api_agent;
pub mod api_interactions;
pub mod api_rooms;
pub mod api_tools;
pub mod api_webhook;
pub mod api_ws;
pub mod background;
pub mod config;
pub mod middleware;
pub mod store;

use aria_tools::ToolSuite;
use aria_types::FeatureFlags;
use aria_voice::{LiveKitConfig, VoiceService};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use config::Config;
use middleware::RateLimiter;
use std::sync::Arc;
use store::InteractionStore;

/// Maximum request body size (1 MiB). Protects against OOM from oversized
/// payloads; no legitimate payload here comes close.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Effective bearer token for agent auth.
    pub auth_token: String,
    /// HMAC secret for webhook verification (empty = webhooks disabled).
    pub webhook_secret: String,
    /// Rate limiter state.
    pub rate_limiter: RateLimiter,
    /// Active WebSocket sessions.
    pub sessions: api_ws::SessionManager,
    /// Append-only interaction log.
    pub interactions: InteractionStore,
    /// LiveKit operations (tokens, rooms).
    pub voice_service: Arc<VoiceService>,
    /// External tool connectors behind the suite seam.
    pub tools: Arc<dyn ToolSuite>,
    /// Capabilities advertised via `/api/config`.
    pub features: FeatureFlags,
}

impl AppState {
    /// Builds the state from configuration and a tool suite.
    ///
    /// An empty `auth.token` gets a random replacement so the server never
    /// runs with a guessable (empty) secret; the generated value is logged
    /// once so an operator can still pair an agent against a dev instance.
    pub fn new(config: &Config, tools: Arc<dyn ToolSuite>, features: FeatureFlags) -> Self {
        let auth_token = if config.auth.token.is_empty() {
            let random: [u8; 32] = rand::random();
            let token = hex::encode(random);
            tracing::warn!(
                token = %token,
                "auth.token not configured; generated a random bearer token for this run"
            );
            token
        } else {
            config.auth.token.clone()
        };

        let livekit = LiveKitConfig::new(
            config.livekit.url.clone(),
            config.livekit.api_key.clone(),
            config.livekit.api_secret.clone(),
        );

        Self {
            auth_token,
            webhook_secret: config.auth.webhook_secret.clone(),
            rate_limiter: RateLimiter::new(
                config.rate_limit.capacity,
                config.rate_limit.refill_rate,
            ),
            sessions: api_ws::SessionManager::new(),
            interactions: InteractionStore::new(),
            voice_service: Arc::new(VoiceService::new(livekit)),
            tools,
            features,
        }
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState, config: &Config) -> Router {
    let protected_routes = Router::new()
        .route("/agent/event", post(api_agent::agent_event_handler))
        .route(
            "/interactions/log",
            post(api_interactions::log_interaction_handler),
        )
        .route(
            "/user/{userId}/context",
            get(api_interactions::user_context_handler),
        )
        .route("/api/weather", post(api_tools::weather_handler))
        .route("/api/search", post(api_tools::search_handler))
        .route("/api/email", post(api_tools::email_handler))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/config", get(api::config_handler))
        .route("/api/time", get(api_tools::time_handler))
        .route("/create-room", post(api_rooms::create_room_handler))
        .route("/token", get(api_rooms::token_handler))
        .route("/webhooks/event", post(api_webhook::webhook_handler))
        .merge(protected_routes)
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware))
        .layer(middleware::build_cors_layer(&config.allowed_origins()))
        .layer(Extension(Arc::new(state)))
}
