//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Authentication secrets.
    #[serde(default)]
    pub auth: AuthConfig,

    /// CORS settings.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Rate limiting settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// LiveKit settings.
    #[serde(default)]
    pub livekit: LiveKitSection,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "aria_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Shared secrets for bearer auth and webhook signatures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Bearer token the agent presents. Empty means a random token is
    /// generated at startup (the deployment then has to read it from the
    /// logs, so production should always set one).
    #[serde(default)]
    pub token: String,

    /// HMAC secret for webhook signature verification. Empty disables the
    /// webhook endpoint (all deliveries are rejected).
    #[serde(default)]
    pub webhook_secret: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Extra allowed origins on top of the built-in localhost set.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Token-bucket rate limiter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum tokens in a bucket.
    #[serde(default = "default_rate_capacity")]
    pub capacity: f64,

    /// Tokens added per second.
    #[serde(default = "default_rate_refill")]
    pub refill_rate: f64,
}

/// LiveKit credentials (also readable from the conventional `LIVEKIT_*`
/// environment variables).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveKitSection {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

/// Built-in development origins, always allowed.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:7860",
    "http://localhost:8000",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:7860",
    "http://127.0.0.1:8000",
];

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rate_capacity() -> f64 {
    100.0
}

fn default_rate_refill() -> f64 {
    10.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_rate_capacity(),
            refill_rate: default_rate_refill(),
        }
    }
}

impl Config {
    /// The effective origin allow-list: built-ins plus configured extras,
    /// deduplicated, order preserved.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|s| s.to_string())
            .chain(self.cors.allowed_origins.iter().map(|s| s.trim().to_string()))
            .filter(|origin| !origin.is_empty() && seen.insert(origin.clone()))
            .collect()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ARIA_HOST` overrides `server.host`
/// - `ARIA_PORT` overrides `server.port`
/// - `ARIA_LOG_LEVEL` overrides `logging.level`
/// - `ARIA_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `ARIA_API_TOKEN` overrides `auth.token`
/// - `ARIA_WEBHOOK_SECRET` overrides `auth.webhook_secret`
/// - `ARIA_ALLOWED_ORIGINS` (comma-separated) extends `cors.allowed_origins`
/// - `ARIA_RATE_CAPACITY` / `ARIA_RATE_REFILL` override `rate_limit.*`
/// - `LIVEKIT_URL` / `LIVEKIT_API_KEY` / `LIVEKIT_API_SECRET` override
///   `livekit.*`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("ARIA_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("ARIA_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(level) = std::env::var("ARIA_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("ARIA_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(token) = std::env::var("ARIA_API_TOKEN") {
        config.auth.token = token;
    }
    if let Ok(secret) = std::env::var("ARIA_WEBHOOK_SECRET") {
        config.auth.webhook_secret = secret;
    }
    if let Ok(origins) = std::env::var("ARIA_ALLOWED_ORIGINS") {
        config
            .cors
            .allowed_origins
            .extend(origins.split(',').map(|s| s.trim().to_string()));
    }
    if let Ok(capacity) = std::env::var("ARIA_RATE_CAPACITY") {
        if let Ok(parsed) = capacity.parse() {
            config.rate_limit.capacity = parsed;
        }
    }
    if let Ok(refill) = std::env::var("ARIA_RATE_REFILL") {
        if let Ok(parsed) = refill.parse() {
            config.rate_limit.refill_rate = parsed;
        }
    }
    if let Ok(url) = std::env::var("LIVEKIT_URL") {
        config.livekit.url = url;
    }
    if let Ok(key) = std::env::var("LIVEKIT_API_KEY") {
        config.livekit.api_key = key;
    }
    if let Ok(secret) = std::env::var("LIVEKIT_API_SECRET") {
        config.livekit.api_secret = secret;
    }

    Ok(config)
}
