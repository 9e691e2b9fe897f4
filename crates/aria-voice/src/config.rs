use serde::{Deserialize, Serialize};
use std::fmt;

fn default_token_ttl_seconds() -> u64 {
    3600
}

/// LiveKit connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    /// Server URL (e.g. `wss://aria.livekit.cloud`).
    pub url: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    /// JWT TTL in seconds for join tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }

    /// Loads settings from `LIVEKIT_URL` / `LIVEKIT_API_KEY` /
    /// `LIVEKIT_API_SECRET`. Missing variables leave fields empty, which
    /// disables voice (see [`crate::VoiceService::is_enabled`]).
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("LIVEKIT_URL").unwrap_or_default(),
            api_key: std::env::var("LIVEKIT_API_KEY").unwrap_or_default(),
            api_secret: std::env::var("LIVEKIT_API_SECRET").unwrap_or_default(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let config = LiveKitConfig::new("wss://x", "key", "super-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn serialization_skips_secret() {
        let config = LiveKitConfig::new("wss://x", "key", "super-secret");
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("api_secret").is_none());
        assert_eq!(json["api_key"], "key");
    }
}
