//! Async HTTP client for the Aria agent to call the backend API.
//!
//! Attaches a bearer token header, enforces a bounded per-call timeout, and
//! translates failures into [`ApiClientError`]. Every call is a single
//! attempt: there is deliberately no retry loop here — transient upstream
//! failures surface to the caller, which decides what to tell the user.

use aria_types::{AgentEvent, InteractionKind, InteractionRecord};
use reqwest::{header, Method, StatusCode};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Default per-call timeout, in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `User-Agent` sent on every request.
const USER_AGENT: &str = concat!("aria-agent/", env!("CARGO_PKG_VERSION"));

/// Errors produced by [`ApiClient`].
#[derive(Debug, Error)]
pub enum ApiClientError {
    /// The backend answered with a non-2xx status.
    #[error("API error: {status}")]
    Status {
        status: StatusCode,
        /// Response body, for diagnostics. Not parsed.
        body: String,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered 2xx but the body was not valid JSON.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    /// The client was constructed with an unusable configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiClientError {
    /// Returns the HTTP status for [`ApiClientError::Status`] failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL of the backend (e.g. `http://localhost:8000`).
    pub base_url: String,
    /// Bearer token for `Authorization`. Empty string disables the header.
    pub token: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("ARIA_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            token: std::env::var("ARIA_API_TOKEN").unwrap_or_default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Async HTTP client for agent→backend calls.
///
/// Cloning is cheap: the underlying connection pool is shared. Dropping the
/// last clone (or calling [`ApiClient::close`]) releases pooled connections.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Builds a client from the given configuration.
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiClientError> {
        if config.base_url.is_empty() {
            return Err(ApiClientError::Config("base_url is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiClientError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    /// Returns the process-wide shared client, initializing it from the
    /// environment on first use.
    ///
    /// # Panics
    ///
    /// Panics if the environment yields an unusable configuration. Callers
    /// that need fallible construction should use [`ApiClient::new`].
    pub fn shared() -> &'static ApiClient {
        static SHARED: OnceLock<ApiClient> = OnceLock::new();
        SHARED.get_or_init(|| {
            ApiClient::new(ApiClientConfig::default())
                .expect("failed to initialize shared API client from environment")
        })
    }

    /// Releases this handle's connection resources.
    ///
    /// Pooled connections close once every clone is gone; this exists so the
    /// shutdown path can state its intent explicitly.
    pub fn close(self) {
        drop(self);
    }

    /// Issues a single request against `path` and returns the parsed JSON body.
    ///
    /// `path` is joined to the configured base URL. The bearer token is
    /// attached when configured. Exactly one attempt is made.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<Value, ApiClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, url = %url, "calling backend");

        let mut request = self
            .http
            .request(method, &url)
            .header(header::CONTENT_TYPE, "application/json");

        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, url = %url, "backend call failed");
            return Err(ApiClientError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(url = %url, "backend returned non-JSON body");
            ApiClientError::InvalidResponse(e.to_string())
        })
    }

    /// Sends an [`AgentEvent`] to the backend (`POST /agent/event`).
    pub async fn send_agent_event(
        &self,
        event_type: &str,
        data: Map<String, Value>,
    ) -> Result<Value, ApiClientError> {
        let event = AgentEvent::new(event_type, data);
        let payload = serde_json::to_value(&event)
            .map_err(|e| ApiClientError::InvalidResponse(e.to_string()))?;
        self.call(Method::POST, "/agent/event", Some(&payload), None)
            .await
    }

    /// Logs an agent-user interaction (`POST /interactions/log`).
    pub async fn log_interaction(
        &self,
        user_id: &str,
        kind: InteractionKind,
        content: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Value, ApiClientError> {
        let mut record = InteractionRecord::new(user_id, kind, content);
        if let Some(metadata) = metadata {
            record.metadata = metadata;
        }
        let payload = serde_json::to_value(&record)
            .map_err(|e| ApiClientError::InvalidResponse(e.to_string()))?;
        self.call(Method::POST, "/interactions/log", Some(&payload), None)
            .await
    }

    /// Fetches stored context for a user (`GET /user/{user_id}/context`).
    pub async fn fetch_context(&self, user_id: &str) -> Result<Value, ApiClientError> {
        let path = format!("/user/{}/context", user_id);
        self.call(Method::GET, &path, None, None).await
    }
}
