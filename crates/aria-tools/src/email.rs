//! Email delivery through the Gmail REST API.
//!
//! No SMTP: the message is assembled as MIME text, base64url-encoded, and
//! posted to the Gmail `messages/send` endpoint. Sending requires a Google
//! OAuth2 refresh token, which is exchanged for a short-lived access token
//! on every send.

use crate::error::ToolError;
use base64::Engine;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

/// HTTP timeout for token exchange and send calls.
const SEND_TIMEOUT: Duration = Duration::from_secs(20);

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

fn address_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("valid regex")
    })
}

/// Returns `true` when `address` looks like a deliverable email address.
pub fn is_valid_address(address: &str) -> bool {
    address_pattern().is_match(address)
}

/// Google account configuration for the mailer.
#[derive(Clone, Default)]
pub struct GmailConfig {
    /// Sender address (`From`).
    pub user: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// OAuth2 token endpoint; overridable for tests.
    pub token_url: Option<String>,
    /// Gmail send endpoint; overridable for tests.
    pub send_url: Option<String>,
}

impl std::fmt::Debug for GmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailConfig")
            .field("user", &self.user)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl GmailConfig {
    /// Loads the configuration from `GMAIL_USER` / `GOOGLE_CLIENT_ID` /
    /// `GOOGLE_CLIENT_SECRET` / `GOOGLE_REFRESH_TOKEN`.
    pub fn from_env() -> Self {
        Self {
            user: std::env::var("GMAIL_USER").unwrap_or_default(),
            client_id: std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            refresh_token: std::env::var("GOOGLE_REFRESH_TOKEN").unwrap_or_default(),
            token_url: None,
            send_url: None,
        }
    }

    /// Returns `true` when a sender account is configured at all. Used for
    /// the `/api/config` feature flags.
    pub fn is_configured(&self) -> bool {
        !self.user.is_empty()
    }

    fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.is_empty() {
            missing.push("GOOGLE_CLIENT_ID");
        }
        if self.client_secret.is_empty() {
            missing.push("GOOGLE_CLIENT_SECRET");
        }
        if self.refresh_token.is_empty() {
            missing.push("GOOGLE_REFRESH_TOKEN");
        }
        missing
    }
}

/// An outbound email request.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EmailRequest {
    pub to: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub cc: Option<String>,
    /// Optional pre-rendered weather section.
    #[serde(default)]
    pub weather_report: Option<String>,
    /// Optional pre-rendered search section.
    #[serde(default)]
    pub search_report: Option<String>,
}

/// Gmail REST mailer.
#[derive(Debug, Clone)]
pub struct GmailMailer {
    http: reqwest::Client,
    config: GmailConfig,
}

impl GmailMailer {
    pub fn new(config: GmailConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    /// Sends an email, returning a confirmation string naming the recipient.
    pub async fn send(&self, request: &EmailRequest) -> Result<String, ToolError> {
        if self.config.user.is_empty() {
            return Err(ToolError::Config("GMAIL_USER is not set".to_string()));
        }
        if !is_valid_address(&request.to) {
            return Err(ToolError::InvalidInput(format!(
                "invalid recipient address '{}'",
                request.to
            )));
        }
        if let Some(cc) = &request.cc {
            if !is_valid_address(cc) {
                return Err(ToolError::InvalidInput(format!(
                    "invalid CC address '{}'",
                    cc
                )));
            }
        }

        let missing = self.config.missing_credentials();
        if !missing.is_empty() {
            return Err(ToolError::Config(format!(
                "Google OAuth2 credentials incomplete; missing: {}",
                missing.join(", ")
            )));
        }

        let access_token = self.fetch_access_token().await?;
        let raw = compose_mime(&self.config.user, request);
        let raw_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw.as_bytes());

        let send_url = self.config.send_url.as_deref().unwrap_or(SEND_URL);
        let response = self
            .http
            .post(send_url)
            .bearer_auth(&access_token)
            .json(&json!({ "raw": raw_b64 }))
            .send()
            .await?;

        let status = response.status();
        if !(status.is_success() || status.as_u16() == 202) {
            tracing::error!(status = status.as_u16(), "Gmail send failed");
            return Err(ToolError::Upstream {
                service: "gmail",
                status: status.as_u16(),
            });
        }

        tracing::info!(to = %request.to, "email sent via Gmail API");
        Ok(format!("Email sent successfully to {}", request.to))
    }

    /// Exchanges the refresh token for an access token.
    async fn fetch_access_token(&self) -> Result<String, ToolError> {
        let token_url = self.config.token_url.as_deref().unwrap_or(TOKEN_URL);
        let response = self
            .http
            .post(token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail: Value = response.json().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                error = %detail.get("error_description").and_then(|v| v.as_str()).unwrap_or("unknown"),
                "Google OAuth2 token refresh failed"
            );
            return Err(ToolError::Upstream {
                service: "google-oauth",
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Parse(format!("token response: {}", e)))?;
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ToolError::Parse("token response missing access_token".to_string()))
    }
}

/// Assembles the full MIME message (multipart/alternative, plain + HTML).
fn compose_mime(from: &str, request: &EmailRequest) -> String {
    let boundary = "aria-alt-boundary";
    let html = compose_html(request);
    let plain = strip_tags(&html);

    let mut headers = vec![
        format!("From: {}", from),
        format!("To: {}", request.to),
        format!("Subject: {}", sanitize_header(&request.subject)),
    ];
    if let Some(cc) = &request.cc {
        headers.push(format!("Cc: {}", cc));
    }
    headers.push("MIME-Version: 1.0".to_string());
    headers.push(format!(
        "Content-Type: multipart/alternative; boundary=\"{}\"",
        boundary
    ));

    format!(
        "{headers}\r\n\r\n--{b}\r\nContent-Type: text/plain; charset=\"utf-8\"\r\n\r\n{plain}\r\n--{b}\r\nContent-Type: text/html; charset=\"utf-8\"\r\n\r\n{html}\r\n--{b}--\r\n",
        headers = headers.join("\r\n"),
        b = boundary,
        plain = plain,
        html = html,
    )
}

/// Renders the HTML body as a sequence of titled sections.
fn compose_html(request: &EmailRequest) -> String {
    fn section(title: &str, body_html: &str) -> String {
        format!(
            "<div style=\"margin:16px 0;padding:16px;border:1px solid #eee;border-radius:8px;\">\
             <h3 style=\"margin:0 0 8px;color:#333;\">{}</h3>\
             <div style=\"color:#444;\">{}</div></div>",
            title, body_html
        )
    }

    let mut sections = Vec::new();
    if !request.message.is_empty() {
        sections.push(section("Message", &escape_html(&request.message).replace('\n', "<br>")));
    }
    if let Some(weather) = &request.weather_report {
        sections.push(section(
            "Weather report",
            &escape_html(weather).replace('\n', "<br>"),
        ));
    }
    if let Some(search) = &request.search_report {
        sections.push(section(
            "Search report",
            &format!(
                "<pre style=\"white-space:pre-wrap;word-wrap:break-word;margin:0;\">{}</pre>",
                escape_html(search)
            ),
        ));
    }

    format!("<html><body>{}</body></html>", sections.join("\n"))
}

/// Minimal tag strip for the plain-text alternative.
fn strip_tags(html: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    re.replace_all(&html.replace("<br>", "\n"), "").to_string()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Strips CR/LF so user-supplied subjects cannot inject extra headers.
fn sanitize_header(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
