use thiserror::Error;

/// Errors produced by the external tool connectors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The caller supplied unusable input (empty city, malformed address).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested entity does not exist upstream (unknown city).
    #[error("not found: {0}")]
    NotFound(String),

    /// The upstream service answered with a failure status.
    #[error("upstream error: {service} returned {status}")]
    Upstream { service: &'static str, status: u16 },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream body could not be interpreted.
    #[error("unparseable upstream response: {0}")]
    Parse(String),

    /// The tool is missing required configuration (credentials, sender).
    #[error("tool not configured: {0}")]
    Config(String),
}
