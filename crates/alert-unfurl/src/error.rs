//! Error types for the alert unfurl service.

use thiserror::Error;

/// Errors raised by the Mackerel and Slack clients.
#[derive(Debug, Error)]
pub enum UnfurlError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    /// Slack Web API answered with `ok: false`
    #[error("Slack API error: {0}")]
    SlackApi(String),

    /// A configured credential is not a valid header value
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    /// Required configuration is missing
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),
}
