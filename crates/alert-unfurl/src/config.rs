//! Configuration for the alert unfurl service.

use std::env;

/// Default Mackerel API base URL.
pub const DEFAULT_MACKEREL_API_URL: &str = "https://api.mackerelio.com";

/// Default Slack Web API base URL.
pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

/// Alert unfurl service configuration.
///
/// Built once at process start and handed to the clients that issue
/// outbound calls.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Slack bot user OAuth token used for `chat.unfurl`.
    pub slack_bot_token: String,
    /// Slack signing secret for request signature verification.
    pub slack_signing_secret: Option<String>,
    /// Maximum age of a Slack request timestamp, in seconds.
    pub max_timestamp_age_secs: i64,
    /// Mackerel API key. Empty is allowed; Mackerel will reject the lookups.
    pub mackerel_api_key: String,
    /// Mackerel API base URL.
    pub mackerel_api_url: String,
    /// Slack Web API base URL.
    pub slack_api_url: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Values from a `.env` file in the working directory are loaded first
    /// without overriding variables that are already set.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            slack_bot_token: env::var("SLACK_BOT_USER_OAUTH_TOKEN").unwrap_or_default(),
            slack_signing_secret: env::var("SLACK_SIGNING_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            max_timestamp_age_secs: env::var("SLACK_MAX_TIMESTAMP_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            mackerel_api_key: env::var("MACKEREL_API_KEY").unwrap_or_default(),
            mackerel_api_url: env::var("MACKEREL_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_MACKEREL_API_URL.to_string()),
            slack_api_url: env::var("SLACK_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("slack_bot_token", &redact(&self.slack_bot_token))
            .field(
                "slack_signing_secret",
                &self.slack_signing_secret.as_deref().map(redact),
            )
            .field("max_timestamp_age_secs", &self.max_timestamp_age_secs)
            .field("mackerel_api_key", &redact(&self.mackerel_api_key))
            .field("mackerel_api_url", &self.mackerel_api_url)
            .field("slack_api_url", &self.slack_api_url)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}
