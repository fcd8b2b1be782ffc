//! Slack `chat.unfurl` client and Block Kit attachment types.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::UnfurlError;

/// Unfurls keyed by the link URL they replace.
pub type UnfurlMap = HashMap<String, UnfurlAttachment>;

/// Write-back side of an unfurl.
#[async_trait]
pub trait UnfurlClient: Send + Sync {
    /// Attach `unfurls` to the message identified by `channel` and `ts`.
    async fn unfurl(&self, channel: &str, ts: &str, unfurls: &UnfurlMap)
        -> Result<(), UnfurlError>;
}

/// Slack Web API client.
#[derive(Debug, Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    bot_token: String,
    api_url: String,
}

impl SlackClient {
    /// Create a client for the bot token against a Web API base URL.
    #[must_use]
    pub fn new(bot_token: impl Into<String>, api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: bot_token.into(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client from the service configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.slack_bot_token.clone(), &config.slack_api_url)
    }
}

#[async_trait]
impl UnfurlClient for SlackClient {
    #[instrument(skip(self, unfurls), fields(channel = %channel, ts = %ts, count = unfurls.len()))]
    async fn unfurl(
        &self,
        channel: &str,
        ts: &str,
        unfurls: &UnfurlMap,
    ) -> Result<(), UnfurlError> {
        if self.bot_token.is_empty() {
            return Err(UnfurlError::NotConfigured("SLACK_BOT_USER_OAUTH_TOKEN"));
        }

        let request = UnfurlRequest {
            channel,
            ts,
            unfurls,
        };

        let response = self
            .client
            .post(format!("{}/chat.unfurl", self.api_url))
            .bearer_auth(&self.bot_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack chat.unfurl request failed");
            return Err(UnfurlError::SlackApi(format!(
                "Slack returned {status}: {body}"
            )));
        }

        let api: ApiResponse = response.json().await?;
        if api.ok {
            debug!("Unfurl submitted");
            Ok(())
        } else {
            Err(UnfurlError::SlackApi(
                api.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

// =============================================================================
// Slack API types (Block Kit)
// =============================================================================

#[derive(Debug, Serialize)]
struct UnfurlRequest<'a> {
    channel: &'a str,
    ts: &'a str,
    unfurls: &'a UnfurlMap,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Attachment shown in place of an unfurled link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnfurlAttachment {
    /// Hex color for the attachment strip, or empty for none
    pub color: String,
    /// Block Kit blocks
    pub blocks: Vec<SlackBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    /// Section block with text
    Section { text: SlackText },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackText {
    #[serde(rename = "type")]
    pub text_type: &'static str,
    pub text: String,
}

impl SlackText {
    #[must_use]
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn",
            text: text.into(),
        }
    }
}
