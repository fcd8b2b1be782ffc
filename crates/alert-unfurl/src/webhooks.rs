//! Slack Events API payloads and request signature verification.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Version prefix of Slack request signatures.
const SIGNATURE_VERSION: &str = "v0";

/// Verify a Slack request signature.
///
/// Slack signs `v0:{timestamp}:{body}` with HMAC-SHA256 keyed by the app's
/// signing secret and sends `v0={hex digest}` in `X-Slack-Signature`.
///
/// # Returns
/// `true` if signature is valid, `false` otherwise
#[must_use]
pub fn verify_slack_signature(
    body: &[u8],
    timestamp: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let Some(hex_digest) = signature
        .strip_prefix(SIGNATURE_VERSION)
        .and_then(|s| s.strip_prefix('='))
    else {
        return false;
    };

    let Ok(signature_bytes) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    computed.as_slice().ct_eq(&signature_bytes).into()
}

/// Validate a Slack request timestamp (seconds) is within `max_age_secs` of now.
#[must_use]
pub fn validate_request_timestamp(timestamp_secs: i64, max_age_secs: i64) -> bool {
    let now = chrono::Utc::now().timestamp();
    max_age_secs >= 0 && now.abs_diff(timestamp_secs) <= max_age_secs.unsigned_abs()
}

/// Outer Events API envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Endpoint ownership check sent when the request URL is configured
    UrlVerification { challenge: String },
    /// A subscribed event
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        team_id: Option<String>,
        event: SlackEvent,
    },
    /// Anything else (`app_rate_limited`, ...)
    #[serde(other)]
    Unknown,
}

/// Inner event of an `event_callback`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    LinkShared(LinkSharedEvent),
    #[serde(other)]
    Other,
}

/// `link_shared` event: links in a message matched one of the app's domains.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkSharedEvent {
    /// Channel the message was posted in
    pub channel: String,
    /// Timestamp of the message containing the links
    pub message_ts: String,
    /// Shared links, in message order
    pub links: Vec<SharedLink>,
    /// Posting user
    #[serde(default)]
    pub user: Option<String>,
}

/// A link in a `link_shared` event.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedLink {
    pub url: String,
}
