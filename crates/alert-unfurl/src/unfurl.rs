//! `link_shared` handling: turn Mackerel alert links into unfurls.
//!
//! Each qualifying link is looked up concurrently. Links that do not point
//! at an alert, or whose lookup fails, are left out of the unfurl; Slack then
//! shows them as plain links. Nothing here returns an error to the caller.

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::mackerel::{Alert, AlertFetcher};
use crate::slack::{SlackBlock, SlackText, UnfurlAttachment, UnfurlClient, UnfurlMap};
use crate::webhooks::LinkSharedEvent;

/// Result of handling one `link_shared` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfurlOutcome {
    /// No link produced an unfurl; Slack was not called
    Skipped,
    /// One `chat.unfurl` call carrying this many unfurls succeeded
    Unfurled(usize),
    /// The `chat.unfurl` call failed (already logged)
    Failed,
}

/// Extract the alert id from a `/orgs/{org}/alerts/{alertId}` link.
///
/// Returns `None` for anything else, including links that are not URLs.
#[must_use]
pub fn alert_id_from_link(link: &str) -> Option<String> {
    let url = reqwest::Url::parse(link).ok()?;
    let segments: Vec<&str> = url.path().split('/').collect();

    match segments.as_slice() {
        [_, "orgs", _, "alerts", id] if !id.is_empty() => Some((*id).to_string()),
        _ => None,
    }
}

/// Text of the unfurl section for an alert.
#[must_use]
pub fn alert_text(alert: &Alert) -> String {
    let text = format!("Status: {}\nOpenedAt: {}", alert.status, alert.opened_at);
    if alert.message.is_missing() {
        text
    } else {
        format!("{text}\nMessage: {}", alert.message)
    }
}

/// Build the unfurl attachment for an alert.
#[must_use]
pub fn alert_attachment(alert: &Alert) -> UnfurlAttachment {
    UnfurlAttachment {
        color: alert.status.color().to_string(),
        blocks: vec![SlackBlock::Section {
            text: SlackText::mrkdwn(alert_text(alert)),
        }],
    }
}

/// Look up one alert and build its unfurl entry, logging any failure.
async fn unfurl_alert(
    fetcher: &dyn AlertFetcher,
    link: &str,
    alert_id: &str,
) -> Option<(String, UnfurlAttachment)> {
    match fetcher.fetch_alert(alert_id).await {
        Ok(alert) => Some((link.to_string(), alert_attachment(&alert))),
        Err(e) => {
            error!(
                link = %link,
                alert_id = %alert_id,
                error = %e,
                "Failed to fetch Mackerel alert"
            );
            None
        }
    }
}

/// Handle a `link_shared` event.
///
/// Fetches every alert link concurrently, then submits all successful
/// unfurls in a single `chat.unfurl` call keyed by the original link URL.
pub async fn handle_link_shared(
    event: &LinkSharedEvent,
    fetcher: &dyn AlertFetcher,
    unfurler: &dyn UnfurlClient,
) -> UnfurlOutcome {
    let lookups = event.links.iter().filter_map(|link| {
        let alert_id = alert_id_from_link(&link.url)?;
        Some(async move { unfurl_alert(fetcher, &link.url, &alert_id).await })
    });

    let unfurls: UnfurlMap = join_all(lookups).await.into_iter().flatten().collect();

    if unfurls.is_empty() {
        return UnfurlOutcome::Skipped;
    }

    let count = unfurls.len();
    debug!(
        channel = %event.channel,
        message_ts = %event.message_ts,
        count,
        "Submitting unfurls"
    );

    match unfurler
        .unfurl(&event.channel, &event.message_ts, &unfurls)
        .await
    {
        Ok(()) => {
            info!(
                channel = %event.channel,
                message_ts = %event.message_ts,
                count,
                "Unfurled Mackerel alerts"
            );
            UnfurlOutcome::Unfurled(count)
        }
        Err(e) => {
            error!(
                channel = %event.channel,
                message_ts = %event.message_ts,
                error = %e,
                "Failed to unfurl links"
            );
            UnfurlOutcome::Failed
        }
    }
}
