//! HTTP server for Slack events.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::HOST, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::mackerel::AlertFetcher;
use crate::slack::UnfurlClient;
use crate::unfurl::handle_link_shared;
use crate::webhooks::{
    validate_request_timestamp, verify_slack_signature, EventEnvelope, SlackEvent,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Config,
    /// Mackerel alert lookups.
    pub fetcher: Arc<dyn AlertFetcher>,
    /// Slack unfurl write-back.
    pub unfurler: Arc<dyn UnfurlClient>,
}

/// Build the HTTP router for the unfurl service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events_handler))
        .route("/health-check", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint, echoing the `Host` header.
async fn health_check(headers: HeaderMap) -> String {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    format!("Things are going just fine at {host}!")
}

/// Handle incoming Slack Events API requests.
///
/// This handler:
/// 1. Verifies the request signature (if a signing secret is configured)
/// 2. Answers `url_verification` challenges
/// 3. Acknowledges `link_shared` events and unfurls them in the background
pub async fn slack_events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.config.slack_signing_secret {
        let max_age = state.config.max_timestamp_age_secs;
        if let Err(status) = verify_request(&headers, &body, secret, max_age) {
            return status.into_response();
        }
        debug!("Slack request signature verified");
    }

    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!("Failed to parse Slack event payload: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            info!("Answering Slack URL verification");
            Json(json!({ "challenge": challenge })).into_response()
        }
        EventEnvelope::EventCallback {
            event_id,
            team_id,
            event: SlackEvent::LinkShared(event),
        } => {
            info!(
                event_id = event_id.as_deref().unwrap_or("unknown"),
                team_id = team_id.as_deref().unwrap_or("unknown"),
                user = event.user.as_deref().unwrap_or("unknown"),
                channel = %event.channel,
                links = event.links.len(),
                "Received link_shared event"
            );

            let fetcher = Arc::clone(&state.fetcher);
            let unfurler = Arc::clone(&state.unfurler);
            tokio::spawn(async move {
                handle_link_shared(&event, fetcher.as_ref(), unfurler.as_ref()).await;
            });

            StatusCode::OK.into_response()
        }
        EventEnvelope::EventCallback { .. } | EventEnvelope::Unknown => {
            debug!("Ignoring unhandled Slack event");
            StatusCode::OK.into_response()
        }
    }
}

/// Check the Slack signature headers against the raw body.
fn verify_request(
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
    max_age_secs: i64,
) -> Result<(), StatusCode> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let (Some(timestamp), Some(signature)) = (
        header("x-slack-request-timestamp"),
        header("x-slack-signature"),
    ) else {
        warn!("Missing Slack signature headers");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Ok(timestamp_secs) = timestamp.parse::<i64>() else {
        warn!(timestamp = %timestamp, "Malformed Slack request timestamp");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if !validate_request_timestamp(timestamp_secs, max_age_secs) {
        warn!(timestamp = timestamp_secs, "Slack request timestamp is stale");
        return Err(StatusCode::UNAUTHORIZED);
    }

    if !verify_slack_signature(body, timestamp, signature, secret) {
        warn!("Invalid Slack request signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(())
}
