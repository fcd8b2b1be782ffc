//! Events endpoint and health check, driven through the router.

use std::sync::Arc;
use std::time::Duration;

use alert_unfurl::config::{DEFAULT_MACKEREL_API_URL, DEFAULT_SLACK_API_URL};
use alert_unfurl::server::{build_router, AppState};
use alert_unfurl::{Config, MackerelClient, UnfurlClient, UnfurlError, UnfurlMap};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::sync::mpsc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

/// Forwards every unfurl call to a channel so tests can await the
/// background handler.
struct ChannelUnfurler(mpsc::UnboundedSender<(String, String, UnfurlMap)>);

#[async_trait]
impl UnfurlClient for ChannelUnfurler {
    async fn unfurl(&self, channel: &str, ts: &str, unfurls: &UnfurlMap) -> Result<(), UnfurlError> {
        let _ = self
            .0
            .send((channel.to_string(), ts.to_string(), unfurls.clone()));
        Ok(())
    }
}

fn config(signing_secret: Option<&str>, mackerel_api_url: &str) -> Config {
    Config {
        port: 3000,
        slack_bot_token: "xoxb-test".to_string(),
        slack_signing_secret: signing_secret.map(String::from),
        max_timestamp_age_secs: 300,
        mackerel_api_key: "mkr-key".to_string(),
        mackerel_api_url: mackerel_api_url.to_string(),
        slack_api_url: DEFAULT_SLACK_API_URL.to_string(),
    }
}

fn app(
    config: Config,
) -> (
    axum::Router,
    mpsc::UnboundedReceiver<(String, String, UnfurlMap)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let fetcher = MackerelClient::from_config(&config).unwrap();
    let state = AppState {
        config,
        fetcher: Arc::new(fetcher),
        unfurler: Arc::new(ChannelUnfurler(tx)),
    };
    (build_router(state), rx)
}

fn sign(body: &str, timestamp: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(format!("v0:{timestamp}:{body}").as_bytes());
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

fn events_request(body: &str, signature: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/slack/events")
        .header("content-type", "application/json");
    if let Some((timestamp, signature)) = signature {
        builder = builder
            .header("x-slack-request-timestamp", timestamp)
            .header("x-slack-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn link_shared_body(links: &[&str]) -> String {
    let links: Vec<Value> = links
        .iter()
        .map(|url| json!({ "domain": "example.com", "url": url }))
        .collect();
    json!({
        "type": "event_callback",
        "team_id": "T0001",
        "event_id": "Ev0001",
        "event": {
            "type": "link_shared",
            "channel": "C123",
            "user": "U123",
            "message_ts": "1700000000.000100",
            "links": links
        }
    })
    .to_string()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check_echoes_host() {
    let (app, _rx) = app(config(None, DEFAULT_MACKEREL_API_URL));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health-check")
                .header("host", "unfurl.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "Things are going just fine at unfurl.example.com!"
    );
}

#[tokio::test]
async fn test_url_verification_challenge() {
    let (app, _rx) = app(config(None, DEFAULT_MACKEREL_API_URL));
    let body = json!({ "type": "url_verification", "token": "x", "challenge": "3eZbrw1aBm" })
        .to_string();

    let response = app.oneshot(events_request(&body, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let value: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(value, json!({ "challenge": "3eZbrw1aBm" }));
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let (app, _rx) = app(config(None, DEFAULT_MACKEREL_API_URL));

    let response = app.oneshot(events_request("{not json", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let (app, _rx) = app(config(Some(SECRET), DEFAULT_MACKEREL_API_URL));
    let body = json!({ "type": "url_verification", "challenge": "c" }).to_string();

    let response = app.oneshot(events_request(&body, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_signature_is_rejected() {
    let (app, _rx) = app(config(Some(SECRET), DEFAULT_MACKEREL_API_URL));
    let body = json!({ "type": "url_verification", "challenge": "c" }).to_string();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = format!("v0={}", "00".repeat(32));

    let response = app
        .oneshot(events_request(&body, Some((&timestamp, &signature))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() {
    let (app, _rx) = app(config(Some(SECRET), DEFAULT_MACKEREL_API_URL));
    let body = json!({ "type": "url_verification", "challenge": "c" }).to_string();
    let timestamp = (chrono::Utc::now().timestamp() - 3600).to_string();
    let signature = sign(&body, &timestamp);

    let response = app
        .oneshot(events_request(&body, Some((&timestamp, &signature))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_out_of_range_timestamp_is_rejected() {
    let body = json!({ "type": "url_verification", "challenge": "c" }).to_string();

    for timestamp in [i64::MIN.to_string(), i64::MAX.to_string()] {
        let (app, _rx) = app(config(Some(SECRET), DEFAULT_MACKEREL_API_URL));
        let signature = sign(&body, &timestamp);

        let response = app
            .oneshot(events_request(&body, Some((&timestamp, &signature))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{timestamp}");
    }
}

#[tokio::test]
async fn test_signed_request_is_accepted() {
    let (app, _rx) = app(config(Some(SECRET), DEFAULT_MACKEREL_API_URL));
    let body = json!({ "type": "url_verification", "challenge": "signed" }).to_string();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = sign(&body, &timestamp);

    let response = app
        .oneshot(events_request(&body, Some((&timestamp, &signature))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("signed"));
}

#[tokio::test]
async fn test_other_events_are_acknowledged() {
    let (app, mut rx) = app(config(None, DEFAULT_MACKEREL_API_URL));
    let body = json!({
        "type": "event_callback",
        "event": { "type": "app_mention", "text": "<@U0LAN0Z89> hi" }
    })
    .to_string();

    let response = app.oneshot(events_request(&body, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_link_shared_unfurls_alert_links() {
    let mackerel = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/alerts/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "CRITICAL",
            "openedAt": "T1"
        })))
        .expect(1)
        .mount(&mackerel)
        .await;

    let (app, mut rx) = app(config(None, &mackerel.uri()));
    let body = link_shared_body(&[
        "https://example.com/orgs/acme/alerts/123",
        "https://example.com/other",
    ]);

    let response = app.oneshot(events_request(&body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (channel, ts, unfurls) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("unfurl was not submitted")
        .unwrap();

    assert_eq!(channel, "C123");
    assert_eq!(ts, "1700000000.000100");
    assert_eq!(
        serde_json::to_value(&unfurls).unwrap(),
        json!({
            "https://example.com/orgs/acme/alerts/123": {
                "color": "#FF3E4B",
                "blocks": [{
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": "Status: CRITICAL\nOpenedAt: T1" }
                }]
            }
        })
    );
}

#[tokio::test]
async fn test_link_shared_without_alert_links_is_not_unfurled() {
    let mackerel = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mackerel)
        .await;

    let (app, mut rx) = app(config(None, &mackerel.uri()));
    let body = link_shared_body(&["https://example.com/other"]);

    let response = app.oneshot(events_request(&body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The router and its state are gone once the background handler finishes,
    // closing the channel without a send.
    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("handler did not finish");
    assert!(received.is_none());
}
