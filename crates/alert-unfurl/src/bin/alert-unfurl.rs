//! Alert unfurl service binary.
//!
//! Standalone HTTP service receiving Slack `link_shared` events.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use alert_unfurl::{server, Config, MackerelClient, SlackClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (.env first, so RUST_LOG can live there too)
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("alert_unfurl=info".parse()?))
        .init();

    info!("Starting alert unfurl service...");

    if config.slack_signing_secret.is_none() {
        warn!("No SLACK_SIGNING_SECRET configured - Slack request signatures will not be verified");
    }
    if config.slack_bot_token.is_empty() {
        warn!("No SLACK_BOT_USER_OAUTH_TOKEN configured - unfurls will be rejected");
    }
    if config.mackerel_api_key.is_empty() {
        warn!("No MACKEREL_API_KEY configured - alert lookups will likely be rejected");
    }

    let fetcher = MackerelClient::from_config(&config).context("Failed to create Mackerel client")?;
    let unfurler = SlackClient::from_config(&config);

    let state = server::AppState {
        config: config.clone(),
        fetcher: Arc::new(fetcher),
        unfurler: Arc::new(unfurler),
    };

    let app = server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = config.port, "Alert unfurl service listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
