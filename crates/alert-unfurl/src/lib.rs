//! Slack link unfurls for Mackerel alerts.
//!
//! This crate provides:
//! - Slack Events API payload parsing and request signature verification
//! - A Mackerel alert client
//! - A Slack `chat.unfurl` client with Block Kit attachment types
//! - The `link_shared` handler turning alert links into unfurls
//! - HTTP server for the events endpoint and health check (standalone service)
//!
//! # Configuration
//!
//! The service is configured via environment variables (a `.env` file is
//! honored):
//!
//! - `SLACK_BOT_USER_OAUTH_TOKEN`: bot token used for `chat.unfurl`
//! - `SLACK_SIGNING_SECRET`: enables request signature verification
//! - `MACKEREL_API_KEY`: Mackerel API key
//! - `PORT`: listen port (default 3000)

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod mackerel;
pub mod server;
pub mod slack;
pub mod unfurl;
pub mod webhooks;

pub use config::Config;
pub use error::UnfurlError;
pub use mackerel::{Alert, AlertFetcher, AlertField, AlertStatus, MackerelClient};
pub use slack::{SlackClient, UnfurlAttachment, UnfurlClient, UnfurlMap};
pub use unfurl::{handle_link_shared, UnfurlOutcome};
pub use webhooks::{verify_slack_signature, EventEnvelope, LinkSharedEvent};
