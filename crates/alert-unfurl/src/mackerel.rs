//! Mackerel alert model and REST client.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::UnfurlError;

/// Header carrying the Mackerel API key.
const API_KEY_HEADER: &str = "x-api-key";

/// A field of the alert body, rendered the way it is shown in an unfurl.
///
/// Absent fields read `undefined`. Strings are shown without quotes, other
/// scalars verbatim, arrays as their elements joined by `,` and objects as
/// `[object Object]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertField {
    Missing,
    Present(Value),
}

impl AlertField {
    fn from_body(body: &Value, name: &str) -> Self {
        body.get(name)
            .cloned()
            .map_or(Self::Missing, Self::Present)
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<&str> for AlertField {
    fn from(value: &str) -> Self {
        Self::Present(Value::String(value.to_string()))
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => write!(f, "{n}"),
        Value::String(s) => f.write_str(s),
        Value::Object(_) => f.write_str("[object Object]"),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                // Nulls inside arrays render empty.
                if !item.is_null() {
                    write_value(f, item)?;
                }
            }
            Ok(())
        }
    }
}

impl fmt::Display for AlertField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("undefined"),
            Self::Present(value) => write_value(f, value),
        }
    }
}

/// Alert status as reported by Mackerel.
///
/// Only the exact status strings are recognized. Anything else, including a
/// missing or non-string status, is kept as its rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertStatus {
    Ok,
    Critical,
    Unknown,
    Warning,
    Other(String),
}

impl From<String> for AlertStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "OK" => Self::Ok,
            "CRITICAL" => Self::Critical,
            "UNKNOWN" => Self::Unknown,
            "WARNING" => Self::Warning,
            _ => Self::Other(value),
        }
    }
}

impl From<&AlertField> for AlertStatus {
    fn from(field: &AlertField) -> Self {
        match field {
            AlertField::Present(Value::String(s)) => Self::from(s.clone()),
            other => Self::Other(other.to_string()),
        }
    }
}

impl AlertStatus {
    /// Attachment color for this status. Unrecognized statuses get no color.
    #[must_use]
    pub fn color(&self) -> &'static str {
        match self {
            Self::Ok => "#71DD23",
            Self::Critical => "#FF3E4B",
            Self::Unknown => "#9500FF",
            Self::Warning => "#FAC800",
            Self::Other(_) => "",
        }
    }

    /// Status string as Mackerel spells it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
            Self::Warning => "WARNING",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Mackerel alert, reduced to the fields shown in an unfurl.
///
/// Any JSON body other than `null` decodes. Error bodies such as
/// `{"error": {...}}` produce an alert whose fields are all missing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Alert {
    pub status: AlertStatus,
    pub opened_at: AlertField,
    pub message: AlertField,
}

impl TryFrom<Value> for Alert {
    type Error = String;

    fn try_from(body: Value) -> Result<Self, Self::Error> {
        if body.is_null() {
            return Err("alert body is null".to_string());
        }

        Ok(Self {
            status: AlertStatus::from(&AlertField::from_body(&body, "status")),
            opened_at: AlertField::from_body(&body, "openedAt"),
            message: AlertField::from_body(&body, "message"),
        })
    }
}

/// Source of alert details.
#[async_trait]
pub trait AlertFetcher: Send + Sync {
    /// Look up a single alert by its Mackerel id.
    async fn fetch_alert(&self, alert_id: &str) -> Result<Alert, UnfurlError>;
}

/// Mackerel REST client.
#[derive(Debug, Clone)]
pub struct MackerelClient {
    client: reqwest::Client,
    api_url: String,
}

impl MackerelClient {
    /// Create a client that authenticates with `api_key` against `api_url`.
    ///
    /// # Errors
    /// Returns error if the key is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(api_key: &str, api_url: &str) -> Result<Self, UnfurlError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| UnfurlError::InvalidHeader(API_KEY_HEADER))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the service configuration.
    ///
    /// # Errors
    /// See [`MackerelClient::new`].
    pub fn from_config(config: &Config) -> Result<Self, UnfurlError> {
        Self::new(&config.mackerel_api_key, &config.mackerel_api_url)
    }

    fn alert_url(&self, alert_id: &str) -> String {
        format!("{}/api/v0/alerts/{alert_id}", self.api_url)
    }
}

#[async_trait]
impl AlertFetcher for MackerelClient {
    // The response status is not inspected. Only a body that is not JSON
    // fails; error bodies decode to an alert with missing fields.
    #[instrument(skip(self), fields(alert_id = %alert_id))]
    async fn fetch_alert(&self, alert_id: &str) -> Result<Alert, UnfurlError> {
        let response = self.client.get(self.alert_url(alert_id)).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(status = %status, bytes = body.len(), "Received Mackerel alert response");

        Ok(serde_json::from_slice(&body)?)
    }
}
