//! Event logger HTTP client
//!
//! Thin bearer-authenticated client for the external event-logging service:
//! - `POST {base}/api/event`: one call per canonical event
//! - `GET {base}/api/events`: every logged event, unfiltered
//!
//! Timeouts are applied by the underlying `reqwest::Client`; retries are not
//! attempted here.

use pulse_common::events::{CanonicalEvent, LoggedEventPayload, RawLoggedEvent};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("pulse-gateway/", env!("CARGO_PKG_VERSION"));

/// Event logger client errors
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Connection refused, DNS failure, timeout...
    #[error("Event logger unreachable: {0}")]
    Transport(String),

    /// Logger answered with a non-2xx status
    #[error("Event logger returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not the expected JSON
    #[error("Unexpected event logger response: {0}")]
    Decode(String),
}

/// Client for the external event logger
#[derive(Debug, Clone)]
pub struct EventLoggerClient {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl EventLoggerClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, LoggerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LoggerError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit one canonical event
    pub async fn post_event(&self, event: &CanonicalEvent) -> Result<(), LoggerError> {
        let url = format!("{}/api/event", self.base_url);
        let payload = LoggedEventPayload::ecg(event);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LoggerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoggerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Fetch every event the logger holds
    ///
    /// Wrappers that do not deserialize are skipped rather than failing the
    /// whole fetch.
    pub async fn fetch_all(&self) -> Result<Vec<RawLoggedEvent>, LoggerError> {
        let url = format!("{}/api/events", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| LoggerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoggerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let items: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| LoggerError::Decode(e.to_string()))?;

        let total = items.len();
        let events: Vec<RawLoggedEvent> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();

        if events.len() != total {
            debug!(
                skipped = total - events.len(),
                "Skipped malformed event logger entries"
            );
        }

        Ok(events)
    }
}
