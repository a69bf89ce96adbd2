//! pulse-gateway library interface
//!
//! ECG ingestion and read-side reconstruction in front of an external
//! event-logging service, plus the breath check-in endpoint.

pub mod api;
pub mod checkin;
pub mod error;
pub mod ingest;
pub mod logger_client;
pub mod reconstruct;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use pulse_common::config::GatewayConfig;
use pulse_common::Error;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::checkin::{CheckinHistory, CoachClient};
use crate::ingest::Forwarder;
use crate::logger_client::EventLoggerClient;

/// Application state shared across handlers
///
/// Everything request-scoped lives in the handlers; the only cross-request
/// state is the check-in history.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    /// Event logger client wrapped with the forwarding policy
    pub forwarder: Forwarder,
    /// `None` disables the breath check-in endpoint
    pub coach: Option<CoachClient>,
    pub checkins: CheckinHistory,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> pulse_common::Result<Self> {
        let client = EventLoggerClient::new(
            &config.event_logger_url,
            &config.event_logger_token,
            config.request_timeout,
        )
        .map_err(|e| Error::Internal(format!("Failed to create event logger client: {}", e)))?;

        let coach = CoachClient::from_config(&config.coach, config.request_timeout)
            .map_err(|e| Error::Internal(format!("Failed to create coaching client: {}", e)))?;

        Ok(Self {
            forwarder: Forwarder::new(client, config.forward_concurrency),
            coach,
            checkins: CheckinHistory::default(),
            startup_time: pulse_common::time::now(),
            config: Arc::new(config),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .merge(api::ecg_routes())
        .merge(api::checkin_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
