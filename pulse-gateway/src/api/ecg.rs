//! ECG upload and event query handlers
//!
//! POST /ecg/upload, GET /ecg/events

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::header::CONTENT_TYPE,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use pulse_common::events::TypedEventView;
use pulse_common::time;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::ingest::{self, IngestError, UploadSource};
use crate::reconstruct::{self, EventWindow};
use crate::AppState;

/// POST /ecg/upload query parameters
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// IANA zone used to reinterpret every textual timestamp
    pub tz_override: Option<String>,
}

/// POST /ecg/upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub rows_ingested: usize,
    pub rows_dropped: usize,
}

/// GET /ecg/events query parameters
///
/// Both bounds are required; they are optional here so a missing one is
/// reported through [`ApiError`].
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub since: Option<String>,
    pub until: Option<String>,
}

fn required_bound(value: Option<&str>, name: &str) -> ApiResult<DateTime<Utc>> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing query parameter '{}'", name)))?;
    time::resolve_text(raw, None)
        .map_err(|e| ApiError::BadRequest(format!("Invalid '{}': {}", name, e)))
}

/// GET /ecg/events response
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub since: String,
    pub until: String,
    pub count: usize,
    pub events: Vec<TypedEventView>,
}

/// Extract the upload from a multipart file part or a JSON body
async fn read_upload(state: &AppState, request: Request) -> ApiResult<UploadSource> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
        {
            let is_file_part = field.name() == Some("file") || field.file_name().is_some();
            if !is_file_part {
                continue;
            }

            let name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            info!(file = %name, bytes = bytes.len(), "Received upload file");
            return Ok(UploadSource::File {
                name,
                bytes: bytes.to_vec(),
            });
        }

        Err(IngestError::MissingFile.into())
    } else if content_type.starts_with("application/json") {
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        info!(bytes = bytes.len(), "Received JSON upload body");
        Ok(UploadSource::JsonBody(bytes.to_vec()))
    } else {
        warn!(content_type = %content_type, "Unsupported upload content type");
        Err(IngestError::UnsupportedContentType(content_type).into())
    }
}

/// POST /ecg/upload
///
/// Parses, reconciles and sanitizes the upload, then forwards each record to
/// the event logger. Forwarding failures lower `rows_ingested` but the call
/// still succeeds.
pub async fn upload_ecg_data(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    request: Request,
) -> ApiResult<Json<UploadResponse>> {
    let source = read_upload(&state, request).await?;
    let summary = ingest::ingest(source, query.tz_override.as_deref(), &state.forwarder).await?;

    Ok(Json(UploadResponse {
        status: "success",
        rows_ingested: summary.rows_ingested,
        rows_dropped: summary.rows_dropped,
    }))
}

/// GET /ecg/events
///
/// Typed events whose timestamp falls in `[since, until)`.
pub async fn get_ecg_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let since = required_bound(query.since.as_deref(), "since")?;
    let until = required_bound(query.until.as_deref(), "until")?;
    let window = EventWindow::new(since, until)
        .ok_or_else(|| ApiError::BadRequest("'since' must not be after 'until'".to_string()))?;

    info!(since = %since, until = %until, "Fetching events");
    let events = reconstruct::query_events(state.forwarder.client(), &window).await?;
    info!(count = events.len(), "Reconstructed events in window");

    Ok(Json(EventsResponse {
        since: since.to_rfc3339(),
        until: until.to_rfc3339(),
        count: events.len(),
        events,
    }))
}

pub fn ecg_routes() -> Router<AppState> {
    Router::new()
        .route("/ecg/upload", post(upload_ecg_data))
        .route("/ecg/events", get(get_ecg_events))
}
