//! ECG upload ingestion
//!
//! parse → reconcile → sanitize (timestamps resolved here) → forward.
//!
//! Errors that invalidate the whole batch surface as [`IngestError`];
//! per-record problems only appear in the returned counts.

pub mod forward;
pub mod parse;
pub mod reconcile;
pub mod sanitize;

use pulse_common::time::{self, TimestampError};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub use forward::{ForwardReport, Forwarder};
pub use parse::{InputFormat, LooseRecord, ParsedBatch};
pub use reconcile::ReconciledRecord;
pub use sanitize::{SanitizeReport, SanitizedBatch};

/// Batch-level client input errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported file format: {0}. Please upload CSV or JSON.")]
    UnsupportedFormat(String),

    #[error("Unsupported Content-Type '{0}'. Use multipart/form-data or application/json.")]
    UnsupportedContentType(String),

    #[error("Multipart upload has no file part")]
    MissingFile,

    #[error("Upload is not valid UTF-8")]
    InvalidEncoding,

    #[error("Could not parse CSV: {0}")]
    MalformedCsv(String),

    #[error("Could not parse JSON: {0}")]
    MalformedJson(String),

    #[error("JSON object does not contain a list of records")]
    NoRecordList,

    #[error("Unsupported JSON structure; expected an array or an object containing one")]
    UnsupportedJsonShape,

    #[error("Record {0} is not a JSON object")]
    NonObjectRecord(usize),

    #[error("Fields '{first}' and '{second}' both map to '{canonical}'")]
    AmbiguousColumn {
        canonical: String,
        first: String,
        second: String,
    },

    #[error("No '{0}' column found in upload")]
    MissingColumn(String),

    #[error("Invalid timezone override: {0}")]
    InvalidTimezone(String),
}

/// Raw request payload, before parsing
#[derive(Debug, Clone, PartialEq)]
pub enum UploadSource {
    /// Multipart file part; format comes from the extension
    File { name: String, bytes: Vec<u8> },
    /// `application/json` request body
    JsonBody(Vec<u8>),
}

impl UploadSource {
    fn into_parsed(self) -> Result<ParsedBatch, IngestError> {
        match self {
            UploadSource::File { name, bytes } => {
                parse::parse(InputFormat::from_filename(&name)?, &bytes)
            }
            UploadSource::JsonBody(bytes) => parse::parse_json(&bytes),
        }
    }
}

/// Counts reported for one upload
///
/// `rows_dropped` covers sanitization only. A record the event logger
/// rejects lowers `rows_ingested` and shows up in `forward.failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub rows_received: usize,
    pub rows_ingested: usize,
    pub rows_dropped: usize,
    pub sanitize: SanitizeReport,
    pub forward: ForwardReport,
}

/// Ingest one upload end to end
pub async fn ingest(
    source: UploadSource,
    tz_override: Option<&str>,
    forwarder: &Forwarder,
) -> Result<IngestSummary, IngestError> {
    let tz = tz_override
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(time::parse_timezone)
        .transpose()
        .map_err(|e| match e {
            TimestampError::UnknownTimezone(name) => IngestError::InvalidTimezone(name),
            other => IngestError::InvalidTimezone(other.to_string()),
        })?;

    let batch = source.into_parsed()?;
    let rows_received = batch.records.len();
    if rows_received == 0 {
        info!("Upload contained no records");
        return Ok(IngestSummary::default());
    }

    let records = reconcile::reconcile(batch)?;
    let sanitized = sanitize::sanitize(records, tz);
    let rows_dropped = sanitized.report.dropped();

    if sanitized.events.is_empty() {
        let report = &sanitized.report;
        info!(
            rows_received,
            rows_dropped,
            missing_fields = report.missing_fields,
            unresolvable_timestamps = report.unresolvable_timestamps,
            "No valid records after sanitization"
        );
        return Ok(IngestSummary {
            rows_received,
            rows_dropped,
            sanitize: sanitized.report,
            ..Default::default()
        });
    }

    info!(records = sanitized.events.len(), "Forwarding normalized records");
    let forward = forwarder.forward_all(&sanitized.events).await;

    let report = sanitized.report;
    info!(
        rows_received,
        rows_ingested = forward.forwarded,
        rows_dropped,
        missing_fields = report.missing_fields,
        unresolvable_timestamps = report.unresolvable_timestamps,
        duplicates = report.duplicates,
        forward_failures = forward.failed,
        "Upload complete"
    );

    Ok(IngestSummary {
        rows_received,
        rows_ingested: forward.forwarded,
        rows_dropped,
        sanitize: report,
        forward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger_client::EventLoggerClient;
    use std::time::Duration;

    fn unreachable_forwarder() -> Forwarder {
        // Nothing listens on port 9 locally
        let client =
            EventLoggerClient::new("http://127.0.0.1:9", "token", Duration::from_secs(2)).unwrap();
        Forwarder::new(client, 1)
    }

    fn json_body(text: &str) -> UploadSource {
        UploadSource::JsonBody(text.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_forward_failures_are_not_counted_as_dropped() {
        let body = r#"[
            {"timestamp": "2025-08-17T17:00:00Z", "signal": "ecg", "value": 0.1},
            {"timestamp": "2025-08-17T17:00:01Z", "signal": "ecg", "value": 0.2},
            {"timestamp": "2025-08-17T17:00:02Z", "value": 0.3}
        ]"#;

        let summary = ingest(json_body(body), None, &unreachable_forwarder())
            .await
            .unwrap();

        assert_eq!(summary.rows_received, 3);
        assert_eq!(summary.rows_ingested, 0);
        assert_eq!(summary.rows_dropped, 1);
        assert_eq!(summary.sanitize.missing_fields, 1);
        assert_eq!(summary.forward.attempted, 2);
        assert_eq!(summary.forward.failed, 2);
    }

    #[tokio::test]
    async fn test_breakdown_for_batch_with_nothing_to_forward() {
        let body = r#"{"records": [
            {"timestamp": "whenever", "signal": "ecg"},
            {"timestamp": "2025-08-17T17:00:00Z", "signal": ""}
        ]}"#;

        let summary = ingest(json_body(body), None, &unreachable_forwarder())
            .await
            .unwrap();

        assert_eq!(summary.rows_dropped, 2);
        assert_eq!(summary.sanitize.unresolvable_timestamps, 1);
        assert_eq!(summary.sanitize.missing_fields, 1);
        assert_eq!(summary.forward, ForwardReport::default());
    }

    #[tokio::test]
    async fn test_unknown_timezone_rejected_before_parsing() {
        let result = ingest(json_body("not json"), Some("Mars/Olympus"), &unreachable_forwarder()).await;
        assert!(matches!(result, Err(IngestError::InvalidTimezone(name)) if name == "Mars/Olympus"));
    }
}
