//! Read-path event reconstruction
//!
//! Fetches every logged event, keeps those whose embedded timestamp falls in
//! a half-open `[since, until)` window, and projects each by its `signal`
//! into a [`TypedEventView`]. Raw `ecg` samples, `st_depr` and unknown kinds
//! are not surfaced.

use chrono::{DateTime, Utc};
use pulse_common::events::{RawLoggedEvent, Signal, TypedEventView};
use pulse_common::{time, LooseValue};
use serde_json::{Map, Value};

use crate::logger_client::{EventLoggerClient, LoggerError};

/// Heart rate reported for every R-peak.
///
/// PLACEHOLDER: a real estimate needs the RR interval between consecutive
/// peaks, which is not computed. Do not treat this as a measurement.
pub const PLACEHOLDER_HR_ESTIMATE_BPM: u32 = 72;

/// Half-open UTC query window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl EventWindow {
    /// `None` when `since` is after `until`
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Option<Self> {
        (since <= until).then_some(Self { since, until })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.since <= instant && instant < self.until
    }
}

/// Embedded timestamp of a logged event, if present and parseable
fn event_instant(data: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let raw = data.get("timestamp")?;
    time::resolve(&LooseValue::from_json(raw.clone()), None).ok()
}

/// Scalar as text; objects, arrays and null yield `None`
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Project one logged event by its discriminant
pub fn project(data: &Map<String, Value>) -> Option<TypedEventView> {
    let signal = Signal::from(data.get("signal")?.as_str()?);
    let timestamp = scalar_text(data.get("timestamp"))?;
    let meta = data.get("meta").and_then(Value::as_object);
    let meta_text = |key: &str| scalar_text(meta.and_then(|m| m.get(key)));

    match signal {
        Signal::RPeak => Some(TypedEventView::RPeak {
            timestamp,
            hr_estimate_bpm: PLACEHOLDER_HR_ESTIMATE_BPM,
            source: meta_text("source"),
        }),
        Signal::StElev => Some(TypedEventView::StElev {
            timestamp,
            magnitude_mv: data.get("value").and_then(Value::as_f64),
            lead: meta_text("lead"),
            source: meta_text("source"),
        }),
        Signal::MarkedEvent => Some(TypedEventView::MarkedEvent {
            timestamp,
            label: meta_text("label"),
            source: meta_text("source"),
        }),
        Signal::Ecg | Signal::StDepr | Signal::Other(_) => None,
    }
}

/// Filter to the window and project, preserving fetch order
pub fn reconstruct(raw: &[RawLoggedEvent], window: &EventWindow) -> Vec<TypedEventView> {
    raw.iter()
        .filter_map(|event| event.event_data.as_ref())
        .filter(|data| event_instant(data).is_some_and(|t| window.contains(t)))
        .filter_map(project)
        .collect()
}

/// Fetch from the logger and reconstruct the window
///
/// A logger failure fails the whole query.
pub async fn query_events(
    client: &EventLoggerClient,
    window: &EventWindow,
) -> Result<Vec<TypedEventView>, LoggerError> {
    let raw = client.fetch_all().await?;
    Ok(reconstruct(&raw, window))
}
