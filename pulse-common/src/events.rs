//! ECG event types shared across pulse services
//!
//! Three shapes live here:
//! - [`LooseValue`]: dynamically-typed scalar produced by parsing CSV/JSON
//!   uploads before any schema is applied
//! - [`CanonicalEvent`]: the validated, immutable record forwarded to the
//!   event logger
//! - [`TypedEventView`]: UI-facing projections rebuilt from logged events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Event class tag attached to every forwarded ECG record
pub const ECG_EVENT_TYPE: &str = "ecg_data";

/// Source reported when a record carries no `meta.source`
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Canonical metadata map (always present, possibly empty)
pub type Meta = BTreeMap<String, serde_json::Value>;

// ========================================
// Loose (pre-schema) values
// ========================================

/// Dynamically-typed value read from an upload before reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum LooseValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<LooseValue>),
    Map(BTreeMap<String, LooseValue>),
}

impl LooseValue {
    /// Convert a parsed JSON value
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => LooseValue::Null,
            serde_json::Value::Bool(b) => LooseValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => LooseValue::Number(f),
                None => LooseValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => LooseValue::Text(s),
            serde_json::Value::Array(items) => {
                LooseValue::List(items.into_iter().map(LooseValue::from_json).collect())
            }
            serde_json::Value::Object(map) => LooseValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, LooseValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Infer a value from a raw CSV cell
    ///
    /// Empty cells are null, numeric text becomes a number (including
    /// `NaN`/`inf`, which are normalised later), everything else stays text.
    pub fn from_csv_cell(cell: &str) -> Self {
        if cell.is_empty() {
            return LooseValue::Null;
        }
        match cell.trim().parse::<f64>() {
            Ok(n) => LooseValue::Number(n),
            Err(_) => LooseValue::Text(cell.to_string()),
        }
    }

    /// True for null, non-finite numbers and blank strings
    pub fn is_missing(&self) -> bool {
        match self {
            LooseValue::Null => true,
            LooseValue::Number(n) => !n.is_finite(),
            LooseValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric reading, accepting numeric text
    pub fn as_f64(&self) -> Option<f64> {
        let n = match self {
            LooseValue::Number(n) => *n,
            LooseValue::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Scalar rendered as text (numbers keep their shortest form)
    pub fn as_text(&self) -> Option<String> {
        match self {
            LooseValue::Text(s) => Some(s.clone()),
            LooseValue::Number(n) if n.is_finite() => Some(format_number(*n)),
            LooseValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Convert to JSON; NaN and infinities become explicit nulls
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            LooseValue::Null => serde_json::Value::Null,
            LooseValue::Bool(b) => serde_json::Value::Bool(*b),
            LooseValue::Number(n) => json_number(*n),
            LooseValue::Text(s) => serde_json::Value::String(s.clone()),
            LooseValue::List(items) => {
                serde_json::Value::Array(items.iter().map(LooseValue::to_json).collect())
            }
            LooseValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Integral floats serialize as integers so `2.0` round-trips as `2`
fn json_number(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

// ========================================
// Signal / unit enumerations
// ========================================

/// Signal kind carried by an ECG event (the read-path discriminant)
///
/// Unknown kinds are preserved verbatim so they can still be forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    /// Raw waveform sample
    Ecg,
    RPeak,
    StElev,
    StDepr,
    MarkedEvent,
    Other(String),
}

impl Signal {
    pub fn as_str(&self) -> &str {
        match self {
            Signal::Ecg => "ecg",
            Signal::RPeak => "r_peak",
            Signal::StElev => "st_elev",
            Signal::StDepr => "st_depr",
            Signal::MarkedEvent => "marked_event",
            Signal::Other(s) => s,
        }
    }
}

impl From<&str> for Signal {
    fn from(s: &str) -> Self {
        match s {
            "ecg" => Signal::Ecg,
            "r_peak" => Signal::RPeak,
            "st_elev" => Signal::StElev,
            "st_depr" => Signal::StDepr,
            "marked_event" => Signal::MarkedEvent,
            other => Signal::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Signal::from(s.as_str()))
    }
}

/// Measurement unit (informational only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    MilliVolt,
    Bpm,
    Other(String),
}

impl Unit {
    pub fn as_str(&self) -> &str {
        match self {
            Unit::MilliVolt => "mV",
            Unit::Bpm => "bpm",
            Unit::Other(s) => s,
        }
    }
}

impl From<&str> for Unit {
    fn from(s: &str) -> Self {
        match s {
            "mV" => Unit::MilliVolt,
            "bpm" => Unit::Bpm,
            other => Unit::Other(other.to_string()),
        }
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ========================================
// Canonical event (write path)
// ========================================

/// Validated ECG record in the canonical schema
///
/// Only constructed after the timestamp resolved and a signal was present;
/// fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalEvent {
    #[serde(serialize_with = "serialize_rfc3339")]
    timestamp: DateTime<Utc>,
    signal: Signal,
    value: Option<f64>,
    unit: Option<Unit>,
    meta: Meta,
}

impl CanonicalEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        signal: Signal,
        value: Option<f64>,
        unit: Option<Unit>,
        meta: Meta,
    ) -> Self {
        Self {
            timestamp,
            signal,
            value: value.filter(|v| v.is_finite()),
            unit,
            meta,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// `meta.source` as text, or [`UNKNOWN_SOURCE`]
    pub fn source(&self) -> String {
        match self.meta.get("source") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => UNKNOWN_SOURCE.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

fn serialize_rfc3339<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&dt.to_rfc3339())
}

/// Body of one write call to the event logger
#[derive(Debug, Serialize)]
pub struct LoggedEventPayload<'a> {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub source: String,
    pub data: &'a CanonicalEvent,
}

impl<'a> LoggedEventPayload<'a> {
    pub fn ecg(event: &'a CanonicalEvent) -> Self {
        Self {
            event_type: ECG_EVENT_TYPE,
            source: event.source(),
            data: event,
        }
    }
}

// ========================================
// Read path
// ========================================

/// Wrapper returned by the event logger's fetch-all call
///
/// The inner payload is owned by the logger and only ever read here.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLoggedEvent {
    #[serde(default)]
    pub event_data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// UI-facing projection of a logged event, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedEventView {
    RPeak {
        timestamp: String,
        hr_estimate_bpm: u32,
        source: Option<String>,
    },
    StElev {
        timestamp: String,
        magnitude_mv: Option<f64>,
        lead: Option<String>,
        source: Option<String>,
    },
    MarkedEvent {
        timestamp: String,
        label: Option<String>,
        source: Option<String>,
    },
}
