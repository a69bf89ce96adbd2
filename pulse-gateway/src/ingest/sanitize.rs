//! Record sanitization
//!
//! Rules, in order:
//! 1. drop records without `timestamp` or `signal`
//! 2. drop records whose timestamp does not resolve
//! 3. stable sort by resolved timestamp
//! 4. drop later duplicates of an identical (timestamp, signal) pair
//!
//! `meta` values that are NaN or infinite become explicit nulls.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use pulse_common::events::{CanonicalEvent, Meta, Signal, Unit};
use pulse_common::time::{self, TimestampError};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use super::reconcile::ReconciledRecord;

/// Why a single record was rejected
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing mandatory field '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

/// Drop accounting for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    pub received: usize,
    pub missing_fields: usize,
    pub unresolvable_timestamps: usize,
    pub duplicates: usize,
    pub kept: usize,
}

impl SanitizeReport {
    /// Always `received - kept`, whatever rule caused the drop
    pub fn dropped(&self) -> usize {
        self.received - self.kept
    }
}

/// Final ingestible sequence plus its accounting
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedBatch {
    pub events: Vec<CanonicalEvent>,
    pub report: SanitizeReport,
}

/// Validate one reconciled record into a canonical event
pub fn to_canonical(
    record: &ReconciledRecord,
    tz_override: Option<Tz>,
) -> Result<CanonicalEvent, RecordError> {
    let raw_timestamp = record
        .timestamp
        .as_ref()
        .filter(|v| !v.is_missing())
        .ok_or(RecordError::MissingField("timestamp"))?;
    let signal = record
        .signal
        .as_ref()
        .filter(|v| !v.is_missing())
        .and_then(|v| v.as_text())
        .map(|s| Signal::from(s.trim()))
        .ok_or(RecordError::MissingField("signal"))?;

    let timestamp = time::resolve(raw_timestamp, tz_override)?;

    let value = record.value.as_ref().and_then(|v| {
        let parsed = v.as_f64();
        if parsed.is_none() && !v.is_missing() {
            debug!(value = ?v, "Non-numeric value discarded");
        }
        parsed
    });

    let unit = record
        .unit
        .as_ref()
        .filter(|v| !v.is_missing())
        .and_then(|v| v.as_text())
        .map(|s| Unit::from(s.trim()));

    let meta: Meta = record
        .meta
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();

    Ok(CanonicalEvent::new(timestamp, signal, value, unit, meta))
}

/// Stable-sort by timestamp, then keep the first of each (timestamp, signal)
///
/// Returns the survivors and the number of duplicates removed.
pub fn sort_and_dedup(mut events: Vec<CanonicalEvent>) -> (Vec<CanonicalEvent>, usize) {
    events.sort_by_key(|e| e.timestamp());

    let before = events.len();
    let mut seen: HashSet<(DateTime<Utc>, Signal)> = HashSet::with_capacity(before);
    events.retain(|e| seen.insert((e.timestamp(), e.signal().clone())));

    let removed = before - events.len();
    (events, removed)
}

/// Run every sanitization rule over a reconciled batch
pub fn sanitize(records: Vec<ReconciledRecord>, tz_override: Option<Tz>) -> SanitizedBatch {
    let mut report = SanitizeReport {
        received: records.len(),
        ..Default::default()
    };

    let mut valid = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match to_canonical(record, tz_override) {
            Ok(event) => valid.push(event),
            Err(RecordError::MissingField(field)) => {
                debug!(row = index, field, "Dropping record with missing field");
                report.missing_fields += 1;
            }
            Err(RecordError::Timestamp(e)) => {
                debug!(row = index, error = %e, "Dropping record with unresolvable timestamp");
                report.unresolvable_timestamps += 1;
            }
        }
    }

    let (events, duplicates) = sort_and_dedup(valid);
    report.duplicates = duplicates;
    report.kept = events.len();

    SanitizedBatch { events, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::LooseValue;
    use std::collections::BTreeMap;

    fn text(s: &str) -> LooseValue {
        LooseValue::Text(s.to_string())
    }

    fn rec(ts: Option<&str>, signal: Option<&str>, value: Option<f64>) -> ReconciledRecord {
        ReconciledRecord {
            timestamp: ts.map(text),
            signal: signal.map(text),
            value: value.map(LooseValue::Number),
            unit: None,
            meta: BTreeMap::new(),
        }
    }

    const T0: &str = "2025-08-17T17:00:00Z";
    const T1: &str = "2025-08-17T17:00:01Z";
    const T2: &str = "2025-08-17T17:00:02Z";

    #[test]
    fn test_missing_fields_dropped_and_counted() {
        let batch = sanitize(
            vec![
                rec(Some(T0), Some("ecg"), Some(0.8)),
                rec(None, Some("ecg"), Some(0.9)),
                rec(Some(T2), None, Some(0.9)),
                rec(Some("2025-08-17T17:00:03Z"), Some("ecg"), Some(1.0)),
            ],
            None,
        );

        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.report.missing_fields, 2);
        assert_eq!(batch.report.dropped(), 2);
    }

    #[test]
    fn test_blank_signal_counts_as_missing() {
        let batch = sanitize(vec![rec(Some(T0), Some("  "), None)], None);
        assert_eq!(batch.report.missing_fields, 1);
        assert!(batch.events.is_empty());
    }

    #[test]
    fn test_unresolvable_timestamp_dropped() {
        let batch = sanitize(
            vec![rec(Some("not a time"), Some("ecg"), None), rec(Some(T0), Some("ecg"), None)],
            None,
        );
        assert_eq!(batch.report.unresolvable_timestamps, 1);
        assert_eq!(batch.report.kept, 1);
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let batch = sanitize(
            vec![
                rec(Some(T2), Some("ecg"), Some(0.9)),
                rec(Some(T0), Some("ecg"), Some(0.8)),
                rec(Some(T0), Some("ecg"), Some(0.8)),
                rec(Some(T1), Some("r_peak"), None),
            ],
            None,
        );

        let order: Vec<String> = batch.events.iter().map(|e| e.timestamp().to_rfc3339()).collect();
        assert_eq!(
            order,
            vec![
                "2025-08-17T17:00:00+00:00",
                "2025-08-17T17:00:01+00:00",
                "2025-08-17T17:00:02+00:00"
            ]
        );
        assert_eq!(batch.report.duplicates, 1);
        assert_eq!(batch.report.dropped(), 1);
    }

    #[test]
    fn test_same_timestamp_different_signal_kept_in_first_seen_order() {
        let batch = sanitize(
            vec![
                rec(Some(T1), Some("ecg"), Some(0.4)),
                rec(Some(T0), Some("r_peak"), None),
                rec(Some(T1), Some("marked_event"), None),
                rec(Some(T0), Some("ecg"), Some(0.2)),
            ],
            None,
        );

        let signals: Vec<&str> = batch.events.iter().map(|e| e.signal().as_str()).collect();
        assert_eq!(signals, vec!["r_peak", "ecg", "ecg", "marked_event"]);
        assert_eq!(batch.report.duplicates, 0);
    }

    #[test]
    fn test_duplicate_keeps_first_seen_record() {
        let batch = sanitize(
            vec![rec(Some(T0), Some("ecg"), Some(0.1)), rec(Some(T0), Some("ecg"), Some(0.2))],
            None,
        );
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].value(), Some(0.1));
    }

    #[test]
    fn test_equivalent_instants_in_different_notation_are_duplicates() {
        let batch = sanitize(
            vec![
                rec(Some("2025-08-17T19:00:00+02:00"), Some("ecg"), None),
                rec(Some(T0), Some("ecg"), None),
                ReconciledRecord {
                    timestamp: Some(LooseValue::Number(1_755_450_000.0)),
                    signal: Some(text("ecg")),
                    ..Default::default()
                },
            ],
            None,
        );
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.report.duplicates, 2);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let batch = sanitize(
            vec![
                rec(Some(T2), Some("ecg"), None),
                rec(Some(T0), Some("ecg"), None),
                rec(Some(T0), Some("ecg"), None),
                rec(Some(T2), Some("ecg"), None),
            ],
            None,
        );
        let first_pass = batch.events.clone();
        let (second_pass, removed) = sort_and_dedup(batch.events);
        assert_eq!(removed, 0);
        assert_eq!(second_pass, first_pass);
    }

    #[test]
    fn test_accounting_reconciles_for_mixed_input() {
        let batch = sanitize(
            vec![
                rec(None, None, None),
                rec(Some("garbage"), Some("ecg"), None),
                rec(Some(T0), Some("ecg"), None),
                rec(Some(T0), Some("ecg"), None),
                rec(Some(T1), Some("st_depr"), Some(-0.1)),
            ],
            None,
        );
        let r = batch.report;
        assert_eq!(r.received, 5);
        assert_eq!(r.missing_fields + r.unresolvable_timestamps + r.duplicates + r.kept, r.received);
        assert_eq!(r.kept, 2);
    }

    #[test]
    fn test_meta_nan_becomes_null_and_value_typed() {
        let mut meta = BTreeMap::new();
        meta.insert("gain".to_string(), LooseValue::Number(f64::NAN));
        meta.insert("lead".to_string(), text("II"));
        let record = ReconciledRecord {
            timestamp: Some(text(T0)),
            signal: Some(text("st_elev")),
            value: Some(text("0.15")),
            unit: Some(text("mV")),
            meta,
        };

        let event = to_canonical(&record, None).unwrap();
        assert_eq!(event.value(), Some(0.15));
        assert_eq!(event.unit(), Some(&Unit::MilliVolt));
        assert_eq!(event.meta().get("gain"), Some(&serde_json::Value::Null));
        assert_eq!(event.meta().get("lead"), Some(&serde_json::json!("II")));
    }
}
