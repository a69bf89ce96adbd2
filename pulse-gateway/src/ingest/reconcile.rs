//! Schema reconciliation
//!
//! Maps legacy and current field names onto the canonical schema
//! (`timestamp`, `signal`, `value`, `unit`, `meta`) and rebuilds the `meta`
//! map when a CSV upload flattened it into `meta.<key>` columns.

use pulse_common::LooseValue;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::parse::{InputFormat, LooseRecord, ParsedBatch};
use super::IngestError;

/// Legacy field name → canonical field name
pub const FIELD_RENAMES: &[(&str, &str)] = &[
    ("Timestamp", "timestamp"),     // drift log CSV
    ("eventType", "signal"),        // drift log JSON
    ("Event Type", "signal"),       // drift log CSV
    ("ecgChannel", "value"),        // drift log JSON
    ("ECG Channel", "value"),       // drift log CSV
    ("type", "signal"),             // current export format
];

pub const CANONICAL_FIELDS: &[&str] = &["timestamp", "signal", "value", "unit", "meta"];

const META_PREFIX: &str = "meta.";

/// Record carrying only canonical fields
///
/// Field values are still loose; typing happens during sanitization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledRecord {
    pub timestamp: Option<LooseValue>,
    pub signal: Option<LooseValue>,
    pub value: Option<LooseValue>,
    pub unit: Option<LooseValue>,
    pub meta: BTreeMap<String, LooseValue>,
}

/// Canonical name for an input field (unchanged when no rename applies)
pub fn canonical_name(field: &str) -> &str {
    FIELD_RENAMES
        .iter()
        .find(|(legacy, _)| *legacy == field)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(field)
}

/// Rename one record's fields, rejecting two sources for one canonical name
fn rename_fields(record: LooseRecord) -> Result<LooseRecord, IngestError> {
    let mut renamed = LooseRecord::new();
    let mut origins: BTreeMap<String, String> = BTreeMap::new();

    for (field, value) in record {
        let canonical = canonical_name(&field).to_string();
        if let Some(previous) = origins.get(&canonical) {
            return Err(IngestError::AmbiguousColumn {
                canonical,
                first: previous.clone(),
                second: field,
            });
        }
        origins.insert(canonical.clone(), field);
        renamed.insert(canonical, value);
    }

    Ok(renamed)
}

/// Decode an explicit `meta` field into a map
///
/// Objects pass through, JSON-object text is decoded, anything else is empty.
fn coerce_meta(value: Option<LooseValue>) -> BTreeMap<String, LooseValue> {
    match value {
        Some(LooseValue::Map(map)) => map,
        Some(LooseValue::Text(text)) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json @ serde_json::Value::Object(_)) => match LooseValue::from_json(json) {
                LooseValue::Map(map) => map,
                _ => BTreeMap::new(),
            },
            _ => BTreeMap::new(),
        },
        _ => BTreeMap::new(),
    }
}

/// Pull `meta.<key>` fields out of a record into a nested map
fn regroup_flat_meta(record: &mut LooseRecord) -> BTreeMap<String, LooseValue> {
    let flat_keys: Vec<String> = record
        .keys()
        .filter(|k| k.starts_with(META_PREFIX))
        .cloned()
        .collect();

    flat_keys
        .into_iter()
        .filter_map(|key| {
            let value = record.remove(&key)?;
            Some((key[META_PREFIX.len()..].to_string(), value))
        })
        .collect()
}

/// Reconcile a parsed batch onto the canonical schema
///
/// Batch-level failures: two input fields mapping to one canonical name, or
/// no record at all carrying a `timestamp` / `signal` field.
pub fn reconcile(batch: ParsedBatch) -> Result<Vec<ReconciledRecord>, IngestError> {
    if batch.records.is_empty() {
        return Ok(Vec::new());
    }

    let mut records = batch
        .records
        .into_iter()
        .map(rename_fields)
        .collect::<Result<Vec<_>, _>>()?;

    for required in ["timestamp", "signal"] {
        if !records.iter().any(|r| r.contains_key(required)) {
            return Err(IngestError::MissingColumn(required.to_string()));
        }
    }

    let has_meta = records.iter().any(|r| r.contains_key("meta"));
    let has_flat_meta = batch.format == InputFormat::Csv
        && records
            .iter()
            .any(|r| r.keys().any(|k| k.starts_with(META_PREFIX)));

    if !has_meta && has_flat_meta {
        info!("Detected flattened meta columns, regrouping into meta map");
    }

    let mut discarded = BTreeSet::new();
    let reconciled = records
        .iter_mut()
        .map(|record| {
            let meta = if has_meta {
                coerce_meta(record.remove("meta"))
            } else if has_flat_meta {
                regroup_flat_meta(record)
            } else {
                BTreeMap::new()
            };

            let reconciled = ReconciledRecord {
                timestamp: record.remove("timestamp"),
                signal: record.remove("signal"),
                value: record.remove("value"),
                unit: record.remove("unit"),
                meta,
            };
            discarded.extend(record.keys().cloned());
            reconciled
        })
        .collect();

    if !discarded.is_empty() {
        debug!(columns = ?discarded, "Discarded non-canonical fields");
    }

    Ok(reconciled)
}
