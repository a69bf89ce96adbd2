//! Upload body parsing
//!
//! Turns a CSV or JSON payload into a uniform list of loose records (field
//! name → [`LooseValue`]). No field names are interpreted here.

use pulse_common::LooseValue;
use serde_json::Value;
use std::collections::BTreeMap;

use super::IngestError;

/// One record before reconciliation
pub type LooseRecord = BTreeMap<String, LooseValue>;

/// Wire format of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Pick the format from a file name's extension (case-insensitive)
    pub fn from_filename(name: &str) -> Result<Self, IngestError> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Ok(InputFormat::Csv)
        } else if lower.ends_with(".json") {
            Ok(InputFormat::Json)
        } else {
            Err(IngestError::UnsupportedFormat(name.to_string()))
        }
    }
}

/// Parsed upload awaiting reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBatch {
    pub format: InputFormat,
    pub records: Vec<LooseRecord>,
}

pub fn parse(format: InputFormat, bytes: &[u8]) -> Result<ParsedBatch, IngestError> {
    match format {
        InputFormat::Csv => parse_csv(bytes),
        InputFormat::Json => parse_json(bytes),
    }
}

/// Parse CSV with a header row
///
/// Short rows are padded with nulls; long rows and duplicate headers are
/// rejected.
pub fn parse_csv(bytes: &[u8]) -> Result<ParsedBatch, IngestError> {
    let text = std::str::from_utf8(bytes).map_err(|_| IngestError::InvalidEncoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::MalformedCsv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    for (i, header) in headers.iter().enumerate() {
        if headers[..i].contains(header) {
            return Err(IngestError::MalformedCsv(format!(
                "duplicate column '{}'",
                header
            )));
        }
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| IngestError::MalformedCsv(e.to_string()))?;
        if row.len() > headers.len() {
            return Err(IngestError::MalformedCsv(format!(
                "row {} has {} fields, header has {}",
                index + 1,
                row.len(),
                headers.len()
            )));
        }

        let record = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = row.get(i).map(LooseValue::from_csv_cell).unwrap_or(LooseValue::Null);
                (header.clone(), cell)
            })
            .collect();
        records.push(record);
    }

    Ok(ParsedBatch {
        format: InputFormat::Csv,
        records,
    })
}

/// Parse a JSON array of objects, or an object wrapping one
///
/// For a wrapping object the first array-valued field in document order is
/// the record list.
pub fn parse_json(bytes: &[u8]) -> Result<ParsedBatch, IngestError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| IngestError::MalformedJson(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or(IngestError::NoRecordList)?,
        _ => return Err(IngestError::UnsupportedJsonShape),
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, LooseValue::from_json(v)))
                .collect()),
            _ => Err(IngestError::NonObjectRecord(index)),
        })
        .collect::<Result<Vec<LooseRecord>, _>>()?;

    Ok(ParsedBatch {
        format: InputFormat::Json,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_filename() {
        assert_eq!(InputFormat::from_filename("a.csv").unwrap(), InputFormat::Csv);
        assert_eq!(InputFormat::from_filename("B.JSON").unwrap(), InputFormat::Json);
        assert!(matches!(
            InputFormat::from_filename("trace.xml"),
            Err(IngestError::UnsupportedFormat(name)) if name == "trace.xml"
        ));
    }

    #[test]
    fn test_csv_rows_keyed_by_header() {
        let csv = "timestamp,signal,value\n2025-08-17T17:00:00Z,ecg,0.8\n,r_peak\n";
        let batch = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(batch.format, InputFormat::Csv);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(
            batch.records[0]["timestamp"],
            LooseValue::Text("2025-08-17T17:00:00Z".to_string())
        );
        assert_eq!(batch.records[0]["value"], LooseValue::Number(0.8));
        // Missing trailing cell padded, empty cell null
        assert_eq!(batch.records[1]["timestamp"], LooseValue::Null);
        assert_eq!(batch.records[1]["value"], LooseValue::Null);
    }

    #[test]
    fn test_csv_bom_and_header_only() {
        let batch = parse_csv("\u{feff}timestamp,signal\n".as_bytes()).unwrap();
        assert!(batch.records.is_empty());
    }

    #[test]
    fn test_csv_rejects_long_rows_and_duplicate_headers() {
        assert!(matches!(
            parse_csv(b"timestamp,signal\na,b,c\n"),
            Err(IngestError::MalformedCsv(_))
        ));
        assert!(matches!(
            parse_csv(b"signal,signal\na,b\n"),
            Err(IngestError::MalformedCsv(_))
        ));
        assert!(matches!(
            parse_csv(&[0xff, 0xfe, 0x00]),
            Err(IngestError::InvalidEncoding)
        ));
    }

    #[test]
    fn test_json_array_and_wrapped_object() {
        let batch = parse_json(br#"[{"timestamp": 1, "signal": "ecg"}]"#).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0]["timestamp"], LooseValue::Number(1.0));

        let wrapped = br#"{"device": "holter", "records": [{"signal": "ecg"}, {"signal": "r_peak"}], "other": []}"#;
        let batch = parse_json(wrapped).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1]["signal"], LooseValue::Text("r_peak".to_string()));
    }

    #[test]
    fn test_json_shape_errors() {
        assert!(matches!(parse_json(b"{\"a\": 1}"), Err(IngestError::NoRecordList)));
        assert!(matches!(parse_json(b"42"), Err(IngestError::UnsupportedJsonShape)));
        assert!(matches!(parse_json(b"[1, 2]"), Err(IngestError::NonObjectRecord(0))));
        assert!(matches!(parse_json(b"{not json"), Err(IngestError::MalformedJson(_))));
    }
}
