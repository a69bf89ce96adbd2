//! Timestamp utilities
//!
//! Resolves loosely-typed timestamp fields to UTC instants. Text is tried as
//! a calendar timestamp first and as Unix epoch seconds second; numbers are
//! always epoch seconds. An optional IANA timezone reinterprets textual
//! timestamps as local wall-clock time in that zone.

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use thiserror::Error;

use crate::events::LooseValue;

/// Timestamp resolution failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimestampError {
    /// Neither a calendar timestamp nor epoch seconds
    #[error("Unparseable timestamp: {0}")]
    Unparseable(String),

    /// Wall-clock time skipped by a DST transition in the override zone
    #[error("Local time {0} does not exist in {1}")]
    NonexistentLocalTime(NaiveDateTime, Tz),

    /// Timezone override is not a known IANA name
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Look up an IANA timezone by name
pub fn parse_timezone(name: &str) -> Result<Tz, TimestampError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimestampError::UnknownTimezone(name.to_string()))
}

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar text split into the written wall-clock and its offset, if any
#[derive(Debug, Clone, Copy, PartialEq)]
struct WallClock {
    local: NaiveDateTime,
    offset: Option<FixedOffset>,
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
];

fn parse_wall_clock(text: &str) -> Option<WallClock> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(WallClock {
            local: dt.naive_local(),
            offset: Some(*dt.offset()),
        });
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(WallClock {
                local: dt.naive_local(),
                offset: Some(*dt.offset()),
            });
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(local) = NaiveDateTime::parse_from_str(text, fmt) {
            // A trailing literal `Z` pins the text to UTC
            let offset = fmt.ends_with('Z').then(|| Utc.fix());
            return Some(WallClock { local, offset });
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|local| WallClock {
            local,
            offset: None,
        })
}

/// Interpret fractional Unix epoch seconds
pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp(whole as i64, nanos)
}

fn localize(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, TimestampError> {
    // Ambiguous (fold) times resolve to the earlier instant
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(TimestampError::NonexistentLocalTime(local, tz))
}

/// Resolve a textual timestamp
///
/// Without an override, a written offset is honoured and offset-less text is
/// taken as UTC. With an override, the written wall-clock is kept, any
/// written offset is discarded and the zone is attached instead.
pub fn resolve_text(text: &str, tz_override: Option<Tz>) -> Result<DateTime<Utc>, TimestampError> {
    if let Some(wall) = parse_wall_clock(text) {
        return match (tz_override, wall.offset) {
            (Some(tz), _) => localize(wall.local, tz),
            (None, Some(offset)) => offset
                .from_local_datetime(&wall.local)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| TimestampError::Unparseable(text.to_string())),
            (None, None) => Ok(Utc.from_utc_datetime(&wall.local)),
        };
    }

    text.trim()
        .parse::<f64>()
        .ok()
        .and_then(from_epoch_seconds)
        .ok_or_else(|| TimestampError::Unparseable(text.to_string()))
}

/// Resolve a loosely-typed timestamp field to a UTC instant
///
/// Epoch numbers are absolute instants and ignore the override.
pub fn resolve(value: &LooseValue, tz_override: Option<Tz>) -> Result<DateTime<Utc>, TimestampError> {
    match value {
        LooseValue::Text(text) => resolve_text(text, tz_override),
        LooseValue::Number(n) => {
            from_epoch_seconds(*n).ok_or_else(|| TimestampError::Unparseable(n.to_string()))
        }
        other => Err(TimestampError::Unparseable(format!("{:?}", other))),
    }
}
