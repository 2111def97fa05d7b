//! Timestamp coercion.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::value::SqlValue;

const FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses an ISO-8601-like timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM[:SS[.f]]` with either a space or `T` separator,
/// RFC 3339 with an offset (converted to UTC), and a bare `YYYY-MM-DD`
/// (midnight).
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub(super) fn to_timestamp(value: SqlValue) -> Result<SqlValue, String> {
    match value {
        SqlValue::Timestamp(ts) => Ok(SqlValue::Timestamp(ts)),
        SqlValue::Text(s) => parse_timestamp(&s)
            .map(SqlValue::Timestamp)
            .ok_or_else(|| format!("'{s}' is not a valid timestamp")),
        SqlValue::Int(secs) => DateTime::from_timestamp(secs, 0)
            .map(|dt| SqlValue::Timestamp(dt.naive_utc()))
            .ok_or_else(|| format!("{secs} is out of timestamp range")),
        other => Err(format!("{other} is not a valid timestamp")),
    }
}
