use chrono::{DateTime, NaiveDate};

use super::value::FieldValue;

/// Candidate input formats, tried in order.
pub const DATE_INPUT_FORMATS: [&str; 5] = ["%d-%m-%Y", "%d/%m/%Y", "%m-%d-%Y", "%m/%d/%Y", "%Y-%m-%d"];

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// Milliseconds since the Unix epoch to a calendar date.
///
/// The day is the UTC calendar day, independent of the host time zone.
pub fn date_from_epoch_millis(ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

pub fn format_epoch_millis(ms: i64, fmt: &str) -> Option<String> {
    date_from_epoch_millis(ms).map(|d| d.format(fmt).to_string())
}

/// Drops a trailing time component: `"2025-01-15 10:30:00"` and
/// `"2025-01-15T10:30:00Z"` both become `"2025-01-15"`.
pub fn strip_time(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some((head, _)) = s.split_once(' ') {
        s = head;
    }
    if let Some((head, _)) = s.split_once('T')
        && head.len() >= 8
        && head.starts_with(|c: char| c.is_ascii_digit())
    {
        s = head;
    }
    s
}

pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let s = strip_time(raw);
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Canonicalizes a date field value to `YYYY-MM-DD`.
///
/// Integers and digit-only strings are epoch milliseconds. Other strings lose
/// their time part and go through [`DATE_INPUT_FORMATS`]; anything that still
/// fails to parse is returned time-stripped. Applying it twice changes nothing.
pub fn normalize_date_value(value: &FieldValue) -> Result<FieldValue, DateError> {
    match value {
        FieldValue::Int(ms) => from_millis(*ms),
        FieldValue::Float(f) if f.fract() == 0.0 => from_millis(*f as i64),
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                let ms: i64 = trimmed
                    .parse()
                    .map_err(|_| DateError::OutOfRange(trimmed.to_string()))?;
                return from_millis(ms);
            }
            match parse_date_text(trimmed) {
                Some(date) => Ok(FieldValue::Text(date.format(CANONICAL_FORMAT).to_string())),
                None => Ok(FieldValue::Text(strip_time(trimmed).to_string())),
            }
        }
        other => Ok(other.clone()),
    }
}

fn from_millis(ms: i64) -> Result<FieldValue, DateError> {
    format_epoch_millis(ms, CANONICAL_FORMAT)
        .map(FieldValue::Text)
        .ok_or_else(|| DateError::OutOfRange(ms.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum DateError {
    #[error("epoch timestamp out of range: {0}")]
    OutOfRange(String),
}
