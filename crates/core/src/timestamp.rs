use chrono::{NaiveDate, NaiveDateTime};

use crate::error::CoreError;

/// Storage format for submission timestamps. Fixed-width so lexical order is chronological.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, CoreError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| CoreError::InvalidData(format!("bad timestamp {s:?}: {e}")))
}

/// Accepts either a bare date or a full timestamp; only the date part is kept.
pub fn parse_date(s: &str) -> Result<NaiveDate, CoreError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| parse_timestamp(s).map(|ts| ts.date()))
        .map_err(|_| CoreError::InvalidData(format!("bad date {s:?}")))
}
