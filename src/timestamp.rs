//! Best-effort timestamp parsing for persisted values.

use chrono::{DateTime, TimeZone, Utc};

/// Parse an integer epoch (seconds), an RFC 3339 string, or the
/// `"%Y-%m-%d %H:%M:%S %z"` form written by older clients.
///
/// Returns `None` for blank or unrecognised input.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z"))
        .map(|t| t.with_timezone(&Utc))
        .ok()
}
