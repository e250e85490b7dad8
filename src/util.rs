//! Shared time helpers for the Beholder crate.
//!
//! Timestamps live in the state store as RFC 3339 strings; everything here
//! converts between those, fractional minutes, and the phrasing used in
//! narrative comments.

use chrono::{DateTime, Utc};

/// Fractional minutes elapsed between two instants.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

/// Parse an RFC 3339 timestamp as written by the handlers.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Format fractional minutes for narrative text.
///
/// At most one decimal place, and whole values drop the fraction entirely:
/// `5`, not `5.0`.
pub fn format_minutes(minutes: f64) -> String {
    let rounded = (minutes * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded:.1}")
    }
}

/// Humanize a duration given in whole minutes: "a minute", "25 minutes",
/// "an hour", "3 hours", "a day", "2 days".
pub fn humanize_minutes(minutes: i64) -> String {
    match minutes {
        m if m < 2 => "a minute".to_string(),
        m if m < 45 => format!("{m} minutes"),
        m if m < 90 => "an hour".to_string(),
        m if m < 1320 => format!("{} hours", (m as f64 / 60.0).round() as i64),
        m if m < 2160 => "a day".to_string(),
        m => format!("{} days", (m as f64 / 1440.0).round() as i64),
    }
}
