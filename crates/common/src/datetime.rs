//! DateTime utilities.
//!
//! Events carry Unix seconds; passes and snapshots carry `DateTime<Utc>`.
//! These helpers convert between the two.

use chrono::{DateTime, NaiveDateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Get the current UTC time truncated to whole seconds.
pub fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    from_unix_seconds(now.timestamp()).unwrap_or(now)
}

/// Convert Unix seconds into a UTC datetime.
pub fn from_unix_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

/// Whole days elapsed from `earlier` to `now`, both in Unix seconds.
///
/// Uses floor division, so 89 days and 23 hours count as 89 days.
///
/// ```
/// use customer_analytics_common::datetime::whole_days_between;
///
/// assert_eq!(whole_days_between(0, 86_399), 0);
/// assert_eq!(whole_days_between(0, 86_400), 1);
/// ```
pub fn whole_days_between(earlier: i64, now: i64) -> i64 {
    (now - earlier).div_euclid(SECONDS_PER_DAY)
}

/// Parse a datetime string into a UTC DateTime.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and plain
/// Unix seconds.
///
/// ```
/// use customer_analytics_common::datetime::parse_datetime;
///
/// let dt = parse_datetime("2024-01-15T10:30:00Z").unwrap();
/// assert_eq!(dt.timestamp(), 1_705_314_600);
/// assert_eq!(parse_datetime("1705314600").unwrap(), dt);
/// ```
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<i64>() {
        return from_unix_seconds(seconds)
            .ok_or_else(|| format!("Timestamp out of range: {}", value));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| format!("Failed to parse datetime '{}': {}", value, e))
}

/// Format a DateTime as an RFC 3339 string.
pub fn format_datetime(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339()
}

/// Format a DateTime for display (human-readable).
pub fn format_datetime_display(datetime: &DateTime<Utc>) -> String {
    datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
