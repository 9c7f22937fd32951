use chrono::{DateTime, Local, NaiveDateTime};

/// Display format for backend timestamps.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a backend timestamp as `YYYY-MM-DD HH:MM:SS`.
///
/// Accepts RFC 3339 (converted to local time) and zone-less ISO values such as
/// `2025-03-01T08:30:00` or `2025-03-01 08:30:00.123`. Anything else is
/// returned unchanged.
pub fn format_timestamp(value: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return dt.format(TIMESTAMP_FORMAT).to_string();
        }
    }
    value.to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
