//! Shared utility functions for the tandem crate.

use chrono::{DateTime, Utc};

/// Default limit for error and diagnostic text.
pub const MAX_ERROR_CHARS: usize = 1800;

/// Marker appended to text cut by [`shorten`].
pub const TRUNCATED_MARKER: &str = "...[truncated]";

/// Trim `text` and cut it to at most `limit` characters, marking the cut.
pub fn shorten(text: &str, limit: usize) -> String {
    let raw = text.trim();
    match raw.char_indices().nth(limit) {
        Some((cut, _)) => format!("{} {}", &raw[..cut], TRUNCATED_MARKER),
        None => raw.to_string(),
    }
}

/// Human-readable duration: `42s`, `3m 7s`, `1h 0m 5s`.
pub fn format_duration(total_seconds: i64) -> String {
    let seconds = total_seconds.max(0);
    let (hours, rem) = (seconds / 3600, seconds % 3600);
    let (minutes, secs) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Current UTC time, used for every persisted timestamp.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Run identifier derived from the current UTC time, e.g. `20260119-140501Z`.
pub fn new_run_id() -> String {
    Utc::now().format("%Y%m%d-%H%M%SZ").to_string()
}
