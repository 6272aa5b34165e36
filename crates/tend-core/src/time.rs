//! Human-friendly timestamps

use chrono::{DateTime, Local, Utc};

const INTERVALS: &[(&str, i64)] = &[
    ("year", 31_536_000),
    ("month", 2_592_000),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
    ("second", 1),
];

/// Format `then` relative to `now`, e.g. "2 minutes ago"
///
/// Timestamps in the future are shown as a local date instead.
pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then).num_seconds();

    if elapsed < 0 {
        return then
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
    }

    for (label, seconds) in INTERVALS {
        let count = elapsed / seconds;
        if count >= 1 {
            let plural = if count > 1 { "s" } else { "" };
            return format!("{} {}{} ago", count, label, plural);
        }
    }

    "just now".to_string()
}

/// Format a timestamp relative to the current time
pub fn relative_to_now(then: DateTime<Utc>) -> String {
    format_relative_time(then, Utc::now())
}
