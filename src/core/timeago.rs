//! Relative time
//!
//! Fuzzy "x ago" strings for table cells and the `timeago` template function.

use chrono::{DateTime, Utc};

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("about 1 {unit} ago")
    } else {
        format!("about {n} {unit}s ago")
    }
}

/// Fuzzy distance from `then` to `now`
pub fn fuzzy_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let ago = now.signed_duration_since(then);
    let minutes = ago.num_minutes();
    let hours = ago.num_hours();
    if minutes < 1 {
        "less than a minute ago".to_string()
    } else if hours < 1 {
        plural(minutes, "minute")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if hours < 24 * 30 {
        plural(hours / 24, "day")
    } else if hours < 24 * 365 {
        plural(hours / 24 / 30, "month")
    } else {
        plural(hours / 24 / 365, "year")
    }
}

/// Compact form for narrow columns: `5m`, `3h`, `12d`, then a date
pub fn fuzzy_ago_abbr(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let ago = now.signed_duration_since(then);
    if ago.num_hours() < 1 {
        format!("{}m", ago.num_minutes().max(0))
    } else if ago.num_hours() < 24 {
        format!("{}h", ago.num_hours())
    } else if ago.num_days() < 30 {
        format!("{}d", ago.num_days())
    } else {
        then.format("%b %-d, %Y").to_string()
    }
}
