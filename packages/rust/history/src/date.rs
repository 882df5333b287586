//! Commit date parsing for the formats `git log` can emit.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Formats carrying an explicit UTC offset, tried in order.
const OFFSET_FORMATS: &[&str] = &[
    // git default: `Mon Mar 4 10:00:00 2024 +0100`
    "%a %b %d %H:%M:%S %Y %z",
    // --date=iso: `2024-03-04 10:00:00 +0100`
    "%Y-%m-%d %H:%M:%S %z",
];

/// Formats without an offset; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%a %b %d %H:%M:%S %Y", "%Y-%m-%d %H:%M:%S"];

/// Parse the value of a `Date:` header.
///
/// Returns `None` when no supported format matches.
pub fn parse_git_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt);
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}
