//! Normalization rules shared by the dedup index, the status merge and the
//! timeslot sync. Two values compare equal only after passing through the
//! same function here.

use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;

/// Canonical rendering of timestamps and timeslots.
pub const CANONICAL_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

const LOCAL_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y, %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Render a timestamp in `tz` for dedup keys.
///
/// Instants carrying an offset (RFC 3339) are converted into `tz`; naive
/// values are taken as already local. Text that parses as neither is returned
/// trimmed so that it still compares equal to itself.
pub fn normalize_timestamp(raw: &str, tz: Tz) -> String {
    let trimmed = raw.trim();
    parse_instant(trimmed, tz).unwrap_or_else(|| trimmed.to_string())
}

/// Normalize a timeslot cell to `dd/MM/yyyy HH:mm:ss`.
///
/// Accepts `d/M/yyyy H:mm[:ss]` (optionally prefixed by an apostrophe, as
/// spreadsheets export text-forced cells) and RFC 3339 instants. Returns
/// `None` for anything else.
pub fn normalize_timeslot(raw: &str, tz: Tz) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('\'').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in &LOCAL_FORMATS[..2] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.format(CANONICAL_FORMAT).to_string());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&tz).format(CANONICAL_FORMAT).to_string())
}

fn parse_instant(value: &str, tz: Tz) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&tz).format(CANONICAL_FORMAT).to_string());
    }
    LOCAL_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| naive.format(CANONICAL_FORMAT).to_string())
    })
}

/// Lowercase, trim and collapse inner whitespace.
pub fn clean_subject(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// [`clean_subject`] plus folding of typographic quotes, for title lookups.
pub fn normalize_title(raw: &str) -> String {
    clean_subject(raw)
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect()
}
