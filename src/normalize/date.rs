//! Best-effort calendar date parsing for listing dates.
//!
//! Formats are tried in a fixed order: ISO `YYYY-MM-DD`, `DD-MM-YYYY`,
//! `DD/MM/YYYY`, the short `"<day> <month>"` form (year inferred from a
//! reference date), then a handful of general layouts. Anything else is a
//! [`ScraperError::MalformedDate`].

use crate::error::{Result, ScraperError};
use chrono::{DateTime, Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex"));
static DMY_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{2})-(\d{2})-(\d{4})$").expect("valid regex"));
static DMY_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("valid regex"));
static ISO_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[T ]").expect("valid regex"));
static YMD_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})$").expect("valid regex"));
static DMY_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("valid regex"));
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\b").expect("valid regex"));

/// English and Dutch month names and abbreviations.
const MONTHS: &[(&str, u32)] = &[
    ("jan", 1), ("january", 1), ("januari", 1),
    ("feb", 2), ("february", 2), ("februari", 2),
    ("mar", 3), ("mrt", 3), ("march", 3), ("maart", 3),
    ("apr", 4), ("april", 4),
    ("may", 5), ("mei", 5),
    ("jun", 6), ("june", 6), ("juni", 6),
    ("jul", 7), ("july", 7), ("juli", 7),
    ("aug", 8), ("august", 8), ("augustus", 8),
    ("sep", 9), ("sept", 9), ("september", 9),
    ("oct", 10), ("okt", 10), ("october", 10), ("oktober", 10),
    ("nov", 11), ("november", 11),
    ("dec", 12), ("december", 12),
];

/// Look up a month number from an English or Dutch name, case-insensitive.
pub fn month_number(name: &str) -> Option<u32> {
    let key = name.trim().trim_end_matches(['.', ',']).to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == key)
        .map(|(_, number)| *number)
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Parse `"<day> <month-name>"`, inferring the year from `today`: a month
/// earlier than today's month belongs to next year, otherwise this year.
pub fn parse_short_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() != 2 {
        return None;
    }
    let day: u32 = parts[0].trim_end_matches('.').parse().ok()?;
    let month = month_number(parts[1])?;
    let year = if month < today.month() {
        today.year() + 1
    } else {
        today.year()
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Fallback layouts for dates that carry their own year.
fn parse_general(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Some(caps) = ISO_PREFIX.captures(text) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = YMD_SLASH.captures(text) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = DMY_DOT.captures(text) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }

    let cleaned = text.replace(',', " ");
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    if parts.len() == 3 {
        // "1 december 2025"
        if let (Ok(day), Some(month), Ok(year)) = (
            parts[0].trim_end_matches('.').parse::<u32>(),
            month_number(parts[1]),
            parts[2].parse::<i32>(),
        ) {
            return NaiveDate::from_ymd_opt(year, month, day);
        }
        // "December 1, 2025"
        if let (Some(month), Ok(day), Ok(year)) = (
            month_number(parts[0]),
            parts[1].parse::<u32>(),
            parts[2].parse::<i32>(),
        ) {
            return NaiveDate::from_ymd_opt(year, month, day);
        }
    }
    None
}

/// Normalize free-form date text to a calendar date.
pub fn normalize_date(text: &str, today: NaiveDate) -> Result<NaiveDate> {
    let trimmed = text.trim();
    let malformed = || ScraperError::MalformedDate(trimmed.to_string());

    if let Some(caps) = ISO_DATE.captures(trimmed) {
        return ymd(&caps[1], &caps[2], &caps[3]).ok_or_else(malformed);
    }
    if let Some(caps) = DMY_DASH.captures(trimmed) {
        return ymd(&caps[3], &caps[2], &caps[1]).ok_or_else(malformed);
    }
    if let Some(caps) = DMY_SLASH.captures(trimmed) {
        return ymd(&caps[3], &caps[2], &caps[1]).ok_or_else(malformed);
    }
    if let Some(date) = parse_short_date(trimmed, today) {
        return Ok(date);
    }
    parse_general(trimmed).ok_or_else(malformed)
}

/// Resolve an event's length in days.
///
/// An explicit end date wins; then `duration` read as an end date; then a
/// leading integer in `duration` ("3", "3 dagen"); otherwise 1.
/// The result is never below 1.
pub fn duration_days(
    start: NaiveDate,
    end_date: Option<&str>,
    duration: Option<&str>,
    today: NaiveDate,
) -> u32 {
    let days_until = |end: NaiveDate| -> u32 {
        let diff = (end - start).num_days().unsigned_abs();
        u32::try_from(diff).unwrap_or(u32::MAX).max(1)
    };

    if let Some(end) = end_date.and_then(|e| normalize_date(e, today).ok()) {
        return days_until(end);
    }

    let Some(duration) = duration.map(str::trim).filter(|d| !d.is_empty()) else {
        return 1;
    };
    // Dates first: "2025-12-03" also starts with a number
    if let Ok(end) = normalize_date(duration, today) {
        return days_until(end);
    }
    LEADING_NUMBER
        .captures(duration)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}
