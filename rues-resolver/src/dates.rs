//! Registration date normalization
//!
//! Registry sources publish dates in several shapes. Everything is reduced to
//! an ISO `YYYY-MM-DD` string; anything unrecognised becomes `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Epoch values above this are milliseconds
const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

static DOTNET_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/Date\((-?\d+)(?:[+-]\d{4})?\)/$").expect("valid regex"));

/// `2015-03-09`, `2015/03`, `09/03/2015`, `9-3-2015`
static DATE_SHAPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}[-/]\d{1,2}(?:[-/]\d{1,2})?|\d{1,2}[-/]\d{1,2}[-/]\d{4}").expect("valid regex")
});

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Normalize a raw date value to `YYYY-MM-DD`
pub fn to_iso_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    parse_date(s).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Blank out date-shaped tokens so a 4-digit scan cannot land on a year
pub fn without_dates(text: &str) -> Cow<'_, str> {
    DATE_SHAPED.replace_all(text, " ")
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }

    if let Some(caps) = DOTNET_DATE.captures(s) {
        let millis: i64 = caps[1].parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive());
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        if s.len() == 8 {
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
                return Some(date);
            }
        }
        let value: i64 = s.parse().ok()?;
        let dt = if value > EPOCH_MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(value)
        } else {
            DateTime::from_timestamp(value, 0)
        };
        return dt.map(|dt| dt.date_naive());
    }

    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}
