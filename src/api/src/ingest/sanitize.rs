//! Lenient field parsing for raw CSV cells.
//!
//! Every function takes the raw cell (`None` when the column is absent) and
//! returns a typed `Option`. Sentinel tokens and unparseable values both come
//! back as `None`; deciding whether a missing value matters is left to the
//! record builders.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Literal tokens the dataset uses to mean "no value"
pub const NULL_TOKENS: [&str; 6] = ["\\N", "", "nan", "None", "NULL", "N/A"];

/// Time-of-day format used by race start times and pit stop timestamps
pub const TIME_FORMAT: &str = "%H:%M:%S";

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Check if a raw cell is one of the null sentinels
pub fn is_null(raw: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(value) => NULL_TOKENS.contains(&value.trim()),
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    if is_null(raw) {
        None
    } else {
        raw.map(str::trim)
    }
}

/// Trimmed string, or `None` for sentinels
pub fn clean_str(raw: Option<&str>) -> Option<String> {
    present(raw).map(str::to_string)
}

/// Finite float
pub fn clean_float(raw: Option<&str>) -> Option<f64> {
    present(raw)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Integer parsed through a float, so "3.0" reads as 3.
///
/// Fractional values truncate toward zero.
pub fn clean_int(raw: Option<&str>) -> Option<i64> {
    let value = present(raw)?;
    if let Ok(i) = value.parse::<i64>() {
        return Some(i);
    }
    let f = clean_float(Some(value))?;
    if f < i64::MIN as f64 || f > i64::MAX as f64 {
        return None;
    }
    Some(f.trunc() as i64)
}

/// Calendar date; datetimes keep only their date part
pub fn clean_date(raw: Option<&str>) -> Option<NaiveDate> {
    let value = present(raw)?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Time of day in `HH:MM:SS`
pub fn clean_time(raw: Option<&str>) -> Option<NaiveTime> {
    present(raw).and_then(|v| NaiveTime::parse_from_str(v, TIME_FORMAT).ok())
}
