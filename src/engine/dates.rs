use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};

use crate::model::Ms;

const DAY_MS: f64 = 86_400_000.0;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Calendar date of an ISO-8601 date or date-time. `None` when unreadable.
///
/// A date-time with an offset yields the date in that offset.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    parse_naive_datetime(raw).map(|dt| dt.date())
}

/// Unix milliseconds of an ISO-8601 date or date-time. Naive values are read as UTC.
pub fn parse_timestamp_ms(raw: &str) -> Option<Ms> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
    }
    parse_naive_datetime(raw).map(|dt| dt.and_utc().timestamp_millis())
}

fn parse_naive_datetime(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

pub fn nights_between(check_in: &str, check_out: &str) -> i64 {
    match (parse_timestamp_ms(check_in), parse_timestamp_ms(check_out)) {
        (Some(start), Some(end)) => ((end - start) as f64 / DAY_MS).ceil() as i64,
        _ => 0,
    }
}

/// First day past the seven-day window starting at `today`.
pub(super) fn week_end(today: NaiveDate) -> Option<NaiveDate> {
    today.checked_add_days(Days::new(7))
}
