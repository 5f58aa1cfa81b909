//! Validation and parsing utilities

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::types::*;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Validate a trigger date in `YYYY-MM-DD` form.
///
/// Callers must run this before invoking the engine; the engine assumes a valid date.
pub fn parse_date_filter(value: &str) -> ReconResult<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReconError::Validation(
            "Date filter cannot be empty".to_string(),
        ));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        ReconError::Validation(format!(
            "Invalid date filter '{}': expected YYYY-MM-DD",
            value
        ))
    })
}

/// Parse a raw transaction timestamp.
///
/// Accepts RFC 3339 (offsets are normalised to UTC), ISO-like naive timestamps with a
/// `T` or space separator, and bare dates (taken as midnight). Returns `None` for
/// anything else.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(aware) = DateTime::parse_from_rfc3339(value) {
        return Some(aware.naive_utc());
    }

    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Whether a raw timestamp carries an explicit UTC offset
pub fn has_utc_offset(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value.trim()).is_ok()
}

/// Calendar day a raw timestamp falls on, if it parses
pub fn timestamp_date(value: &str) -> Option<NaiveDate> {
    parse_timestamp(value).map(|ts| ts.date())
}

/// Whole days between two instants, rounding the signed difference down before
/// taking the magnitude. A difference of minus one hour is therefore one day.
pub fn day_distance(a: NaiveDateTime, b: NaiveDateTime) -> i64 {
    let delta = a - b;
    let mut days = delta.num_days();
    if delta < Duration::days(days) {
        days -= 1;
    }
    days.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn test_parse_date_filter() {
        assert_eq!(
            parse_date_filter("2024-03-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert!(parse_date_filter("").is_err());
        assert!(parse_date_filter("15/03/2024").is_err());
        assert!(parse_date_filter("2024-02-30").is_err());
    }

    #[test]
    fn test_has_utc_offset() {
        assert!(has_utc_offset("2024-03-15T10:30:00Z"));
        assert!(has_utc_offset(" 2024-03-15T16:00:00+05:30 "));
        assert!(!has_utc_offset("2024-03-15T10:30:00"));
        assert!(!has_utc_offset("2024-03-15"));
        assert!(!has_utc_offset("garbage"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();

        assert_eq!(ts("2024-03-15T10:30:00Z"), expected);
        assert_eq!(ts("2024-03-15T16:00:00+05:30"), expected);
        assert_eq!(ts("2024-03-15T10:30:00"), expected);
        assert_eq!(ts("2024-03-15 10:30:00"), expected);
        assert_eq!(
            ts("2024-03-15"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_day_distance_rounds_down() {
        let noon = ts("2024-03-15 12:00:00");
        assert_eq!(day_distance(noon, ts("2024-03-15 11:00:00")), 0);
        assert_eq!(day_distance(noon, ts("2024-03-15 13:00:00")), 1);
        assert_eq!(day_distance(noon, ts("2024-03-13 12:00:00")), 2);
        assert_eq!(day_distance(noon, ts("2024-03-17 12:00:00")), 2);
        assert_eq!(day_distance(noon, ts("2024-03-17 11:00:00")), 2);
    }
}
