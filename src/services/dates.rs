use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Parses the ISO 8601 shapes clients send: RFC 3339, a naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC) or a bare `YYYY-MM-DD`.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn value_datetime(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value.and_then(Value::as_str).and_then(parse_datetime)
}

/// First instant of the month `months_back` months before `now`'s month.
pub fn month_start(now: DateTime<Utc>, months_back: u32) -> DateTime<Utc> {
    let total = now.year() * 12 + now.month0() as i32 - months_back as i32;
    let (year, month0) = (total.div_euclid(12), total.rem_euclid(12) as u32);
    Utc.with_ymd_and_hms(year, month0 + 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Whole days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days()
}

/// `YYYY-MM` label for a date.
pub fn month_key(dt: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", dt.year(), dt.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_iso_shapes() {
        assert!(parse_datetime("2024-03-01T10:00:00Z").is_some());
        assert!(parse_datetime("2024-03-01T10:00:00.123+02:00").is_some());
        assert!(parse_datetime("2024-03-01T10:00:00").is_some());
        assert_eq!(parse_datetime("2024-03-01").map(month_key), Some("2024-03".to_string()));
        assert!(parse_datetime("03/01/2024").is_none());
        assert!(parse_datetime("2024-13-01").is_none());
    }

    #[test]
    fn month_start_wraps_years() {
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap();
        assert_eq!(month_start(now, 0), Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(month_start(now, 3), Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap());
        assert_eq!(month_start(now, 14), Utc.with_ymd_and_hms(2022, 12, 1, 0, 0, 0).unwrap());
    }
}
