//! Locale timestamps as written by the citizen app: `DD/MM/YYYY, HH:MM:SS`

use chrono::{Local, NaiveDate, NaiveDateTime};

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Accepted layouts, most common first. Some devices emit a 12-hour clock.
const ACCEPTED_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%d/%m/%Y, %I:%M:%S %p",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse a complaint timestamp. `None` is the invalid-date sentinel: an
/// out-of-range field ("25/13/2024") is as invalid as garbage text.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%d/%m/%Y")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time in the store's timestamp layout.
pub fn now_timestamp() -> String {
    format_timestamp(Local::now().naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_valid_timestamp() {
        let parsed = parse_timestamp("05/03/2024, 14:30:15").unwrap();
        assert_eq!(parsed.day(), 5);
        assert_eq!(parsed.month(), 3);
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.hour(), 14);
        assert_eq!(parsed.second(), 15);
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        assert!(parse_timestamp("25/13/2024, 10:00:00").is_none());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("31/02/2024, 10:00:00").is_none());
    }

    #[test]
    fn test_twelve_hour_clock_and_date_only() {
        let parsed = parse_timestamp("01/12/2023, 02:15:00 PM").unwrap();
        assert_eq!(parsed.hour(), 14);

        let parsed = parse_timestamp("01/12/2023").unwrap();
        assert_eq!(parsed.hour(), 0);
    }

    #[test]
    fn test_format_round_trips_through_parse() {
        let at = NaiveDate::from_ymd_opt(2024, 7, 9)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        let text = format_timestamp(at);
        assert_eq!(text, "09/07/2024, 08:05:00");
        assert_eq!(parse_timestamp(&text), Some(at));
    }
}
