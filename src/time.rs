//! UTC time intervals used by queries, descriptors and result records.

use std::fmt;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Formats accepted by [`parse_time`], tried in order.
const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y%m%dT%H%M%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Error returned when a time string cannot be interpreted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized time '{input}'\n  Suggestion: use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")]
pub struct TimeParseError {
    /// The rejected input.
    pub input: String,
}

/// Parses a time string as UTC.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD[ HH:MM[:SS[.fff]]]` with either
/// `-` or `/` separators, and compact `YYYYMMDD[THHMMSS]`.
///
/// # Errors
///
/// Returns [`TimeParseError`] when no supported format matches.
pub fn parse_time(input: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
    }

    Err(TimeParseError {
        input: input.to_string(),
    })
}

/// A closed UTC time interval.
///
/// Construction orders the endpoints, so `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates an interval from two instants in either order.
    #[must_use]
    pub fn new(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    /// Parses both endpoints with [`parse_time`].
    ///
    /// # Errors
    ///
    /// Returns [`TimeParseError`] for the first endpoint that fails to parse.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Ok(Self::new(parse_time(start)?, parse_time(end)?))
    }

    /// Start of the interval.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the interval.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Length of the interval.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// Smallest interval covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Renders both endpoints with a strftime format.
    ///
    /// Returns `None` if `format` contains an invalid specifier.
    #[must_use]
    pub fn format_with(&self, format: &str) -> Option<(String, String)> {
        if !is_valid_format(format) {
            return None;
        }
        Some((
            self.start.format(format).to_string(),
            self.end.format(format).to_string(),
        ))
    }
}

/// Returns true if `format` is a usable strftime pattern.
#[must_use]
pub fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_parse_time_date_only_is_midnight_utc() {
        let t = parse_time("2020-01-01").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_time_accepts_common_layouts() {
        let expected = Utc.with_ymd_and_hms(2014, 3, 5, 12, 30, 0).unwrap();
        for input in [
            "2014-03-05 12:30:00",
            "2014-03-05T12:30:00",
            "2014/03/05 12:30",
            "20140305T123000",
            "2014-03-05T12:30:00Z",
        ] {
            assert_eq!(parse_time(input).unwrap(), expected, "input: {input}");
        }
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        let err = parse_time("yesterday").unwrap_err();
        assert_eq!(err.input, "yesterday");
        assert!(err.to_string().contains("Suggestion"));
    }

    #[test]
    fn test_time_range_orders_endpoints() {
        let range = TimeRange::parse("2020-01-02", "2020-01-01").unwrap();
        assert!(range.start() < range.end());
        assert_eq!(range.duration(), chrono::Duration::days(1));
    }

    #[test]
    fn test_time_range_union_covers_both() {
        let a = TimeRange::parse("2020-01-01", "2020-01-02").unwrap();
        let b = TimeRange::parse("2020-01-05", "2020-01-06").unwrap();
        let u = a.union(&b);
        assert_eq!(u.start(), a.start());
        assert_eq!(u.end(), b.end());
    }

    #[test]
    fn test_time_range_display() {
        let range = TimeRange::parse("2020-01-01", "2020-01-01 06:00").unwrap();
        assert_eq!(range.to_string(), "2020-01-01 00:00:00 - 2020-01-01 06:00:00");
    }

    #[test]
    fn test_format_with_custom_and_invalid_format() {
        let range = TimeRange::parse("2020-01-01", "2020-01-01 06:00").unwrap();
        assert_eq!(
            range.format_with("%Y/%m/%d %H:%M"),
            Some(("2020/01/01 00:00".to_string(), "2020/01/01 06:00".to_string()))
        );
        assert!(range.format_with("%Q").is_none());
        assert!(!is_valid_format("%Q"));
    }
}
