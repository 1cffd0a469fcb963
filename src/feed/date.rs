//! Normalization of source dates into canonical [`Timestamp`]s.
//!
//! Feeds in the wild disagree about date syntax. RSS asks for RFC 822 and
//! usually gets some RFC 1123 variant; Atom asks for RFC 3339. Each accepted
//! layout is tried in a fixed order and the first success wins.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::error::FeedError;
use super::model::Timestamp;

/// Source date layouts understood by [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`, plus the RFC 2822 named zones
    /// (`GMT`, `UT`, `EST`, ...)
    Rfc1123Numeric,
    /// `Mon, 02 Jan 2006 15:04:05 MST` with any alphabetic zone; zones that
    /// carry no known offset are read as UTC
    Rfc1123Named,
    /// `2006-01-02T15:04:05Z07:00`, the canonical form included
    Rfc3339,
}

/// The accepted formats, in the order they are tried.
pub const ACCEPTED_FORMATS: &[DateFormat] = &[
    DateFormat::Rfc1123Numeric,
    DateFormat::Rfc1123Named,
    DateFormat::Rfc3339,
];

const NAMED_ZONE_LAYOUT: &str = "%d %b %Y %H:%M:%S";

const WEEKDAYS: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Drops a leading `Ddd, ` weekday.
///
/// The name must be a real weekday, but it is not checked against the date:
/// feeds get it wrong often enough that rejecting the entry loses real posts.
fn strip_weekday(raw: &str) -> &str {
    match raw.split_once(',') {
        Some((day, rest)) if WEEKDAYS.contains(&day) => rest.trim_start(),
        _ => raw,
    }
}

impl DateFormat {
    fn parse(self, raw: &str) -> Option<Timestamp> {
        match self {
            DateFormat::Rfc1123Numeric => DateTime::parse_from_rfc2822(strip_weekday(raw))
                .ok()
                .map(|dt| Timestamp::from_datetime(dt.with_timezone(&Utc))),
            DateFormat::Rfc1123Named => {
                let (rest, zone) = strip_weekday(raw).rsplit_once(' ')?;
                if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
                    return None;
                }
                NaiveDateTime::parse_from_str(rest.trim(), NAMED_ZONE_LAYOUT)
                    .ok()
                    .map(|naive| Timestamp::from_datetime(naive.and_utc()))
            }
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| Timestamp::from_datetime(dt.with_timezone(&Utc))),
        }
    }
}

/// Normalizes `raw` using [`ACCEPTED_FORMATS`].
///
/// # Errors
///
/// Returns [`FeedError::UnrecognizedDateFormat`] when no format matches.
/// Callers drop the offending entry; this is never fatal for a feed.
pub fn normalize(raw: &str) -> Result<Timestamp, FeedError> {
    normalize_with(raw, ACCEPTED_FORMATS)
}

/// Normalizes `raw` against an explicit ordered list of formats.
pub fn normalize_with(raw: &str, formats: &[DateFormat]) -> Result<Timestamp, FeedError> {
    let trimmed = raw.trim();
    formats
        .iter()
        .find_map(|format| format.parse(trimmed))
        .ok_or_else(|| FeedError::UnrecognizedDateFormat(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn canonical(raw: &str) -> String {
        normalize(raw).unwrap().to_string()
    }

    #[test]
    fn test_rfc1123_numeric_zone() {
        assert_eq!(
            canonical("Mon, 02 Jan 2006 15:04:05 -0700"),
            "2006-01-02T22:04:05Z"
        );
    }

    #[test]
    fn test_rfc1123_gmt() {
        assert_eq!(
            canonical("Mon, 01 Jan 2024 08:30:00 GMT"),
            "2024-01-01T08:30:00Z"
        );
    }

    #[test]
    fn test_rfc1123_us_zone_has_offset() {
        assert_eq!(
            canonical("Mon, 01 Jan 2024 08:30:00 EST"),
            "2024-01-01T13:30:00Z"
        );
    }

    #[test]
    fn test_rfc1123_unknown_zone_read_as_utc() {
        assert_eq!(
            canonical("Mon, 01 Jan 2024 08:30:00 XYZ"),
            "2024-01-01T08:30:00Z"
        );
    }

    #[test]
    fn test_weekday_not_checked_against_date() {
        // 3 Jan 2024 is a Wednesday
        for raw in [
            "Mon, 03 Jan 2024 10:00:00 +0000",
            "Mon, 03 Jan 2024 10:00:00 GMT",
            "Mon, 03 Jan 2024 10:00:00 CEST",
        ] {
            assert_eq!(canonical(raw), "2024-01-03T10:00:00Z", "for {raw:?}");
        }
    }

    #[test]
    fn test_weekday_may_be_omitted() {
        assert_eq!(canonical("03 Jan 2024 10:00:00 +0100"), "2024-01-03T09:00:00Z");
        assert_eq!(canonical("03 Jan 2024 10:00:00 GMT"), "2024-01-03T10:00:00Z");
    }

    #[test]
    fn test_unknown_weekday_name_rejected() {
        assert!(normalize("Xyz, 03 Jan 2024 10:00:00 +0000").is_err());
    }

    #[test]
    fn test_rfc3339_with_offset() {
        assert_eq!(canonical("2024-01-01T10:00:00+02:00"), "2024-01-01T08:00:00Z");
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(
            canonical("\n   Mon, 01 Jan 2024 08:30:00 +0000  \n"),
            "2024-01-01T08:30:00Z"
        );
    }

    #[test]
    fn test_unrecognized_format() {
        for raw in ["", "yesterday", "2024/01/01", "Mon, 01 Jan 2024"] {
            assert!(
                matches!(normalize(raw), Err(FeedError::UnrecognizedDateFormat(_))),
                "expected failure for {raw:?}"
            );
        }
    }

    #[test]
    fn test_restricted_format_list() {
        let raw = "Mon, 01 Jan 2024 08:30:00 GMT";
        assert!(normalize_with(raw, &[DateFormat::Rfc3339]).is_err());
        assert!(normalize_with(raw, &[DateFormat::Rfc1123Numeric]).is_ok());
    }

    #[test]
    fn test_canonical_is_fixed_point() {
        let ts = Timestamp::from_datetime(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap());
        assert_eq!(normalize(&ts.to_string()).unwrap(), ts);
    }

    proptest! {
        #[test]
        fn normalizing_canonical_output_is_idempotent(secs in 0i64..253_402_300_799) {
            let dt = DateTime::from_timestamp(secs, 0).unwrap();
            let once = Timestamp::from_datetime(dt);
            let twice = normalize(&once.to_string()).unwrap();
            prop_assert_eq!(once, twice);
            prop_assert_eq!(once.to_string(), twice.to_string());
        }
    }
}
