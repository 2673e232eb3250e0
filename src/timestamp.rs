//! Lenient timestamp handling shared by the task model, the interchange
//! format and the command line.
//!
//! Stored documents carry ISO-8601 strings with millisecond precision
//! (`2024-01-10T09:30:00.000Z`). Input is accepted in a few more shapes:
//!
//! * full RFC 3339 (`2024-01-10T09:30:00+07:00`)
//! * a local date and time without offset (`2024-01-10T09:30`, `2024-01-10 09:30`)
//! * a bare date (`2024-01-10`), read as midnight UTC
//!
//! Empty strings mean "no timestamp".

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// The current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Parses a timestamp in any of the accepted shapes.
pub fn parse(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Formats a timestamp the way stored documents carry it.
pub fn format(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter for required timestamps.
pub mod required {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// Serde adapter for optional timestamps.
///
/// `null`, `""` and unparseable strings all decode to `None`, so a
/// malformed date never rejects the surrounding record.
pub mod optional {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(dt) => serializer.serialize_some(&super::format(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(|s| {
            let parsed = super::parse(s);
            if parsed.is_none() && !s.trim().is_empty() {
                log::debug!("Ignoring unparseable timestamp {s:?}");
            }
            parsed
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse("2024-01-10T09:30:00.000Z").unwrap();
        assert_eq!(dt.hour(), 9);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_offset_is_normalised() {
        let dt = parse("2024-01-10T09:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 7);
    }

    #[test]
    fn test_parse_bare_date_is_midnight_utc() {
        let dt = parse("2024-01-10").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 10));
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_local_datetime() {
        let dt = parse("2024-01-10T09:30").unwrap();
        let local = dt.with_timezone(&Local);
        assert_eq!(local.hour(), 9);
        assert_eq!(local.minute(), 30);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("").is_none());
        assert!(parse("   ").is_none());
        assert!(parse("next tuesday").is_none());
    }

    #[test]
    fn test_format_uses_millis_and_z() {
        let dt = parse("2024-01-10T09:30:00Z").unwrap();
        assert_eq!(format(&dt), "2024-01-10T09:30:00.000Z");
    }
}
