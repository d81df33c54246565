//! Lenient deserializers for backend payloads.
//!
//! The backend emits timestamps both with and without an offset (naive
//! values are server-local and treated as UTC here), and sends `null` for
//! several fields that are plain values on the client side.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {value}"))),
    }
}

pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse_timestamp("2026-01-03T12:30:00+08:00").unwrap();
        assert_eq!(dt.hour(), 4);
    }

    #[test]
    fn parses_naive_with_fraction() {
        let dt = parse_timestamp("2026-01-05T09:15:42.123456").unwrap();
        assert_eq!(dt.day(), 5);
        assert_eq!(dt.minute(), 15);
    }

    #[test]
    fn parses_space_separated() {
        assert!(parse_timestamp("2026-01-05 09:15:42").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
    }
}
