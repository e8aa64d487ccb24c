use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de};

/// Parse a client-supplied timestamp. RFC 3339 is preferred; a naive
/// ISO-8601 datetime (no offset) is accepted and taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|n| n.and_utc()))
}

/// `deserialize_with` helper for optional timestamps; pair with `#[serde(default)]`.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| {
        parse_timestamp(&s).map_err(|e| de::Error::custom(format!("invalid datetime '{}': {}", s, e)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn accepts_offset_and_naive_forms() {
        let expected = Utc.with_ymd_and_hms(2030, 5, 1, 9, 30, 0).unwrap();

        assert_eq!(parse_timestamp("2030-05-01T09:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2030-05-01T11:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2030-05-01T09:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2030-05-01T09:30:00.000000").unwrap(), expected);
        assert_eq!(parse_timestamp("2030-05-01 09:30:00").unwrap(), expected);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("tomorrow").is_err());
        assert!(parse_timestamp("2030-13-01T00:00:00").is_err());
    }
}
