//! Lenient conversions for values arriving from forms, URLs and storage rows.

use chrono::{DateTime, Local, NaiveDateTime};
use serde_json::Value;

/// Format used for every timestamp exposed by the module.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Integer coercion for ids received as text.
///
/// Follows leading-integer parsing: surrounding whitespace is skipped, an
/// optional sign and the leading run of digits are taken, anything after is
/// ignored. Input without leading digits coerces to `0`.
pub fn coerce_id(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for ch in digits.chars() {
        let Some(digit) = ch.to_digit(10) else { break };
        value = value.saturating_mul(10).saturating_add(i64::from(digit));
    }

    if negative {
        -value
    } else {
        value
    }
}

pub fn coerce_i64(value: &Value) -> Result<Option<i64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| format!("{} is not an integer", n)),
        Value::Bool(b) => Ok(Some(i64::from(*b))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("\"{}\" is not an integer", s)),
        other => Err(format!("{} is not an integer", other)),
    }
}

/// Boolean coercion. `null` stays unset; an empty string is `false`.
pub fn coerce_bool(value: &Value) -> Result<Option<bool>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => Ok(Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false))),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Some(false)),
            _ => Err(format!("\"{}\" is not a boolean", s)),
        },
        other => Err(format!("{} is not a boolean", other)),
    }
}

pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    for format in [
        TIMESTAMP_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local).naive_local())
        .map_err(|_| format!("\"{}\" is not a timestamp", raw))
}

pub fn coerce_timestamp(value: &Value) -> Result<Option<NaiveDateTime>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_timestamp(s).map(Some),
        other => Err(format!("{} is not a timestamp", other)),
    }
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Serde adapters used by the entity records.
pub mod serde_fields {
    use super::*;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Surrogate ids: empty strings and `0` read as "unsaved".
    pub fn id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let id = coerce_i64(&value).map_err(D::Error::custom)?;
        Ok(id.filter(|id| *id != 0))
    }

    pub fn reference<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        coerce_i64(&value).map_err(D::Error::custom)
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        coerce_bool(&value).map_err(D::Error::custom)
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_text(&value))
    }

    pub mod timestamp {
        use super::*;

        pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Value::deserialize(deserializer)?;
            coerce_timestamp(&value).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_id_takes_leading_integer() {
        assert_eq!(coerce_id("7"), 7);
        assert_eq!(coerce_id("7abc"), 7);
        assert_eq!(coerce_id("  12"), 12);
        assert_eq!(coerce_id("3.9"), 3);
        assert_eq!(coerce_id("-5"), -5);
        assert_eq!(coerce_id("abc"), 0);
        assert_eq!(coerce_id(""), 0);
    }

    #[test]
    fn booleans_accept_form_and_storage_shapes() {
        assert_eq!(coerce_bool(&json!("true")), Ok(Some(true)));
        assert_eq!(coerce_bool(&json!("false")), Ok(Some(false)));
        assert_eq!(coerce_bool(&json!(1)), Ok(Some(true)));
        assert_eq!(coerce_bool(&json!(0)), Ok(Some(false)));
        assert_eq!(coerce_bool(&json!("")), Ok(Some(false)));
        assert_eq!(coerce_bool(&Value::Null), Ok(None));
        assert!(coerce_bool(&json!("maybe")).is_err());
    }

    #[test]
    fn timestamps_parse_both_separators() {
        let a = parse_timestamp("2025-09-26 10:15:00").unwrap();
        let b = parse_timestamp("2025-09-26T10:15:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(format_timestamp(&a), "2025-09-26 10:15:00");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn integers_from_strings() {
        assert_eq!(coerce_i64(&json!("42")), Ok(Some(42)));
        assert_eq!(coerce_i64(&json!("")), Ok(None));
        assert!(coerce_i64(&json!("4x")).is_err());
    }
}
