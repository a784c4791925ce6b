//! Permissive field codecs for values that arrive from forms, legacy rows
//! and `row_to_json` alike.

use chrono::{NaiveDate, NaiveTime};
use serde::{de, Deserialize, Deserializer, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Parse a clock time as `HH:MM:SS`, falling back to `HH:MM`
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S%.f"))
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Parse a calendar day; a trailing time part (`2025-03-10T09:00:00`) is ignored
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// `Option<NaiveTime>` written as `HH:MM:SS`; empty strings read as absent
pub mod clock {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&t.format("%H:%M:%S").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse_clock(&s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid time '{}'", s))),
        }
    }
}

/// `Option<NaiveDate>` that reads empty strings as absent
pub mod day {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse_day(&s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid date '{}'", s))),
        }
    }
}

/// Update-form time: an absent field stays `None`, while a submitted null or
/// empty string becomes `Some(None)` and clears the column
pub fn clearable_clock<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<NaiveTime>>, D::Error> {
    clock::deserialize(deserializer).map(Some)
}

/// Update-form date with the same absent/cleared split as `clearable_clock`
pub fn clearable_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error> {
    day::deserialize(deserializer).map(Some)
}

/// Family id list stored as an array, also accepted as a comma-separated string
pub fn family_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Uuid>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    let parts: Vec<String> = match raw {
        Value::Null => vec![],
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(de::Error::custom(format!("invalid family id {}", other))),
            })
            .collect::<Result<_, D::Error>>()?,
        other => return Err(de::Error::custom(format!("invalid family id list {}", other))),
    };

    let mut out = Vec::new();
    for part in parts.into_iter().filter(|p| !p.is_empty()) {
        let id = Uuid::parse_str(&part).map_err(|_| de::Error::custom(format!("invalid family id '{}'", part)))?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}

/// `family_list` for optional input fields
pub fn opt_family_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<Uuid>>, D::Error> {
    family_list(deserializer).map(Some)
}

/// Minute counts arrive as numbers or numeric strings
pub fn minutes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid minutes {}", n))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid minutes '{}'", s))),
        other => Err(de::Error::custom(format!("invalid minutes {}", other))),
    }
}

/// Feature and label lists: JSON array, JSON text of an array, or null
pub fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(vec![]),
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(de::Error::custom(format!("expected string, got {}", other))),
            })
            .collect(),
        Value::String(s) if s.trim().is_empty() => Ok(vec![]),
        Value::String(s) => serde_json::from_str::<Vec<String>>(&s).map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected list, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, with = "clock")]
        time: Option<NaiveTime>,
        #[serde(default, deserialize_with = "family_list")]
        shared_with: Vec<Uuid>,
        #[serde(default, deserialize_with = "minutes")]
        reminder_time: Option<i64>,
    }

    #[derive(Deserialize)]
    struct UpdateForm {
        #[serde(default, deserialize_with = "clearable_clock")]
        time: Option<Option<NaiveTime>>,
        #[serde(default, deserialize_with = "clearable_day")]
        end_date: Option<Option<NaiveDate>>,
    }

    #[test]
    fn test_clearable_fields_tell_absent_from_empty() {
        let p: UpdateForm = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.time, None);
        assert_eq!(p.end_date, None);

        let p: UpdateForm = serde_json::from_value(json!({ "time": "", "end_date": null })).unwrap();
        assert_eq!(p.time, Some(None));
        assert_eq!(p.end_date, Some(None));

        let p: UpdateForm = serde_json::from_value(json!({ "time": "08:15" })).unwrap();
        assert_eq!(p.time, Some(NaiveTime::from_hms_opt(8, 15, 0)));
    }

    #[test]
    fn test_clock_accepts_both_formats() {
        assert_eq!(parse_clock("14:30:15"), NaiveTime::from_hms_opt(14, 30, 15));
        assert_eq!(parse_clock("09:05"), NaiveTime::from_hms_opt(9, 5, 0));
        assert_eq!(parse_clock("9am"), None);
    }

    #[test]
    fn test_shared_with_from_string_or_array() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let from_text: Sample = serde_json::from_value(json!({ "shared_with": format!("{}, {},", a, b) })).unwrap();
        assert_eq!(from_text.shared_with, vec![a, b]);

        let from_array: Sample = serde_json::from_value(json!({ "shared_with": [a.to_string(), a.to_string()] })).unwrap();
        assert_eq!(from_array.shared_with, vec![a]);

        assert!(serde_json::from_value::<Sample>(json!({ "shared_with": "not-a-uuid" })).is_err());
    }

    #[test]
    fn test_minutes_from_number_or_string() {
        let p: Sample = serde_json::from_value(json!({ "reminder_time": "30", "time": "" })).unwrap();
        assert_eq!(p.reminder_time, Some(30));
        assert_eq!(p.time, None);
        let p: Sample = serde_json::from_value(json!({ "reminder_time": 15 })).unwrap();
        assert_eq!(p.reminder_time, Some(15));
    }

    #[test]
    fn test_day_ignores_time_suffix() {
        assert_eq!(parse_day("2025-03-10T09:00:00"), NaiveDate::from_ymd_opt(2025, 3, 10));
        assert_eq!(parse_day("03/10/2025"), None);
    }
}
