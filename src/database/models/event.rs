use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::fields;
use super::Model;

pub const DEFAULT_REMINDER_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Biweekly => "biweekly",
            RecurrencePattern::Monthly => "monthly",
            RecurrencePattern::Yearly => "yearly",
        }
    }

    /// `none` and the empty string mean "not recurring"
    pub fn parse(s: &str) -> Result<Option<Self>, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(None),
            "daily" => Ok(Some(RecurrencePattern::Daily)),
            "weekly" => Ok(Some(RecurrencePattern::Weekly)),
            "biweekly" => Ok(Some(RecurrencePattern::Biweekly)),
            "monthly" => Ok(Some(RecurrencePattern::Monthly)),
            "yearly" => Ok(Some(RecurrencePattern::Yearly)),
            other => Err(format!("unknown recurrence pattern '{}'", other)),
        }
    }

    /// Deserializer for optional pattern columns
    pub fn deserialize_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Self>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) => Self::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    #[default]
    App,
    Email,
    Sms,
    Push,
}

impl NotificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationMethod::App => "app",
            NotificationMethod::Email => "email",
            NotificationMethod::Sms => "sms",
            NotificationMethod::Push => "push",
        }
    }
}

/// A stored calendar event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default, with = "fields::clock")]
    pub time: Option<NaiveTime>,
    #[serde(default, with = "fields::clock")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, with = "fields::day")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub family_id: Uuid,
    pub created_by: Uuid,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, deserialize_with = "RecurrencePattern::deserialize_opt")]
    pub recurrence_pattern: Option<RecurrencePattern>,
    #[serde(default, with = "fields::day")]
    pub recurrence_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub rsvp_enabled: bool,
    #[serde(default, with = "fields::day")]
    pub rsvp_deadline: Option<NaiveDate>,
    #[serde(default)]
    pub rsvp_notify: bool,
    #[serde(default)]
    pub reminder_enabled: bool,
    #[serde(default, deserialize_with = "fields::minutes")]
    pub reminder_time: Option<i64>,
    #[serde(default)]
    pub notification_method: Option<NotificationMethod>,
    #[serde(default, deserialize_with = "fields::family_list")]
    pub shared_with: Vec<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Model for Event {
    const TABLE: &'static str = "events";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    pub until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsvpSettings {
    pub deadline: Option<NaiveDate>,
    pub notify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSettings {
    pub minutes_before: i64,
    pub method: NotificationMethod,
}

impl Event {
    /// Present only when the event recurs with a real pattern
    pub fn recurrence(&self) -> Option<Recurrence> {
        if !self.is_recurring {
            return None;
        }
        self.recurrence_pattern.map(|pattern| Recurrence {
            pattern,
            until: self.recurrence_end_date,
        })
    }

    pub fn rsvp(&self) -> Option<RsvpSettings> {
        self.rsvp_enabled.then(|| RsvpSettings {
            deadline: self.rsvp_deadline,
            notify: self.rsvp_notify,
        })
    }

    pub fn reminder(&self) -> Option<ReminderSettings> {
        self.reminder_enabled.then(|| ReminderSettings {
            minutes_before: self.reminder_time.unwrap_or(DEFAULT_REMINDER_MINUTES),
            method: self.notification_method.unwrap_or_default(),
        })
    }

    pub fn is_owned_by(&self, family_id: Uuid) -> bool {
        self.family_id == family_id
    }

    /// Wall-clock start; untimed events start at midnight
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }
}

/// External address of an event: a stored row, or one generated instance of
/// a recurring row written as `{base_id}_{YYYY-MM-DD}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRef {
    Plain(Uuid),
    Instance { base: Uuid, date: NaiveDate },
}

impl EventRef {
    pub fn base_id(&self) -> Uuid {
        match self {
            EventRef::Plain(id) => *id,
            EventRef::Instance { base, .. } => *base,
        }
    }

    pub fn instance(base: Uuid, date: NaiveDate) -> Self {
        EventRef::Instance { base, date }
    }
}

impl FromStr for EventRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('_') {
            None => Uuid::parse_str(s.trim())
                .map(EventRef::Plain)
                .map_err(|_| format!("invalid event id '{}'", s)),
            Some((base, date)) => {
                let base = Uuid::parse_str(base).map_err(|_| format!("invalid event id '{}'", s))?;
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|_| format!("invalid instance date in '{}'", s))?;
                Ok(EventRef::Instance { base, date })
            }
        }
    }
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRef::Plain(id) => write!(f, "{}", id),
            EventRef::Instance { base, date } => write!(f, "{}_{}", base, date.format("%Y-%m-%d")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> serde_json::Value {
        json!({
            "id": "6f1c1b9e-5a43-4b8e-9d4e-0b6d0b1f2a11",
            "title": "Soccer practice",
            "date": "2025-03-04",
            "time": "17:30",
            "end_time": null,
            "family_id": "0c0aca45-8a48-4d97-955c-e655b1f904bd",
            "created_by": "2099db7d-9ec2-4dd5-bcdb-c044868b9e0d",
            "is_recurring": true,
            "recurrence_pattern": "biweekly",
            "recurrence_end_date": "2025-06-30",
            "reminder_enabled": true,
            "reminder_time": "15",
            "shared_with": ""
        })
    }

    #[test]
    fn test_row_decodes_with_permissive_fields() {
        let event: Event = serde_json::from_value(row()).unwrap();
        assert_eq!(event.time, NaiveTime::from_hms_opt(17, 30, 0));
        assert!(event.shared_with.is_empty());
        assert_eq!(
            event.recurrence(),
            Some(Recurrence { pattern: RecurrencePattern::Biweekly, until: NaiveDate::from_ymd_opt(2025, 6, 30) })
        );
        let reminder = event.reminder().unwrap();
        assert_eq!(reminder.minutes_before, 15);
        assert_eq!(reminder.method, NotificationMethod::App);
        assert!(event.rsvp().is_none());
    }

    #[test]
    fn test_pattern_none_is_not_recurring() {
        let mut value = row();
        value["recurrence_pattern"] = json!("none");
        let event: Event = serde_json::from_value(value).unwrap();
        assert!(event.recurrence().is_none());
    }

    #[test]
    fn test_missing_date_is_rejected() {
        let mut value = row();
        value.as_object_mut().unwrap().remove("date");
        assert!(serde_json::from_value::<Event>(value).is_err());
    }

    #[test]
    fn test_time_serializes_with_seconds() {
        let event: Event = serde_json::from_value(row()).unwrap();
        let out = serde_json::to_value(&event).unwrap();
        assert_eq!(out["time"], "17:30:00");
        assert_eq!(out["recurrence_pattern"], "biweekly");
    }

    #[test]
    fn test_event_ref_parsing() {
        let base = Uuid::new_v4();
        let plain: EventRef = base.to_string().parse().unwrap();
        assert_eq!(plain, EventRef::Plain(base));

        let composite = format!("{}_2025-03-18", base);
        let instance: EventRef = composite.parse().unwrap();
        assert_eq!(instance, EventRef::instance(base, NaiveDate::from_ymd_opt(2025, 3, 18).unwrap()));
        assert_eq!(instance.to_string(), composite);
        assert_eq!(instance.base_id(), base);

        assert!("nope".parse::<EventRef>().is_err());
        assert!(format!("{}_March", base).parse::<EventRef>().is_err());
    }
}
