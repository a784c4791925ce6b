use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{Event, NotificationMethod};

/// Window after the reminder time during which it is reported as due
pub const DUE_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Reminder {
    pub event_id: Uuid,
    pub title: String,
    pub event_start: NaiveDateTime,
    pub remind_at: NaiveDateTime,
    pub minutes_before: i64,
    pub notification_method: NotificationMethod,
}

fn reminder_for(event: &Event) -> Option<Reminder> {
    let settings = event.reminder()?;
    let event_start = event.starts_at();
    Some(Reminder {
        event_id: event.id,
        title: event.title.clone(),
        event_start,
        remind_at: event_start - Duration::minutes(settings.minutes_before),
        minutes_before: settings.minutes_before,
        notification_method: settings.method,
    })
}

/// Reminders that fire after `now`, soonest first
pub fn upcoming(events: &[Event], now: NaiveDateTime) -> Vec<Reminder> {
    let mut out: Vec<Reminder> = events
        .iter()
        .filter_map(reminder_for)
        .filter(|r| r.remind_at > now)
        .collect();
    out.sort_by_key(|r| r.remind_at);
    out
}

/// Reminders whose time passed within the last few minutes
pub fn due(events: &[Event], now: NaiveDateTime) -> Vec<Reminder> {
    let window = Duration::minutes(DUE_WINDOW_MINUTES);
    events
        .iter()
        .filter_map(reminder_for)
        .filter(|r| r.remind_at <= now && now - r.remind_at <= window)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn event(date: &str, time: Option<&str>, reminder: Option<i64>) -> Event {
        serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "title": "Vet appointment",
            "date": date,
            "time": time,
            "family_id": Uuid::new_v4(),
            "created_by": Uuid::new_v4(),
            "reminder_enabled": reminder.is_some(),
            "reminder_time": reminder
        }))
        .unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_upcoming_sorted_and_future_only() {
        let events = vec![
            event("2025-04-03", Some("09:00"), Some(30)),
            event("2025-04-02", None, None),
            event("2025-04-01", Some("12:30"), Some(15)),
            event("2025-03-30", Some("08:00"), Some(60)),
        ];
        let found = upcoming(&events, now());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].remind_at, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap().and_hms_opt(12, 15, 0).unwrap());
        assert_eq!(found[1].minutes_before, 30);
    }

    #[test]
    fn test_default_lead_time_and_due_window() {
        // 13:03 start with the default hour lead fires at 12:03
        let later = event("2025-04-01", Some("13:03"), None);
        let mut enabled = later.clone();
        enabled.reminder_enabled = true;
        assert!(due(&[enabled.clone()], now()).is_empty());

        let five_past = now() + Duration::minutes(8);
        assert_eq!(due(&[enabled.clone()], five_past).len(), 1);
        assert!(due(&[enabled], now() + Duration::minutes(9)).is_empty());
        assert!(due(&[later], five_past).is_empty());
    }
}
