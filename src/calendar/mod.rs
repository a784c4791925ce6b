//! Calendar formatting: the interactive display model, recurrence expansion,
//! iCalendar export and import, reminders and the printable agenda.

pub mod agenda;
pub mod display;
pub mod ics;
pub mod recurrence;
pub mod reminders;
pub mod time;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::Event;

pub use display::DisplayEvent;
pub use recurrence::Occurrence;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Local time {when} does not exist in {zone} for event {event}")]
    NonexistentLocalTime { event: Uuid, when: String, zone: String },

    #[error("Invalid recurrence for event {event}: {reason}")]
    Recurrence { event: Uuid, reason: String },

    #[error("No events found in calendar file")]
    NoEvents,

    #[error("Invalid calendar file: {0}")]
    Parse(String),
}

/// Query filters shared by the calendar listing, agenda and export
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarFilters {
    #[serde(default, with = "crate::database::models::fields::day")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "crate::database::models::fields::day")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default = "default_include_shared")]
    pub include_shared: bool,
}

fn default_include_shared() -> bool {
    true
}

impl Default for CalendarFilters {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            category: None,
            member_id: None,
            include_shared: true,
        }
    }
}

fn unless_all(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl CalendarFilters {
    pub fn category(&self) -> Option<&str> {
        unless_all(&self.category)
    }

    /// Member filter; a value that is not a user id matches nobody
    pub fn member(&self) -> Option<Result<Uuid, String>> {
        unless_all(&self.member_id).map(|m| Uuid::parse_str(m).map_err(|_| m.to_string()))
    }

    pub fn in_range(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |s| date >= s) && self.end_date.map_or(true, |e| date <= e)
    }

    /// Category and member checks. The member filter only narrows the
    /// viewer's own events.
    pub fn admits(&self, event: &Event, viewer_family: Uuid) -> bool {
        if let Some(category) = self.category() {
            if event.category.as_deref() != Some(category) {
                return false;
            }
        }
        if event.family_id != viewer_family {
            return self.include_shared;
        }
        match self.member() {
            None => true,
            Some(Ok(member)) => event.created_by == member,
            Some(Err(_)) => false,
        }
    }

    /// Expansion window for recurring events. Defaults to the first day of
    /// the previous month through `days_ahead` days after today.
    pub fn window(&self, today: NaiveDate, days_ahead: i64) -> (NaiveDate, NaiveDate) {
        let start = self.start_date.unwrap_or_else(|| first_of_previous_month(today));
        let end = self.end_date.unwrap_or(today + Duration::days(days_ahead));
        (start, end)
    }
}

pub fn first_of_previous_month(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(family: Uuid, creator: Uuid, category: &str) -> Event {
        serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "title": "Dentist",
            "date": "2025-04-02",
            "category": category,
            "family_id": family,
            "created_by": creator
        }))
        .unwrap()
    }

    #[test]
    fn test_all_means_no_filter() {
        let filters: CalendarFilters =
            serde_json::from_value(json!({ "category": "all", "member_id": "all" })).unwrap();
        assert!(filters.include_shared);
        assert_eq!(filters.category(), None);
        assert!(filters.member().is_none());
    }

    #[test]
    fn test_member_filter_only_narrows_own_events() {
        let (mine, theirs) = (Uuid::new_v4(), Uuid::new_v4());
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let filters = CalendarFilters {
            member_id: Some(alice.to_string()),
            category: Some("Health".into()),
            ..Default::default()
        };
        assert!(filters.admits(&event(mine, alice, "Health"), mine));
        assert!(!filters.admits(&event(mine, bob, "Health"), mine));
        assert!(!filters.admits(&event(mine, alice, "Work"), mine));
        assert!(filters.admits(&event(theirs, bob, "Health"), mine));

        let own_only = CalendarFilters { include_shared: false, ..Default::default() };
        assert!(!own_only.admits(&event(theirs, bob, "Health"), mine));
    }

    #[test]
    fn test_default_window() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let (start, end) = CalendarFilters::default().window(today, 365);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }
}
