use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::recurrence::{occurrences, Occurrence};
use super::{CalendarError, CalendarFilters};
use crate::database::models::{Event, EventException};

pub const DEFAULT_COLOR: &str = "#4285F4";
pub const SHARED_BORDER_COLOR: &str = "#FF5722";
pub const SHARED_TEXT_COLOR: &str = "#FFFFFF";

pub fn category_color(category: Option<&str>) -> &'static str {
    match category {
        Some("Family") => "#4285F4",
        Some("Work") => "#EA4335",
        Some("School") => "#FBBC05",
        Some("Sports") => "#34A853",
        Some("Health") => "#8E24AA",
        Some("Social") => "#FB8C00",
        Some("Other") => "#9E9E9E",
        _ => DEFAULT_COLOR,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtendedProps {
    pub description: String,
    pub location: String,
    pub category: String,
    pub created_by: Uuid,
    pub family_id: Uuid,
    pub shared_with: Vec<Uuid>,
    pub is_recurring: bool,
    pub recurrence_pattern: String,
}

/// Calendar widget entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEvent {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    pub background_color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<&'static str>,
    pub extended_props: ExtendedProps,
}

/// Render one occurrence of `event` as seen by `viewer_family`
pub fn render(event: &Event, occurrence: &Occurrence, viewer_family: Uuid) -> DisplayEvent {
    let start = match event.time {
        Some(time) => format!("{}T{}", occurrence.date.format("%Y-%m-%d"), time.format("%H:%M:%S")),
        None => occurrence.date.format("%Y-%m-%d").to_string(),
    };

    // The end never precedes the start
    let end_day = occurrence.end_date.filter(|d| *d >= occurrence.date).unwrap_or(occurrence.date);
    let end = match event.end_time {
        Some(end_time) => {
            let starts_at = occurrence.date.and_time(event.time.unwrap_or_default());
            end_day.and_time(end_time).max(starts_at).format("%Y-%m-%dT%H:%M:%S").to_string()
        }
        None => format!("{}T23:59:59", end_day.format("%Y-%m-%d")),
    };

    let foreign = !event.is_owned_by(viewer_family);

    DisplayEvent {
        id: occurrence.id.to_string(),
        title: event.title.clone(),
        start,
        end,
        all_day: event.all_day,
        background_color: category_color(event.category.as_deref()),
        border_color: foreign.then_some(SHARED_BORDER_COLOR),
        text_color: foreign.then_some(SHARED_TEXT_COLOR),
        extended_props: ExtendedProps {
            description: event.description.clone().unwrap_or_default(),
            location: event.location.clone().unwrap_or_default(),
            category: event.category.clone().unwrap_or_default(),
            created_by: event.created_by,
            family_id: event.family_id,
            shared_with: event.shared_with.clone(),
            is_recurring: event.recurrence().is_some(),
            recurrence_pattern: event
                .recurrence_pattern
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
        },
    }
}

/// Build the widget feed for the visible events. Recurring events are
/// expanded over the window; plain events are kept when they fall inside any
/// explicitly requested range.
pub fn build(
    events: &[Event],
    exceptions: &[EventException],
    filters: &CalendarFilters,
    viewer_family: Uuid,
    window: (NaiveDate, NaiveDate),
) -> Result<Vec<DisplayEvent>, CalendarError> {
    let mut out = Vec::new();
    for event in events.iter().filter(|e| filters.admits(e, viewer_family)) {
        for occurrence in occurrences(event, exceptions, window.0, window.1)? {
            if event.recurrence().is_none() && !filters.in_range(occurrence.date) {
                continue;
            }
            out.push(render(event, &occurrence, viewer_family));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::EventRef;
    use serde_json::json;

    fn event(family: Uuid, extra: serde_json::Value) -> Event {
        let mut row = json!({
            "id": Uuid::new_v4(),
            "title": "Swim meet",
            "date": "2025-05-10",
            "family_id": family,
            "created_by": Uuid::new_v4()
        });
        for (k, v) in extra.as_object().unwrap() {
            row[k] = v.clone();
        }
        serde_json::from_value(row).unwrap()
    }

    fn plain(event: &Event) -> Occurrence {
        Occurrence { id: EventRef::Plain(event.id), original_date: event.date, date: event.date, end_date: event.end_date }
    }

    #[test]
    fn test_start_without_end_runs_to_end_of_day() {
        let family = Uuid::new_v4();
        let e = event(family, json!({ "time": "09:30", "category": "Sports" }));
        let shown = render(&e, &plain(&e), family);
        assert_eq!(shown.start, "2025-05-10T09:30:00");
        assert_eq!(shown.end, "2025-05-10T23:59:59");
        assert_eq!(shown.background_color, "#34A853");
        assert!(shown.border_color.is_none());
    }

    #[test]
    fn test_explicit_end_and_moved_end_date() {
        let family = Uuid::new_v4();
        let e = event(family, json!({ "time": "09:00:00", "end_time": "17:00", "end_date": "2025-05-12" }));
        let shown = render(&e, &plain(&e), family);
        assert_eq!(shown.end, "2025-05-12T17:00:00");
    }

    #[test]
    fn test_end_is_clamped_to_start() {
        let family = Uuid::new_v4();
        let stale = event(family, json!({ "end_date": "2025-05-08" }));
        let shown = render(&stale, &plain(&stale), family);
        assert_eq!(shown.end, "2025-05-10T23:59:59");

        let inverted = event(family, json!({ "time": "15:00", "end_time": "14:00" }));
        let shown = render(&inverted, &plain(&inverted), family);
        assert_eq!(shown.end, "2025-05-10T15:00:00");
    }

    #[test]
    fn test_foreign_event_gets_shared_colors() {
        let (owner, viewer) = (Uuid::new_v4(), Uuid::new_v4());
        let e = event(owner, json!({ "category": "Knitting", "shared_with": [viewer.to_string()] }));
        let shown = render(&e, &plain(&e), viewer);
        assert_eq!(shown.background_color, DEFAULT_COLOR);
        assert_eq!(shown.border_color, Some(SHARED_BORDER_COLOR));
        assert_eq!(shown.text_color, Some(SHARED_TEXT_COLOR));

        let value = serde_json::to_value(&shown).unwrap();
        assert_eq!(value["allDay"], false);
        assert_eq!(value["extendedProps"]["location"], "");
        assert_eq!(value["extendedProps"]["recurrence_pattern"], "");
    }

    #[test]
    fn test_build_expands_recurring_events() {
        let family = Uuid::new_v4();
        let weekly = event(family, json!({ "is_recurring": true, "recurrence_pattern": "weekly" }));
        let once = event(family, json!({ "date": "2025-08-01" }));
        let window = (NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(), NaiveDate::from_ymd_opt(2025, 5, 31).unwrap());
        let filters = CalendarFilters {
            start_date: Some(window.0),
            end_date: Some(window.1),
            ..Default::default()
        };

        let shown = build(&[weekly.clone(), once], &[], &filters, family, window).unwrap();
        assert_eq!(shown.len(), 4);
        assert!(shown.iter().all(|s| s.id.starts_with(&weekly.id.to_string())));
        assert!(shown.iter().all(|s| s.extended_props.is_recurring));
    }
}
