use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::display::DisplayEvent;
use super::CalendarFilters;

#[derive(Debug, Clone, Serialize)]
pub struct AgendaDay {
    pub date: String,
    pub events: Vec<DisplayEvent>,
}

/// Printable agenda: a title describing the filters plus the events grouped
/// by calendar day in start order
#[derive(Debug, Clone, Serialize)]
pub struct Agenda {
    pub title: String,
    pub days: Vec<AgendaDay>,
    pub members: HashMap<Uuid, String>,
}

pub fn title(filters: &CalendarFilters, members: &HashMap<Uuid, String>) -> String {
    let mut title = match (filters.start_date, filters.end_date) {
        (Some(start), Some(end)) => format!("Calendar: {} to {}", start, end),
        (Some(start), None) => format!("Calendar: From {}", start),
        (None, Some(end)) => format!("Calendar: Until {}", end),
        (None, None) => "Family Calendar".to_string(),
    };
    if let Some(category) = filters.category() {
        title.push_str(&format!(" - {} Events", category));
    }
    if let Some(Ok(member)) = filters.member() {
        if let Some(name) = members.get(&member) {
            title.push_str(&format!(" - {}'s Events", name));
        }
    }
    title
}

pub fn build(mut events: Vec<DisplayEvent>, filters: &CalendarFilters, members: HashMap<Uuid, String>) -> Agenda {
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));

    let mut grouped: BTreeMap<String, Vec<DisplayEvent>> = BTreeMap::new();
    for event in events {
        let day = event.start.split('T').next().unwrap_or(&event.start).to_string();
        grouped.entry(day).or_default().push(event);
    }

    Agenda {
        title: title(filters, &members),
        days: grouped
            .into_iter()
            .map(|(date, events)| AgendaDay { date, events })
            .collect(),
        members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::display::render;
    use crate::calendar::recurrence::occurrences;
    use crate::database::models::Event;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_title_composition() {
        let alice = Uuid::new_v4();
        let members = HashMap::from([(alice, "alice".to_string())]);
        let filters = CalendarFilters {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 31),
            category: Some("Work".into()),
            member_id: Some(alice.to_string()),
            ..Default::default()
        };
        assert_eq!(title(&filters, &members), "Calendar: 2025-01-01 to 2025-01-31 - Work Events - alice's Events");
        assert_eq!(title(&CalendarFilters::default(), &members), "Family Calendar");
    }

    #[test]
    fn test_grouped_by_day_in_start_order() {
        let family = Uuid::new_v4();
        let make = |date: &str, time: Option<&str>| -> Event {
            serde_json::from_value(json!({
                "id": Uuid::new_v4(),
                "title": "x",
                "date": date,
                "time": time,
                "family_id": family,
                "created_by": Uuid::new_v4()
            }))
            .unwrap()
        };
        let far = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let shown: Vec<DisplayEvent> = [make("2025-02-02", Some("15:00")), make("2025-02-01", None), make("2025-02-02", Some("08:00"))]
            .iter()
            .flat_map(|e| {
                occurrences(e, &[], far, far)
                    .unwrap()
                    .into_iter()
                    .map(|o| render(e, &o, family))
                    .collect::<Vec<_>>()
            })
            .collect();

        let agenda = build(shown, &CalendarFilters::default(), HashMap::new());
        assert_eq!(agenda.days.len(), 2);
        assert_eq!(agenda.days[0].date, "2025-02-01");
        assert_eq!(agenda.days[1].events[0].start, "2025-02-02T08:00:00");
    }
}
