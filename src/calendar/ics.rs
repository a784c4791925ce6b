//! RFC 5545 export and import.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use icalendar::parser::{read_calendar, unfold, Component as ParsedComponent};
use icalendar::{Alarm, Calendar, CalendarDateTime, Component, DatePerhapsTime, EventLike, Property, Trigger, ValueType};
use std::collections::HashMap;
use uuid::Uuid;

use super::recurrence::{pattern_from_rrule, rrule_value};
use super::time::{localize, resolve_zone};
use super::CalendarError;
use crate::config::CalendarConfig;
use crate::database::models::{Event, RecurrencePattern};

const ICS_DATE: &str = "%Y%m%d";
const ICS_LOCAL: &str = "%Y%m%dT%H%M%S";
const ICS_UTC: &str = "%Y%m%dT%H%M%SZ";

pub struct ExportOptions<'a> {
    pub config: &'a CalendarConfig,
    pub calendar_name: String,
    /// DTSTAMP written on every VEVENT
    pub stamp: DateTime<Utc>,
}

impl<'a> ExportOptions<'a> {
    pub fn for_user(config: &'a CalendarConfig, username: &str) -> Self {
        Self {
            config,
            calendar_name: format!("FamilySphere - {}'s Family Calendar", username),
            stamp: Utc::now(),
        }
    }
}

/// Attachment name for an export made on `day`
pub fn export_filename(day: NaiveDate) -> String {
    format!("familysphere_calendar_{}.ics", day.format(ICS_DATE))
}

fn date_property(name: &str, day: NaiveDate) -> Property {
    let mut prop = Property::new(name, day.format(ICS_DATE).to_string());
    prop.append_parameter(ValueType::Date);
    prop
}

fn zoned_property(name: &str, local: NaiveDateTime, zone: Tz) -> Property {
    let mut prop = Property::new(name, local.format(ICS_LOCAL).to_string());
    prop.add_parameter("TZID", zone.name());
    prop
}

fn vevent(
    event: &Event,
    organizers: &HashMap<Uuid, String>,
    zone: Tz,
    options: &ExportOptions<'_>,
) -> Result<icalendar::Event, CalendarError> {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&format!("{}@{}", event.id, options.config.uid_domain));
    ics_event.add_property("DTSTAMP", options.stamp.format(ICS_UTC).to_string());
    ics_event.summary(&event.title);

    match event.time {
        Some(time) if !event.all_day => {
            let start = event.date.and_time(time);
            let end = match event.end_time {
                Some(end_time) => event
                    .end_date
                    .filter(|d| *d >= event.date)
                    .unwrap_or(event.date)
                    .and_time(end_time)
                    .max(start),
                None => start + Duration::hours(1),
            };
            localize(zone, start, event.id)?;
            localize(zone, end, event.id)?;
            ics_event.append_property(zoned_property("DTSTART", start, zone));
            ics_event.append_property(zoned_property("DTEND", end, zone));
        }
        _ => {
            let last_day = event.end_date.filter(|d| *d > event.date).unwrap_or(event.date);
            ics_event.append_property(date_property("DTSTART", event.date));
            ics_event.append_property(date_property("DTEND", last_day + Duration::days(1)));
        }
    }

    if let Some(recurrence) = event.recurrence() {
        ics_event.add_property("RRULE", rrule_value(&recurrence));
    }
    if let Some(description) = event.description.as_deref().filter(|s| !s.is_empty()) {
        ics_event.description(description);
    }
    if let Some(location) = event.location.as_deref().filter(|s| !s.is_empty()) {
        ics_event.location(location);
    }
    if let Some(category) = event.category.as_deref().filter(|s| !s.is_empty()) {
        ics_event.add_property("CATEGORIES", category);
    }
    if let Some(email) = organizers.get(&event.created_by) {
        ics_event.append_property(Property::new("ORGANIZER", format!("mailto:{}", email)));
    }
    if let Some(reminder) = event.reminder() {
        let mut alarm = Alarm::display(
            &format!("Reminder: {}", event.title),
            Trigger::before_start(Duration::minutes(reminder.minutes_before)),
        );
        alarm.add_property("TRIGGER", format!("-PT{}M", reminder.minutes_before));
        ics_event.alarm(alarm);
    }

    Ok(ics_event.done())
}

/// Render `events` as one VCALENDAR. Any event that cannot be rendered fails
/// the whole export.
pub fn export(
    events: &[Event],
    organizers: &HashMap<Uuid, String>,
    options: &ExportOptions<'_>,
) -> Result<String, CalendarError> {
    let zone = resolve_zone(&options.config.timezone)?;

    let mut cal = Calendar::new();
    for event in events {
        cal.push(vevent(event, organizers, zone, options)?);
    }
    let cal = cal.done();

    Ok(rewrite_header(&cal.to_string(), options))
}

/// Replace the calendar-level header the icalendar crate writes with ours,
/// and drop the DTSTAMP/UID it adds inside VALARM blocks.
fn rewrite_header(ics: &str, options: &ExportOptions<'_>) -> String {
    let mut out = String::with_capacity(ics.len() + 256);
    let mut depth = 0usize;
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("BEGIN:") {
            depth += 1;
            in_valarm = line == "BEGIN:VALARM";
        }

        let calendar_level = depth == 1 && !line.starts_with("BEGIN:") && !line.starts_with("END:");
        let skip = (calendar_level
            && ["VERSION:", "PRODID:", "CALSCALE:", "METHOD:", "X-WR-CALNAME:"]
                .iter()
                .any(|p| line.starts_with(p)))
            || (in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")));

        if !skip {
            out.push_str(line);
            out.push_str("\r\n");
        }

        if line == "BEGIN:VCALENDAR" {
            out.push_str("VERSION:2.0\r\n");
            out.push_str(&format!("PRODID:{}\r\n", options.config.prodid));
            out.push_str("CALSCALE:GREGORIAN\r\n");
            out.push_str("METHOD:PUBLISH\r\n");
            out.push_str(&format!("X-WR-CALNAME:{}\r\n", escape_text(&options.calendar_name)));
        }

        if line.starts_with("END:") {
            depth = depth.saturating_sub(1);
            if line == "END:VALARM" {
                in_valarm = false;
            }
        }
    }
    out
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Event fields recovered from one VEVENT
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedEvent {
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub recurrence: Option<(RecurrencePattern, Option<NaiveDate>)>,
}

enum Moment {
    Day(NaiveDate),
    Local(NaiveDateTime),
}

/// Wall-clock time in `zone`. Floating times and unknown TZIDs are taken as-is.
fn to_moment(value: DatePerhapsTime, zone: Tz) -> Moment {
    match value {
        DatePerhapsTime::Date(day) => Moment::Day(day),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Moment::Local(dt.with_timezone(&zone).naive_local()),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => Moment::Local(naive),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => match tzid.parse::<Tz>() {
            Ok(source) => match localize(source, date_time, Uuid::nil()) {
                Ok(dt) => Moment::Local(dt.with_timezone(&zone).naive_local()),
                Err(_) => Moment::Local(date_time),
            },
            Err(_) => Moment::Local(date_time),
        },
    }
}

fn text(component: &ParsedComponent<'_>, name: &str) -> Option<String> {
    component
        .find_prop(name)
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|s| !s.trim().is_empty())
}

fn collect_vevents<'a, 'b>(components: &'b [ParsedComponent<'a>], out: &mut Vec<&'b ParsedComponent<'a>>) {
    for component in components {
        if component.name == "VEVENT" {
            out.push(component);
        } else {
            collect_vevents(&component.components, out);
        }
    }
}

/// `None` when the VEVENT has no usable DTSTART
fn imported(vevent: &ParsedComponent<'_>, zone: Tz) -> Option<ImportedEvent> {
    let uid = text(vevent, "UID").unwrap_or_default();
    let Some(start_prop) = vevent.find_prop("DTSTART") else {
        tracing::warn!("Skipping VEVENT '{}' without DTSTART", uid);
        return None;
    };
    let start = match DatePerhapsTime::try_from(start_prop) {
        Ok(value) => to_moment(value, zone),
        Err(_) => {
            tracing::warn!("Skipping VEVENT '{}' with invalid DTSTART '{}'", uid, start_prop.val.as_ref());
            return None;
        }
    };
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|v| to_moment(v, zone));

    let (date, time, end_time, end_date, all_day) = match (start, end) {
        (Moment::Day(day), end) => {
            // DATE end values are exclusive
            let end_date = match end {
                Some(Moment::Day(last)) if last > day + Duration::days(1) => Some(last - Duration::days(1)),
                _ => None,
            };
            (day, None, None, end_date, true)
        }
        (Moment::Local(start), Some(Moment::Local(end))) if end.date() == start.date() => {
            (start.date(), Some(start.time()), Some(end.time()), None, false)
        }
        (Moment::Local(start), Some(Moment::Local(end))) if end.date() > start.date() => {
            (start.date(), Some(start.time()), Some(end.time()), Some(end.date()), false)
        }
        (Moment::Local(start), _) => (start.date(), Some(start.time()), None, None, false),
    };

    Some(ImportedEvent {
        title: text(vevent, "SUMMARY").unwrap_or_else(|| "Imported Event".to_string()),
        date,
        time,
        end_time,
        end_date,
        all_day,
        location: text(vevent, "LOCATION"),
        description: text(vevent, "DESCRIPTION"),
        category: vevent
            .find_prop("CATEGORIES")
            .and_then(|p| p.val.as_ref().split(',').next().map(|c| unescape_text(c.trim())))
            .filter(|c| !c.is_empty()),
        recurrence: vevent.find_prop("RRULE").and_then(|p| pattern_from_rrule(p.val.as_ref())),
    })
}

/// Parse every VEVENT in `body`, localizing timed values into `zone`.
/// VEVENTs without a start are skipped; a body with nothing usable is an error.
pub fn import(body: &str, zone: Tz) -> Result<Vec<ImportedEvent>, CalendarError> {
    let unfolded = unfold(body);
    let calendar = read_calendar(&unfolded).map_err(|e| CalendarError::Parse(e.to_string()))?;

    let mut vevents = Vec::new();
    collect_vevents(&calendar.components, &mut vevents);

    let events: Vec<ImportedEvent> = vevents.into_iter().filter_map(|v| imported(v, zone)).collect();
    if events.is_empty() {
        return Err(CalendarError::NoEvents);
    }
    Ok(events)
}
