use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use rrule::RRuleSet;
use std::collections::HashMap;
use uuid::Uuid;

use super::CalendarError;
use crate::database::models::{Event, EventException, EventRef, Recurrence, RecurrencePattern};

/// Upper bound on generated instances per event and window
const MAX_INSTANCES: u16 = 1500;

/// One concrete appearance of an event on the calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub id: EventRef,
    /// Date the rule produced, or the stored date of a plain event
    pub original_date: NaiveDate,
    /// Date the occurrence is shown on after any exception
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl Occurrence {
    pub fn is_moved(&self) -> bool {
        self.date != self.original_date
    }
}

/// `FREQ`/`INTERVAL` pair for a pattern
fn freq(pattern: RecurrencePattern) -> (&'static str, u32) {
    match pattern {
        RecurrencePattern::Daily => ("DAILY", 1),
        RecurrencePattern::Weekly => ("WEEKLY", 1),
        RecurrencePattern::Biweekly => ("WEEKLY", 2),
        RecurrencePattern::Monthly => ("MONTHLY", 1),
        RecurrencePattern::Yearly => ("YEARLY", 1),
    }
}

/// RRULE value as written into exported VEVENTs
pub fn rrule_value(recurrence: &Recurrence) -> String {
    let (freq, interval) = freq(recurrence.pattern);
    let mut rule = format!("FREQ={}", freq);
    if interval > 1 {
        rule.push_str(&format!(";INTERVAL={}", interval));
    }
    if let Some(until) = recurrence.until {
        rule.push_str(&format!(";UNTIL={}", until.format("%Y%m%d")));
    }
    rule
}

/// Map an incoming RRULE back onto the supported patterns. Intervals other
/// than biweekly collapse onto the base frequency.
pub fn pattern_from_rrule(rule: &str) -> Option<(RecurrencePattern, Option<NaiveDate>)> {
    let mut freq = None;
    let mut interval = 1u32;
    let mut until = None;
    for part in rule.split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_uppercase().as_str() {
            "FREQ" => freq = Some(value.trim().to_ascii_uppercase()),
            "INTERVAL" => interval = value.trim().parse().unwrap_or(1),
            "UNTIL" => until = value.get(..8).and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok()),
            _ => {}
        }
    }
    let pattern = match (freq?.as_str(), interval) {
        ("DAILY", _) => RecurrencePattern::Daily,
        ("WEEKLY", 2) => RecurrencePattern::Biweekly,
        ("WEEKLY", _) => RecurrencePattern::Weekly,
        ("MONTHLY", _) => RecurrencePattern::Monthly,
        ("YEARLY", _) => RecurrencePattern::Yearly,
        _ => return None,
    };
    Some((pattern, until))
}

/// Rule text for the rrule parser. Instances are computed on whole days, so
/// the rule is anchored at midnight UTC.
fn rule_set_source(start: NaiveDate, recurrence: &Recurrence) -> String {
    let (freq, interval) = freq(recurrence.pattern);
    let mut rule = format!("FREQ={};INTERVAL={}", freq, interval);
    if let Some(until) = recurrence.until {
        rule.push_str(&format!(";UNTIL={}T235959Z", until.format("%Y%m%d")));
    }
    format!("DTSTART:{}T000000Z\nRRULE:{}", start.format("%Y%m%d"), rule)
}

/// Instance dates of a recurring event between `from` and `to`, inclusive
pub fn instance_dates(
    event_id: Uuid,
    start: NaiveDate,
    recurrence: &Recurrence,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<NaiveDate>, CalendarError> {
    if to < from {
        return Ok(vec![]);
    }
    let rule_set: RRuleSet = rule_set_source(start, recurrence)
        .parse()
        .map_err(|e| CalendarError::Recurrence {
            event: event_id,
            reason: format!("{}", e),
        })?;

    // after/before are exclusive
    let tz: rrule::Tz = Utc.into();
    let after = (from.and_time(NaiveTime::MIN).and_utc() - Duration::seconds(1)).with_timezone(&tz);
    let before = (to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc().with_timezone(&tz);

    let result = rule_set.after(after).before(before).all(MAX_INSTANCES);
    if result.limited {
        tracing::warn!(%event_id, "recurrence expansion truncated at {} instances", MAX_INSTANCES);
    }
    Ok(result.dates.iter().map(|d| d.date_naive()).collect())
}

/// Every occurrence of `event` to show between `from` and `to`.
///
/// Plain events yield themselves regardless of the window. Recurring events
/// are expanded and each instance with an exception row is moved to the
/// exception's dates, keeping its composite id.
pub fn occurrences(
    event: &Event,
    exceptions: &[EventException],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Occurrence>, CalendarError> {
    let Some(recurrence) = event.recurrence() else {
        return Ok(vec![Occurrence {
            id: EventRef::Plain(event.id),
            original_date: event.date,
            date: event.date,
            end_date: event.end_date,
        }]);
    };

    let moved: HashMap<NaiveDate, &EventException> = exceptions
        .iter()
        .filter(|x| x.event_id == event.id)
        .map(|x| (x.original_date, x))
        .collect();

    let dates = instance_dates(event.id, event.date, &recurrence, from, to)?;
    Ok(dates
        .into_iter()
        .map(|date| {
            let id = EventRef::instance(event.id, date);
            match moved.get(&date) {
                Some(exception) => Occurrence {
                    id,
                    original_date: date,
                    date: exception.new_date,
                    end_date: exception.end_date,
                },
                None => Occurrence {
                    id,
                    original_date: date,
                    date,
                    end_date: None,
                },
            }
        })
        .collect())
}
