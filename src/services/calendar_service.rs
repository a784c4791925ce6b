use chrono::Utc;
use chrono_tz::Tz;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::calendar::agenda::{self, Agenda};
use crate::calendar::ics::{self, ExportOptions, ImportedEvent};
use crate::calendar::{display, time, CalendarFilters, DisplayEvent};
use crate::config::AppConfig;
use crate::database::models::{Event, EventException, User};
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::CurrentUser;
use crate::sharing;
use crate::state::AppState;

/// Rendered `.ics` download
#[derive(Debug)]
pub struct CalendarExport {
    pub filename: String,
    pub body: String,
}

pub struct CalendarService {
    config: Arc<AppConfig>,
    events: Repository<Event>,
    exceptions: Repository<EventException>,
    users: Repository<User>,
}

impl CalendarService {
    pub fn new(state: &AppState) -> Self {
        Self {
            config: state.config.clone(),
            events: state.repo(),
            exceptions: state.repo(),
            users: state.repo(),
        }
    }

    pub fn zone(&self) -> Result<Tz, ApiError> {
        Ok(time::resolve_zone(&self.config.calendar.timezone)?)
    }

    /// Own events plus, unless excluded, events other families shared with us
    async fn visible_events(&self, user: &CurrentUser, filters: &CalendarFilters) -> Result<Vec<Event>, ApiError> {
        Ok(self
            .events
            .select_any(
                FilterData::where_(sharing::visible_to(user.family_id, filters.include_shared)).order_by("date, time"),
            )
            .await?)
    }

    async fn exceptions_for(&self, events: &[Event]) -> Result<Vec<EventException>, ApiError> {
        let recurring: Vec<Uuid> = events.iter().filter(|e| e.recurrence().is_some()).map(|e| e.id).collect();
        if recurring.is_empty() {
            return Ok(vec![]);
        }
        Ok(self
            .exceptions
            .select_any(FilterData::where_(json!({ "event_id": { "$in": recurring } })))
            .await?)
    }

    /// Widget feed for the caller's calendar
    pub async fn feed(&self, user: &CurrentUser, filters: &CalendarFilters) -> Result<Vec<DisplayEvent>, ApiError> {
        let events = self.visible_events(user, filters).await?;
        let exceptions = self.exceptions_for(&events).await?;
        let window = filters.window(time::today_in(self.zone()?), self.config.calendar.expansion_days);

        let feed = display::build(&events, &exceptions, filters, user.family_id, window)?;
        tracing::debug!("Calendar feed for family {}: {} entries from {} events", user.family_id, feed.len(), events.len());
        Ok(feed)
    }

    pub async fn agenda(&self, user: &CurrentUser, filters: &CalendarFilters) -> Result<Agenda, ApiError> {
        let members: HashMap<Uuid, String> = self
            .users
            .select_any(FilterData::where_(json!({ "family_id": user.family_id })).order_by("username"))
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();
        let feed = self.feed(user, filters).await?;
        Ok(agenda::build(feed, filters, members))
    }

    pub async fn export(&self, user: &CurrentUser, filters: &CalendarFilters) -> Result<CalendarExport, ApiError> {
        let events: Vec<Event> = self
            .visible_events(user, filters)
            .await?
            .into_iter()
            .filter(|e| filters.admits(e, user.family_id) && filters.in_range(e.date))
            .collect();

        let creators: Vec<Uuid> = events.iter().map(|e| e.created_by).collect();
        let organizers: HashMap<Uuid, String> = self
            .users
            .select_ids(&creators)
            .await?
            .into_iter()
            .filter_map(|u| u.email.filter(|e| !e.is_empty()).map(|email| (u.id, email)))
            .collect();

        let options = ExportOptions::for_user(&self.config.calendar, &user.username);
        let body = ics::export(&events, &organizers, &options).map_err(|e| {
            tracing::error!("Calendar export for family {} failed: {}", user.family_id, e);
            ApiError::from(e)
        })?;

        tracing::info!("Exported {} events for family {}", events.len(), user.family_id);
        Ok(CalendarExport {
            filename: ics::export_filename(time::today_in(self.zone()?)),
            body,
        })
    }

    /// Create one event per VEVENT in `body`; returns how many were created
    pub async fn import(&self, user: &CurrentUser, body: &str) -> Result<usize, ApiError> {
        let imported = ics::import(body, self.zone()?)?;

        let mut count = 0;
        for item in imported {
            let event = self.events.insert(&imported_event(item, user)).await?;
            tracing::debug!("Imported event {} '{}'", event.id, event.title);
            count += 1;
        }
        tracing::info!("Imported {} events into family {}", count, user.family_id);
        Ok(count)
    }
}

fn imported_event(item: ImportedEvent, user: &CurrentUser) -> Event {
    let (pattern, until) = match item.recurrence {
        Some((pattern, until)) => (Some(pattern), until),
        None => (None, None),
    };
    Event {
        id: Uuid::new_v4(),
        title: item.title,
        date: item.date,
        time: item.time,
        end_time: item.end_time,
        end_date: item.end_date,
        all_day: item.all_day,
        category: item.category,
        location: item.location,
        description: item.description,
        family_id: user.family_id,
        created_by: user.id,
        is_recurring: pattern.is_some(),
        recurrence_pattern: pattern,
        recurrence_end_date: until,
        rsvp_enabled: false,
        rsvp_deadline: None,
        rsvp_notify: false,
        reminder_enabled: false,
        reminder_time: None,
        notification_method: None,
        shared_with: vec![],
        created_at: Some(Utc::now()),
    }
}
