use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::calendar::reminders::{self, Reminder};
use crate::database::models::fields;
use crate::database::models::{
    CalendarTemplate, Event, EventException, EventRef, EventRsvp, NotificationMethod, RecurrencePattern, RsvpResponse,
    User,
};
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::CurrentUser;
use crate::sharing;
use crate::state::AppState;

/// Event fields as submitted by a client. Absent fields are left alone on
/// update; an empty time or date clears the column.
#[derive(Debug, Default, Deserialize)]
pub struct EventForm {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "fields::day")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "fields::clearable_clock")]
    pub time: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "fields::clearable_clock")]
    pub end_time: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "fields::clearable_day")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_recurring: Option<bool>,
    #[serde(default)]
    pub recurrence_pattern: Option<String>,
    #[serde(default, deserialize_with = "fields::clearable_day")]
    pub recurrence_end_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub rsvp_enabled: Option<bool>,
    #[serde(default, deserialize_with = "fields::clearable_day")]
    pub rsvp_deadline: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub rsvp_notify: Option<bool>,
    #[serde(default)]
    pub reminder_enabled: Option<bool>,
    #[serde(default, deserialize_with = "fields::minutes")]
    pub reminder_time: Option<i64>,
    #[serde(default)]
    pub notification_method: Option<NotificationMethod>,
    #[serde(default, deserialize_with = "fields::opt_family_list")]
    pub shared_with: Option<Vec<Uuid>>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub update_template: bool,
}

fn clock_value(value: Option<NaiveTime>) -> Value {
    value.map_or(Value::Null, |t| json!(t.format("%H:%M:%S").to_string()))
}

fn day_value(value: Option<NaiveDate>) -> Value {
    value.map_or(Value::Null, |d| json!(d.format("%Y-%m-%d").to_string()))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl EventForm {
    /// `None` when no pattern was submitted, `Some(None)` for an explicit "none"
    fn pattern(&self) -> Result<Option<Option<RecurrencePattern>>, ApiError> {
        match &self.recurrence_pattern {
            None => Ok(None),
            Some(raw) => RecurrencePattern::parse(raw).map(Some).map_err(|e| {
                ApiError::validation_error(
                    e.clone(),
                    Some(HashMap::from([("recurrence_pattern".to_string(), e)])),
                )
            }),
        }
    }

    fn title(&self) -> Result<Option<String>, ApiError> {
        match &self.title {
            None => Ok(None),
            Some(_) => non_empty(&self.title).map(Some).ok_or_else(|| ApiError::field_required("title")),
        }
    }

    /// Column changes for the submitted fields
    fn changes(&self, own_family: Uuid) -> Result<Map<String, Value>, ApiError> {
        let mut changes = Map::new();
        let mut set = |key: &str, value: Value| {
            changes.insert(key.to_string(), value);
        };

        if let Some(title) = self.title()? {
            set("title", json!(title));
        }
        if let Some(date) = self.date {
            set("date", day_value(Some(date)));
        }
        for (key, value) in [("time", self.time), ("end_time", self.end_time)] {
            if let Some(value) = value {
                set(key, clock_value(value));
            }
        }
        for (key, value) in [
            ("end_date", self.end_date),
            ("recurrence_end_date", self.recurrence_end_date),
            ("rsvp_deadline", self.rsvp_deadline),
        ] {
            if let Some(value) = value {
                set(key, day_value(value));
            }
        }
        if let Some(all_day) = self.all_day {
            set("all_day", json!(all_day));
        }
        for (key, value) in [("category", &self.category), ("location", &self.location), ("description", &self.description)] {
            if value.is_some() {
                set(key, json!(non_empty(value)));
            }
        }
        match self.pattern()? {
            Some(Some(pattern)) => {
                set("recurrence_pattern", json!(pattern.as_str()));
                set("is_recurring", json!(self.is_recurring.unwrap_or(true)));
            }
            Some(None) => {
                set("recurrence_pattern", Value::Null);
                set("is_recurring", json!(false));
            }
            None => {
                if let Some(is_recurring) = self.is_recurring {
                    set("is_recurring", json!(is_recurring));
                }
            }
        }
        if let Some(enabled) = self.rsvp_enabled {
            set("rsvp_enabled", json!(enabled));
        }
        if let Some(notify) = self.rsvp_notify {
            set("rsvp_notify", json!(notify));
        }
        if let Some(enabled) = self.reminder_enabled {
            set("reminder_enabled", json!(enabled));
        }
        if let Some(minutes) = self.reminder_time {
            set("reminder_time", json!(minutes));
        }
        if let Some(method) = self.notification_method {
            set("notification_method", json!(method.as_str()));
        }
        if let Some(shared_with) = &self.shared_with {
            set("shared_with", json!(sharing::without(shared_with, &[own_family])));
        }
        Ok(changes)
    }
}

#[derive(Debug, Deserialize)]
pub struct MoveForm {
    pub event_id: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RsvpForm {
    pub event_id: String,
    pub response: RsvpResponse,
}

#[derive(Debug, Deserialize)]
pub struct ReminderForm {
    pub event_id: Uuid,
    #[serde(default)]
    pub reminder_enabled: bool,
    #[serde(default, deserialize_with = "fields::minutes")]
    pub reminder_time: Option<i64>,
    #[serde(default)]
    pub notification_method: Option<NotificationMethod>,
}

#[derive(Debug, Serialize)]
pub struct RsvpView {
    pub user_id: Uuid,
    pub username: String,
    pub response: RsvpResponse,
    pub responded_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    pub id: String,
    pub event: Event,
    /// Date the requested occurrence is shown on
    pub date: NaiveDate,
    pub instance_date: Option<NaiveDate>,
    pub rsvps: Vec<RsvpView>,
    pub can_edit: bool,
}

#[derive(Debug, Serialize)]
pub struct MovedEvent {
    pub event_id: String,
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

pub struct EventService {
    events: Repository<Event>,
    rsvps: Repository<EventRsvp>,
    exceptions: Repository<EventException>,
    users: Repository<User>,
    templates: Repository<CalendarTemplate>,
}

impl EventService {
    pub fn new(state: &AppState) -> Self {
        Self {
            events: state.repo(),
            rsvps: state.repo(),
            exceptions: state.repo(),
            users: state.repo(),
            templates: state.repo(),
        }
    }

    fn parse_ref(raw: &str) -> Result<EventRef, ApiError> {
        raw.parse::<EventRef>().map_err(ApiError::bad_request)
    }

    async fn load(&self, id: Uuid) -> Result<Event, ApiError> {
        self.events
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Event not found"))
    }

    /// Event owned by the caller's family
    async fn load_owned(&self, user: &CurrentUser, id: Uuid) -> Result<Event, ApiError> {
        let event = self.load(id).await?;
        if !event.is_owned_by(user.family_id) {
            return Err(ApiError::forbidden("Event belongs to another family"));
        }
        Ok(event)
    }

    /// Event the caller's family owns or was shared
    async fn load_visible(&self, user: &CurrentUser, id: Uuid) -> Result<Event, ApiError> {
        let event = self.load(id).await?;
        if !sharing::is_visible(event.family_id, &event.shared_with, user.family_id) {
            return Err(ApiError::forbidden("You do not have access to this event"));
        }
        Ok(event)
    }

    pub async fn create(&self, user: &CurrentUser, form: EventForm) -> Result<Event, ApiError> {
        let title = non_empty(&form.title).ok_or_else(|| ApiError::field_required("title"))?;
        let date = form.date.ok_or_else(|| ApiError::field_required("date"))?;
        let pattern = form.pattern()?.flatten();

        let event = Event {
            id: Uuid::new_v4(),
            title,
            date,
            time: form.time.flatten(),
            end_time: form.end_time.flatten(),
            end_date: form.end_date.flatten(),
            all_day: form.all_day.unwrap_or(false),
            category: non_empty(&form.category),
            location: non_empty(&form.location),
            description: non_empty(&form.description),
            family_id: user.family_id,
            created_by: user.id,
            is_recurring: pattern.is_some() && form.is_recurring.unwrap_or(true),
            recurrence_pattern: pattern,
            recurrence_end_date: form.recurrence_end_date.flatten(),
            rsvp_enabled: form.rsvp_enabled.unwrap_or(false),
            rsvp_deadline: form.rsvp_deadline.flatten(),
            rsvp_notify: form.rsvp_notify.unwrap_or(false),
            reminder_enabled: form.reminder_enabled.unwrap_or(false),
            reminder_time: form.reminder_time,
            notification_method: form.notification_method,
            shared_with: form
                .shared_with
                .as_deref()
                .map(|ids| sharing::without(ids, &[user.family_id]))
                .unwrap_or_default(),
            created_at: Some(Utc::now()),
        };
        let event = self.events.insert(&event).await?;
        tracing::info!("Created event {} '{}' for family {}", event.id, event.title, event.family_id);

        if form.update_template {
            if let Some(template_id) = form.template_id {
                if let Err(e) = self.write_back_template(user, template_id, &event).await {
                    tracing::warn!("Event {} saved but template {} was not updated: {}", event.id, template_id, e);
                }
            }
        }
        Ok(event)
    }

    /// Copy an event's values onto the template it was created from
    async fn write_back_template(&self, user: &CurrentUser, template_id: Uuid, event: &Event) -> Result<(), ApiError> {
        let changes = json!({
            "event_title": event.title,
            "event_category": event.category,
            "event_location": event.location,
            "event_description": event.description,
            "all_day": event.all_day,
            "event_time": event.time.map(|t| t.format("%H:%M:%S").to_string()),
            "event_end_time": event.end_time.map(|t| t.format("%H:%M:%S").to_string()),
            "recurrence_pattern": event.recurrence_pattern.map(|p| p.as_str()),
            "updated_at": Utc::now(),
        });
        let Value::Object(changes) = changes else {
            return Ok(());
        };
        let updated = self
            .templates
            .update_where(FilterData::where_(json!({ "id": template_id, "family_id": user.family_id })), changes)
            .await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Template not found"));
        }
        Ok(())
    }

    pub async fn update(&self, user: &CurrentUser, raw_id: &str, form: EventForm) -> Result<Event, ApiError> {
        let id = Self::parse_ref(raw_id)?.base_id();
        let event = self.load(id).await?;
        if !user.can_edit(event.family_id, event.created_by) {
            return Err(ApiError::forbidden("Only the creator or a family Admin can edit this event"));
        }

        let changes = form.changes(user.family_id)?;
        if changes.is_empty() {
            return Err(ApiError::bad_request("No changes supplied"));
        }
        self.events
            .update_id(id, changes)
            .await?
            .ok_or_else(|| ApiError::not_found("Event not found"))
    }

    pub async fn delete(&self, user: &CurrentUser, raw_id: &str) -> Result<Event, ApiError> {
        let id = Self::parse_ref(raw_id)?.base_id();
        let event = self.load_owned(user, id).await?;

        self.rsvps
            .delete_where(FilterData::where_(json!({ "$or": [
                { "event_id": id.to_string() },
                { "event_id": { "$like": format!("{}_%", id) } }
            ]})))
            .await?;
        self.exceptions
            .delete_where(FilterData::where_(json!({ "event_id": id })))
            .await?;
        self.events.delete_id(id).await?;

        tracing::info!("Deleted event {} from family {}", id, event.family_id);
        Ok(event)
    }

    async fn rsvp_views(&self, event_ref: &EventRef) -> Result<Vec<RsvpView>, ApiError> {
        let rsvps = self
            .rsvps
            .select_any(FilterData::where_(json!({ "event_id": event_ref.to_string() })).order_by("responded_at"))
            .await?;
        let user_ids: Vec<Uuid> = rsvps.iter().map(|r| r.user_id).collect();
        let names: HashMap<Uuid, String> = self
            .users
            .select_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        Ok(rsvps
            .into_iter()
            .map(|r| RsvpView {
                username: names.get(&r.user_id).cloned().unwrap_or_else(|| "Unknown".to_string()),
                user_id: r.user_id,
                response: r.response,
                responded_at: r.responded_at,
            })
            .collect())
    }

    pub async fn detail(&self, user: &CurrentUser, raw_id: &str) -> Result<EventDetail, ApiError> {
        let event_ref = Self::parse_ref(raw_id)?;
        let event = self.load_visible(user, event_ref.base_id()).await?;

        let (date, instance_date) = match event_ref {
            EventRef::Plain(_) => (event.date, None),
            EventRef::Instance { base, date } => {
                let moved = self
                    .exceptions
                    .select_one(FilterData::where_(json!({ "event_id": base, "original_date": date.format("%Y-%m-%d").to_string() })))
                    .await?;
                (moved.map(|x| x.new_date).unwrap_or(date), Some(date))
            }
        };

        Ok(EventDetail {
            id: event_ref.to_string(),
            rsvps: self.rsvp_views(&event_ref).await?,
            can_edit: user.can_edit(event.family_id, event.created_by),
            event,
            date,
            instance_date,
        })
    }

    /// Record the caller's answer; a repeat answer replaces the earlier one
    pub async fn rsvp(&self, user: &CurrentUser, form: RsvpForm, today: NaiveDate) -> Result<Vec<RsvpView>, ApiError> {
        let event_ref = Self::parse_ref(&form.event_id)?;
        let event = self.load_visible(user, event_ref.base_id()).await?;
        let Some(settings) = event.rsvp() else {
            return Err(ApiError::bad_request("RSVPs are not enabled for this event"));
        };
        if settings.deadline.is_some_and(|deadline| today > deadline) {
            return Err(ApiError::bad_request("The RSVP deadline has passed"));
        }

        let key = event_ref.to_string();
        let existing = self
            .rsvps
            .select_one(FilterData::where_(json!({ "event_id": key, "user_id": user.id })))
            .await?;
        match existing {
            Some(previous) => {
                let mut changes = Map::new();
                changes.insert("response".into(), json!(form.response));
                changes.insert("responded_at".into(), json!(Utc::now()));
                self.rsvps.update_id(previous.id, changes).await?;
            }
            None => {
                self.rsvps
                    .insert(&EventRsvp {
                        id: Uuid::new_v4(),
                        event_id: key,
                        user_id: user.id,
                        response: form.response,
                        responded_at: Some(Utc::now()),
                    })
                    .await?;
            }
        }
        self.rsvp_views(&event_ref).await
    }

    /// Drag/resize: instances get an exception row, plain events are re-dated
    pub async fn move_dates(&self, user: &CurrentUser, form: MoveForm) -> Result<MovedEvent, ApiError> {
        let event_ref = Self::parse_ref(&form.event_id)?;
        let start = fields::parse_day(&form.start_date).ok_or_else(|| ApiError::field_required("start_date"))?;
        let end = match form.end_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => Some(fields::parse_day(raw).ok_or_else(|| ApiError::bad_request(format!("invalid end_date '{}'", raw)))?),
        };

        if end.is_some_and(|end| end < start) {
            return Err(ApiError::bad_request("end_date cannot be before start_date"));
        }
        let event = self.load_owned(user, event_ref.base_id()).await?;

        let end = match event_ref {
            EventRef::Instance { base, date } => {
                if event.recurrence().is_none() {
                    return Err(ApiError::bad_request(format!("Event {} does not repeat", base)));
                }
                let original = date.format("%Y-%m-%d").to_string();
                self.exceptions
                    .delete_where(FilterData::where_(json!({ "event_id": base, "original_date": original })))
                    .await?;
                self.exceptions
                    .insert(&EventException {
                        id: Uuid::new_v4(),
                        event_id: base,
                        original_date: date,
                        new_date: start,
                        end_date: end,
                    })
                    .await?;
                tracing::debug!("Moved instance {} to {}", event_ref, start);
                end
            }
            EventRef::Plain(id) => {
                // Without an explicit end, a multi-day span keeps its length
                let end = end.or_else(|| event.end_date.map(|old_end| old_end + (start - event.date)));
                let mut changes = Map::new();
                changes.insert("date".into(), day_value(Some(start)));
                changes.insert("end_date".into(), day_value(end));
                self.events.update_id(id, changes).await?;
                end
            }
        };

        Ok(MovedEvent {
            event_id: event_ref.to_string(),
            date: start,
            end_date: end,
        })
    }

    async fn reminder_events(&self, user: &CurrentUser) -> Result<Vec<Event>, ApiError> {
        Ok(self
            .events
            .select_any(FilterData::where_(json!({ "family_id": user.family_id, "reminder_enabled": true })))
            .await?)
    }

    pub async fn upcoming_reminders(&self, user: &CurrentUser, now: NaiveDateTime) -> Result<Vec<Reminder>, ApiError> {
        Ok(reminders::upcoming(&self.reminder_events(user).await?, now))
    }

    pub async fn due_reminders(&self, user: &CurrentUser, now: NaiveDateTime) -> Result<Vec<Reminder>, ApiError> {
        Ok(reminders::due(&self.reminder_events(user).await?, now))
    }

    pub async fn update_reminder(&self, user: &CurrentUser, form: ReminderForm) -> Result<Event, ApiError> {
        let event = self.load(form.event_id).await?;
        if !user.can_edit(event.family_id, event.created_by) {
            return Err(ApiError::forbidden("Not authorized to update this event"));
        }

        let mut changes = Map::new();
        changes.insert("reminder_enabled".into(), json!(form.reminder_enabled));
        if form.reminder_enabled {
            changes.insert(
                "reminder_time".into(),
                json!(form.reminder_time.unwrap_or(crate::database::models::event::DEFAULT_REMINDER_MINUTES)),
            );
            changes.insert(
                "notification_method".into(),
                json!(form.notification_method.unwrap_or_default().as_str()),
            );
        }
        self.events
            .update_id(event.id, changes)
            .await?
            .ok_or_else(|| ApiError::not_found("Event not found"))
    }
}
