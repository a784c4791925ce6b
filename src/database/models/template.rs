use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::RecurrencePattern;
use super::fields;
use super::Model;

/// Saved default values for new events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarTemplate {
    pub id: Uuid,
    pub family_id: Uuid,
    pub created_by: Uuid,
    pub template_name: String,
    pub event_title: String,
    #[serde(default)]
    pub event_category: Option<String>,
    #[serde(default)]
    pub event_location: Option<String>,
    #[serde(default)]
    pub event_description: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, with = "fields::clock")]
    pub event_time: Option<NaiveTime>,
    #[serde(default, with = "fields::clock")]
    pub event_end_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "RecurrencePattern::deserialize_opt")]
    pub recurrence_pattern: Option<RecurrencePattern>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model for CalendarTemplate {
    const TABLE: &'static str = "calendar_templates";
}
