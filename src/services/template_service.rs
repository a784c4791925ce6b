use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::models::fields;
use crate::database::models::{CalendarTemplate, RecurrencePattern};
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TemplateForm {
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub event_title: Option<String>,
    #[serde(default)]
    pub event_category: Option<String>,
    #[serde(default)]
    pub event_location: Option<String>,
    #[serde(default)]
    pub event_description: Option<String>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default, with = "fields::clock")]
    pub event_time: Option<NaiveTime>,
    #[serde(default, with = "fields::clock")]
    pub event_end_time: Option<NaiveTime>,
    #[serde(default)]
    pub recurrence_pattern: Option<String>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl TemplateForm {
    fn pattern(&self) -> Result<Option<RecurrencePattern>, ApiError> {
        match &self.recurrence_pattern {
            None => Ok(None),
            Some(raw) => RecurrencePattern::parse(raw).map_err(ApiError::bad_request),
        }
    }
}

/// New-event form values prefilled from a template
#[derive(Debug, Serialize)]
pub struct AppliedTemplate {
    pub template_id: Uuid,
    pub title: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub all_day: bool,
    #[serde(with = "fields::clock")]
    pub time: Option<NaiveTime>,
    #[serde(with = "fields::clock")]
    pub end_time: Option<NaiveTime>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
}

impl From<CalendarTemplate> for AppliedTemplate {
    fn from(t: CalendarTemplate) -> Self {
        Self {
            template_id: t.id,
            title: t.event_title,
            category: t.event_category,
            location: t.event_location,
            description: t.event_description,
            all_day: t.all_day,
            time: t.event_time,
            end_time: t.event_end_time,
            is_recurring: t.recurrence_pattern.is_some(),
            recurrence_pattern: t.recurrence_pattern,
        }
    }
}

pub struct TemplateService {
    templates: Repository<CalendarTemplate>,
}

impl TemplateService {
    pub fn new(state: &AppState) -> Self {
        Self { templates: state.repo() }
    }

    pub async fn list(&self, user: &CurrentUser) -> Result<Vec<CalendarTemplate>, ApiError> {
        Ok(self
            .templates
            .select_any(FilterData::where_(json!({ "family_id": user.family_id })).order_by("template_name"))
            .await?)
    }

    async fn load(&self, user: &CurrentUser, id: Uuid) -> Result<CalendarTemplate, ApiError> {
        self.templates
            .select_one(FilterData::where_(json!({ "id": id, "family_id": user.family_id })))
            .await?
            .ok_or_else(|| ApiError::not_found("Template not found"))
    }

    pub async fn create(&self, user: &CurrentUser, form: TemplateForm) -> Result<CalendarTemplate, ApiError> {
        let template_name = trimmed(&form.template_name).ok_or_else(|| ApiError::field_required("template_name"))?;
        let event_title = trimmed(&form.event_title).ok_or_else(|| ApiError::field_required("event_title"))?;

        let now = Utc::now();
        let template = CalendarTemplate {
            id: Uuid::new_v4(),
            family_id: user.family_id,
            created_by: user.id,
            template_name,
            event_title,
            event_category: trimmed(&form.event_category),
            event_location: trimmed(&form.event_location),
            event_description: trimmed(&form.event_description),
            all_day: form.all_day.unwrap_or(false),
            event_time: form.event_time,
            event_end_time: form.event_end_time,
            recurrence_pattern: form.pattern()?,
            created_at: Some(now),
            updated_at: Some(now),
        };
        let template = self.templates.insert(&template).await?;
        tracing::info!("Created calendar template '{}' for family {}", template.template_name, user.family_id);
        Ok(template)
    }

    pub async fn update(&self, user: &CurrentUser, id: Uuid, form: TemplateForm) -> Result<CalendarTemplate, ApiError> {
        self.load(user, id).await?;

        let mut changes = Map::new();
        for (key, value) in [("template_name", &form.template_name), ("event_title", &form.event_title)] {
            if value.is_some() {
                let value = trimmed(value).ok_or_else(|| ApiError::field_required(key))?;
                changes.insert(key.into(), json!(value));
            }
        }
        for (key, value) in [
            ("event_category", &form.event_category),
            ("event_location", &form.event_location),
            ("event_description", &form.event_description),
        ] {
            if value.is_some() {
                changes.insert(key.into(), json!(trimmed(value)));
            }
        }
        if let Some(all_day) = form.all_day {
            changes.insert("all_day".into(), json!(all_day));
        }
        if let Some(time) = form.event_time {
            changes.insert("event_time".into(), json!(time.format("%H:%M:%S").to_string()));
        }
        if let Some(time) = form.event_end_time {
            changes.insert("event_end_time".into(), json!(time.format("%H:%M:%S").to_string()));
        }
        if form.recurrence_pattern.is_some() {
            changes.insert(
                "recurrence_pattern".into(),
                form.pattern()?.map_or(Value::Null, |p| json!(p.as_str())),
            );
        }
        changes.insert("updated_at".into(), json!(Utc::now()));

        self.templates
            .update_id(id, changes)
            .await?
            .ok_or_else(|| ApiError::not_found("Template not found"))
    }

    pub async fn delete(&self, user: &CurrentUser, id: Uuid) -> Result<CalendarTemplate, ApiError> {
        let template = self.load(user, id).await?;
        self.templates.delete_id(id).await?;
        Ok(template)
    }

    pub async fn apply(&self, user: &CurrentUser, id: Uuid) -> Result<AppliedTemplate, ApiError> {
        Ok(self.load(user, id).await?.into())
    }
}
