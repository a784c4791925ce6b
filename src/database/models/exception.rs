use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fields;
use super::Model;

/// Override for one generated instance of a recurring event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventException {
    pub id: Uuid,
    /// Base event id
    pub event_id: Uuid,
    pub original_date: NaiveDate,
    pub new_date: NaiveDate,
    #[serde(default, with = "fields::day")]
    pub end_date: Option<NaiveDate>,
}

impl Model for EventException {
    const TABLE: &'static str = "event_exceptions";
}
