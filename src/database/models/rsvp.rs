use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpResponse {
    Yes,
    No,
    Maybe,
}

/// One user's answer to an event or a single recurring instance.
/// `event_id` holds the external event reference, so it may be composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRsvp {
    pub id: Uuid,
    pub event_id: String,
    pub user_id: Uuid,
    pub response: RsvpResponse,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
}

impl Model for EventRsvp {
    const TABLE: &'static str = "event_rsvps";
}
