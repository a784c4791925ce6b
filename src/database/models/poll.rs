use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fields;
use super::Model;

/// The slice of a chat message that voting needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPoll {
    pub id: Uuid,
    pub family_id: Uuid,
    #[serde(default)]
    pub is_poll: bool,
    #[serde(default, deserialize_with = "fields::string_list")]
    pub poll_options: Vec<String>,
}

impl Model for ChatPoll {
    const TABLE: &'static str = "chats";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollVote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub user_id: Uuid,
    pub option_index: i32,
    #[serde(default)]
    pub voted_at: Option<DateTime<Utc>>,
}

impl Model for PollVote {
    const TABLE: &'static str = "poll_votes";
}
