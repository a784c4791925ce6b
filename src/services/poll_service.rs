use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use uuid::Uuid;

use crate::database::models::{ChatPoll, PollVote};
use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VoteForm {
    pub option_index: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OptionTally {
    pub index: usize,
    pub label: String,
    pub votes: usize,
}

#[derive(Debug, Serialize)]
pub struct PollResults {
    pub poll_id: Uuid,
    pub options: Vec<OptionTally>,
    pub total_votes: usize,
    pub your_vote: usize,
}

/// Per-option counts; votes pointing past the option list are ignored
pub fn tally(options: &[String], votes: &[PollVote]) -> Vec<OptionTally> {
    options
        .iter()
        .enumerate()
        .map(|(index, label)| OptionTally {
            index,
            label: label.clone(),
            votes: votes.iter().filter(|v| v.option_index as usize == index && v.option_index >= 0).count(),
        })
        .collect()
}

pub struct PollService {
    polls: Repository<ChatPoll>,
    votes: Repository<PollVote>,
}

impl PollService {
    pub fn new(state: &AppState) -> Self {
        Self {
            polls: state.repo(),
            votes: state.repo(),
        }
    }

    /// Cast or replace the caller's vote on a family chat poll
    pub async fn vote(&self, user: &CurrentUser, chat_id: Uuid, form: VoteForm) -> Result<PollResults, ApiError> {
        let poll = self
            .polls
            .select_id(chat_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Poll not found"))?;
        if poll.family_id != user.family_id {
            return Err(ApiError::forbidden("This poll belongs to another family"));
        }
        if !poll.is_poll {
            return Err(ApiError::bad_request("This message is not a poll"));
        }
        let index = usize::try_from(form.option_index)
            .ok()
            .filter(|i| *i < poll.poll_options.len())
            .ok_or_else(|| ApiError::bad_request(format!("Option {} does not exist", form.option_index)))?;

        let existing = self
            .votes
            .select_one(FilterData::where_(json!({ "poll_id": chat_id, "user_id": user.id })))
            .await?;
        match existing {
            Some(vote) => {
                let mut changes = Map::new();
                changes.insert("option_index".into(), json!(index));
                changes.insert("voted_at".into(), json!(Utc::now()));
                self.votes.update_id(vote.id, changes).await?;
            }
            None => {
                self.votes
                    .insert(&PollVote {
                        id: Uuid::new_v4(),
                        poll_id: chat_id,
                        user_id: user.id,
                        option_index: index as i32,
                        voted_at: Some(Utc::now()),
                    })
                    .await?;
            }
        }

        let votes = self
            .votes
            .select_any(FilterData::where_(json!({ "poll_id": chat_id })))
            .await?;
        Ok(PollResults {
            poll_id: chat_id,
            options: tally(&poll.poll_options, &votes),
            total_votes: votes.len(),
            your_vote: index,
        })
    }
}
