use axum::{
    body::Bytes,
    extract::{Extension, State},
};

use crate::calendar::reminders::Reminder;
use crate::calendar::time;
use crate::database::models::Event;
use crate::error::ApiError;
use crate::handlers::read_json;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::EventService;
use crate::state::AppState;

fn now(state: &AppState) -> Result<chrono::NaiveDateTime, ApiError> {
    Ok(time::now_in(time::resolve_zone(&state.config.calendar.timezone)?))
}

/// GET /api/reminders - upcoming reminder times, soonest first
pub async fn upcoming(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> ApiResult<Vec<Reminder>> {
    let reminders = EventService::new(&state).upcoming_reminders(&user, now(&state)?).await?;
    Ok(ApiResponse::success(reminders))
}

/// GET /api/reminders/due - reminders that fired in the last few minutes
pub async fn due(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> ApiResult<Vec<Reminder>> {
    let reminders = EventService::new(&state).due_reminders(&user, now(&state)?).await?;
    Ok(ApiResponse::success(reminders))
}

/// POST /api/reminders/preferences
pub async fn preferences(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<Event> {
    let event = EventService::new(&state).update_reminder(&user, read_json(&body)?).await?;
    Ok(ApiResponse::success(event))
}
