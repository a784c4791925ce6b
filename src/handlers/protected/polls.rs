use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
};

use crate::handlers::{parse_id, read_json};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::poll_service::PollResults;
use crate::services::PollService;
use crate::state::AppState;

/// POST /api/polls/:chat_id/vote
pub async fn vote(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(chat_id): Path<String>,
    body: Bytes,
) -> ApiResult<PollResults> {
    let chat_id = parse_id(&chat_id, "chat id")?;
    let results = PollService::new(&state).vote(&user, chat_id, read_json(&body)?).await?;
    Ok(ApiResponse::success(results))
}
