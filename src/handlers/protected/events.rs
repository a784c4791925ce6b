use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
};

use crate::calendar::time;
use crate::database::models::Event;
use crate::handlers::read_json;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::event_service::{EventDetail, MovedEvent, RsvpView};
use crate::services::EventService;
use crate::state::AppState;

/// POST /api/events
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<Event> {
    let event = EventService::new(&state).create(&user, read_json(&body)?).await?;
    Ok(ApiResponse::created(event))
}

/// GET /api/events/:id - plain or composite instance id
pub async fn detail(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<EventDetail> {
    Ok(ApiResponse::success(EventService::new(&state).detail(&user, &id).await?))
}

/// PUT /api/events/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Event> {
    let event = EventService::new(&state).update(&user, &id, read_json(&body)?).await?;
    Ok(ApiResponse::success(event))
}

/// DELETE /api/events/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Event> {
    Ok(ApiResponse::success(EventService::new(&state).delete(&user, &id).await?))
}

/// POST /api/events/dates - drag/resize
pub async fn move_dates(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<MovedEvent> {
    let moved = EventService::new(&state).move_dates(&user, read_json(&body)?).await?;
    Ok(ApiResponse::success(moved))
}

/// POST /api/events/rsvp
pub async fn rsvp(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<Vec<RsvpView>> {
    let today = time::today_in(time::resolve_zone(&state.config.calendar.timezone)?);
    let responses = EventService::new(&state).rsvp(&user, read_json(&body)?, today).await?;
    Ok(ApiResponse::success(responses))
}
