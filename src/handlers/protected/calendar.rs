use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Extension, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::calendar::agenda::Agenda;
use crate::calendar::{CalendarFilters, DisplayEvent};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::CalendarService;
use crate::state::AppState;

pub(crate) fn filters(query: Result<Query<CalendarFilters>, QueryRejection>) -> Result<CalendarFilters, ApiError> {
    query
        .map(|Query(filters)| filters)
        .map_err(|e| ApiError::bad_request(format!("Invalid calendar filters: {}", e.body_text())))
}

/// GET /api/calendar/events - display feed
pub async fn feed(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<CalendarFilters>, QueryRejection>,
) -> ApiResult<Vec<DisplayEvent>> {
    let filters = filters(query)?;
    let feed = CalendarService::new(&state).feed(&user, &filters).await?;
    Ok(ApiResponse::success(feed))
}

/// GET /api/calendar/agenda - printable, day-grouped view
pub async fn agenda(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<CalendarFilters>, QueryRejection>,
) -> ApiResult<Agenda> {
    let filters = filters(query)?;
    let agenda = CalendarService::new(&state).agenda(&user, &filters).await?;
    Ok(ApiResponse::success(agenda))
}

/// GET /api/calendar/export - `.ics` download
pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<CalendarFilters>, QueryRejection>,
) -> Result<Response, ApiError> {
    let filters = filters(query)?;
    let export = CalendarService::new(&state).export(&user, &filters).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename={}", export.filename)),
        ],
        export.body,
    )
        .into_response())
}

/// POST /api/calendar/import - body is the `.ics` text
pub async fn import(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<Value> {
    let text = std::str::from_utf8(&body).map_err(|_| ApiError::bad_request("Calendar file must be UTF-8 text"))?;
    if text.trim().is_empty() {
        return Err(ApiError::field_required("file"));
    }
    let imported = CalendarService::new(&state).import(&user, text).await?;
    Ok(ApiResponse::created(json!({ "imported": imported })))
}
