use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
};

use crate::database::models::CalendarTemplate;
use crate::handlers::{parse_id, read_json};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::template_service::AppliedTemplate;
use crate::services::TemplateService;
use crate::state::AppState;

/// GET /api/calendar/templates
pub async fn list(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> ApiResult<Vec<CalendarTemplate>> {
    Ok(ApiResponse::success(TemplateService::new(&state).list(&user).await?))
}

/// POST /api/calendar/templates
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<CalendarTemplate> {
    let template = TemplateService::new(&state).create(&user, read_json(&body)?).await?;
    Ok(ApiResponse::created(template))
}

/// PUT /api/calendar/templates/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<CalendarTemplate> {
    let id = parse_id(&id, "template id")?;
    let template = TemplateService::new(&state).update(&user, id, read_json(&body)?).await?;
    Ok(ApiResponse::success(template))
}

/// DELETE /api/calendar/templates/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<CalendarTemplate> {
    let id = parse_id(&id, "template id")?;
    Ok(ApiResponse::success(TemplateService::new(&state).delete(&user, id).await?))
}

/// GET /api/calendar/templates/:id/apply - prefilled new-event values
pub async fn apply(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<AppliedTemplate> {
    let id = parse_id(&id, "template id")?;
    Ok(ApiResponse::success(TemplateService::new(&state).apply(&user, id).await?))
}
