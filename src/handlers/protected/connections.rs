use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
};
use serde_json::{json, Value};

use crate::database::models::{ConnectionRequest, FamilyConnection};
use crate::handlers::{parse_id, read_json};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::connection_service::{ConnectionOverview, DisconnectSummary, SharingSettings};
use crate::services::ConnectionService;
use crate::state::AppState;

/// GET /api/connections - connected families and pending requests
pub async fn overview(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<ConnectionOverview> {
    Ok(ApiResponse::success(ConnectionService::new(&state).overview(&user).await?))
}

/// POST /api/connections/request - `{family_code}`
pub async fn request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<ConnectionRequest> {
    let request = ConnectionService::new(&state).request(&user, read_json(&body)?).await?;
    Ok(ApiResponse::created(request))
}

/// POST /api/connections/requests/:id/accept
pub async fn accept(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<FamilyConnection> {
    let id = parse_id(&id, "request id")?;
    Ok(ApiResponse::success(ConnectionService::new(&state).accept(&user, id).await?))
}

/// POST /api/connections/requests/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id, "request id")?;
    ConnectionService::new(&state).reject(&user, id).await?;
    Ok(ApiResponse::success(json!({ "request_id": id, "status": "rejected" })))
}

/// POST /api/connections/requests/:id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id, "request id")?;
    ConnectionService::new(&state).cancel(&user, id).await?;
    Ok(ApiResponse::success(json!({ "request_id": id, "status": "cancelled" })))
}

/// DELETE /api/connections/families/:family_id
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(family_id): Path<String>,
) -> ApiResult<DisconnectSummary> {
    let other = parse_id(&family_id, "family id")?;
    Ok(ApiResponse::success(ConnectionService::new(&state).disconnect(&user, other).await?))
}

/// GET /api/connections/families/:family_id/settings
pub async fn settings_get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(family_id): Path<String>,
) -> ApiResult<SharingSettings> {
    let other = parse_id(&family_id, "family id")?;
    Ok(ApiResponse::success(ConnectionService::new(&state).get_settings(&user, other).await?))
}

/// PUT /api/connections/families/:family_id/settings - `{features}`
pub async fn settings_put(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(family_id): Path<String>,
    body: Bytes,
) -> ApiResult<SharingSettings> {
    let other = parse_id(&family_id, "family id")?;
    let settings = ConnectionService::new(&state)
        .set_settings(&user, other, read_json(&body)?)
        .await?;
    Ok(ApiResponse::success(settings))
}
