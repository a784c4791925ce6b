use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
};
use serde_json::Value;

use crate::database::models::ItemType;
use crate::error::ApiError;
use crate::handlers::{parse_id, read_json};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::sharing_service::ShareOutcome;
use crate::services::SharingService;
use crate::state::AppState;

fn item_type(raw: &str) -> Result<ItemType, ApiError> {
    raw.parse::<ItemType>().map_err(ApiError::bad_request)
}

/// POST /api/connections/share/:item_type/:item_id - `{family_ids}`
pub async fn share(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((kind, item_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<ShareOutcome> {
    let kind = item_type(&kind)?;
    let item_id = parse_id(&item_id, "item id")?;
    let outcome = SharingService::new(&state).share(&user, kind, item_id, read_json(&body)?).await?;
    Ok(ApiResponse::success(outcome))
}

/// DELETE /api/connections/share/:item_type/:item_id - `{family_ids}`
pub async fn unshare(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((kind, item_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<ShareOutcome> {
    let kind = item_type(&kind)?;
    let item_id = parse_id(&item_id, "item id")?;
    let outcome = SharingService::new(&state).unshare(&user, kind, item_id, read_json(&body)?).await?;
    Ok(ApiResponse::success(outcome))
}

/// GET /api/connections/shared/:item_type - items other families shared with us
pub async fn shared_with_me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(kind): Path<String>,
) -> ApiResult<Vec<Value>> {
    let kind = item_type(&kind)?;
    Ok(ApiResponse::success(SharingService::new(&state).shared_with_me(&user, kind).await?))
}
