use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;

/// The signed-in user as stored, confirmed to belong to the family in the token
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub family_id: Uuid,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(crate::database::models::user::ADMIN_ROLE)
    }

    /// Creator of a record, or an Admin of the family that owns it
    pub fn can_edit(&self, owner_family: Uuid, created_by: Uuid) -> bool {
        owner_family == self.family_id && (created_by == self.id || self.is_admin())
    }
}

/// Loads the user named by the token and checks its family membership
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let user = state
        .repo::<User>()
        .select_id(auth_user.user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("User validation failed: user '{}' ({}) not found", auth_user.username, auth_user.user_id);
            ApiError::unauthorized("User no longer exists")
        })?;

    if user.family_id != Some(auth_user.family_id) {
        tracing::warn!(
            "User validation failed: '{}' is not a member of family {}",
            user.username,
            auth_user.family_id
        );
        return Err(ApiError::forbidden("User is not a member of this family"));
    }

    let current = CurrentUser {
        id: user.id,
        username: user.username,
        email: user.email,
        role: user.role,
        family_id: auth_user.family_id,
    };
    tracing::debug!("Validated user {} ({}) in family {}", current.username, current.id, current.family_id);

    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}
