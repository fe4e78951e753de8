/// User endpoints
///
/// - `POST /v1/users` - Register (public)
/// - `GET /v1/users` - Directory with presence
/// - `PUT /v1/admin/users/:id/admin` - Grant or revoke the admin flag

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use teamsync_shared::{
    auth::middleware::AuthContext,
    models::{User, UserId},
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Admin flag request
#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    /// `true` grants, `false` revokes
    pub admin: bool,
}

/// Registers a new member
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Invalid name or email
/// - `409 Conflict`: Email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    req.validate()?;

    let user = state.core.accounts.register(&req.name, &req.email).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Lists every user
pub async fn list_users(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.core.accounts.list_users().await?))
}

/// Grants or revokes the admin flag
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: Unknown user
pub async fn set_admin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<UserId>,
    Json(req): Json<SetAdminRequest>,
) -> ApiResult<Json<User>> {
    let user = state
        .core
        .accounts
        .set_admin(auth.user_id, user_id, req.admin)
        .await?;
    Ok(Json(user))
}
