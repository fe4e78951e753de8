/// Team endpoints
///
/// Thin adapters over [`TeamService`](teamsync_shared::teams::TeamService);
/// every authorization decision is made by the core.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use teamsync_shared::{
    auth::middleware::AuthContext,
    models::{Team, TeamId, UserId},
};
use validator::Validate;

/// Create team request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    /// Unique team name
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    /// Initial members; the first one becomes leader
    #[serde(default)]
    pub members: Vec<UserId>,
}

/// Request naming one user
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user_id: UserId,
}

/// Teams the caller belongs to
pub async fn list_my_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(state.core.teams.teams_for(auth.user_id).await?))
}

/// Every team (admin)
pub async fn list_all_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(state.core.teams.all_teams(auth.user_id).await?))
}

/// Creates a team (admin)
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    req.validate()?;

    let team = state
        .core
        .teams
        .create_team(auth.user_id, &req.name, req.members)
        .await?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// One team the caller belongs to
pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<Json<Team>> {
    Ok(Json(state.core.teams.team(auth.user_id, team_id).await?))
}

/// Deletes a team and its orphaned tasks (admin)
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<StatusCode> {
    state.core.teams.delete_team(auth.user_id, team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Adds a member (admin or team leader)
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<TeamId>,
    Json(req): Json<UserRequest>,
) -> ApiResult<Json<Team>> {
    let team = state
        .core
        .teams
        .add_member(auth.user_id, team_id, req.user_id)
        .await?;
    Ok(Json(team))
}

/// Removes a member (admin or team leader)
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((team_id, user_id)): Path<(TeamId, UserId)>,
) -> ApiResult<Json<Team>> {
    let team = state
        .core
        .teams
        .remove_member(auth.user_id, team_id, user_id)
        .await?;
    Ok(Json(team))
}

/// Leaves a team as the caller
pub async fn leave_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<Json<Team>> {
    Ok(Json(state.core.teams.leave_team(auth.user_id, team_id).await?))
}

/// Hands leadership to a member (admin or team leader)
pub async fn assign_leader(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<TeamId>,
    Json(req): Json<UserRequest>,
) -> ApiResult<Json<Team>> {
    let team = state
        .core
        .teams
        .assign_leader(auth.user_id, team_id, req.user_id)
        .await?;
    Ok(Json(team))
}
