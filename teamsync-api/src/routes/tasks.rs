/// Task endpoints

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use teamsync_shared::{
    auth::middleware::AuthContext,
    models::{NewTask, Task, TaskChanges, TaskId, TaskStatus, TeamId, UserId},
};
use validator::Validate;

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    pub assigned_to: BTreeSet<UserId>,

    #[serde(default)]
    pub teams: BTreeSet<TeamId>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(req: CreateTaskRequest) -> Self {
        NewTask {
            title: req.title,
            description: req.description,
            deadline: req.deadline,
            assigned_to: req.assigned_to,
            teams: req.teams,
        }
    }
}

/// Update task request; absent fields are left untouched
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub deadline: Option<DateTime<Utc>>,

    pub status: Option<TaskStatus>,

    pub assigned_to: Option<BTreeSet<UserId>>,

    pub teams: Option<BTreeSet<TeamId>>,
}

impl From<UpdateTaskRequest> for TaskChanges {
    fn from(req: UpdateTaskRequest) -> Self {
        TaskChanges {
            title: req.title,
            description: req.description,
            deadline: req.deadline,
            status: req.status,
            assigned_to: req.assigned_to,
            teams: req.teams,
        }
    }
}

/// Tasks visible to the caller
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.core.tasks.list_tasks(auth.user_id).await?))
}

/// Creates a task
///
/// # Errors
///
/// - `403 Forbidden`: Caller may not assign these users or teams
/// - `404 Not Found`: Unknown assignee or team
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    let task = state.core.tasks.create_task(auth.user_id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// One task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.core.tasks.get_task(auth.user_id, task_id).await?))
}

/// Partially updates a task
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;

    let task = state
        .core
        .tasks
        .update_task(auth.user_id, task_id, req.into())
        .await?;
    Ok(Json(task))
}

/// Deletes a task
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<StatusCode> {
    state.core.tasks.delete_task(auth.user_id, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
