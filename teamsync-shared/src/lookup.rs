/// Required lookups
///
/// Loads that turn an absent row into `NotFound`, shared by every service.

use crate::error::{CoreError, CoreResult};
use crate::models::{Task, TaskId, Team, TeamId, User, UserId};
use crate::store::StoreTx;

pub(crate) async fn require_user(tx: &mut dyn StoreTx, id: UserId) -> CoreResult<User> {
    tx.user(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("User {} not found", id)))
}

pub(crate) async fn require_team(tx: &mut dyn StoreTx, id: TeamId) -> CoreResult<Team> {
    tx.team(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Team {} not found", id)))
}

pub(crate) async fn require_task(tx: &mut dyn StoreTx, id: TaskId) -> CoreResult<Task> {
    tx.task(id)
        .await?
        .ok_or_else(|| CoreError::NotFound("Task not found".to_string()))
}

/// The acting user, re-read inside the transaction
pub(crate) async fn require_actor(tx: &mut dyn StoreTx, id: UserId) -> CoreResult<User> {
    tx.user(id)
        .await?
        .ok_or_else(|| CoreError::Forbidden("Unknown user".to_string()))
}
