/// Authorization checks relative to the current team structure
///
/// Permissions here are not a static ACL. Whether a team leader may assign
/// a task to someone depends on which teams that leader leads right now, so
/// every check takes the actor as loaded inside the caller's transaction
/// together with the teams the actor leads in that same snapshot.
///
/// # Assignment policy
///
/// [`can_assign`] evaluates, in order:
///
/// 1. no individual candidates: allowed
/// 2. actor is a member: forbidden
/// 3. actor is a team leader: allowed only if every candidate belongs to a
///    team the actor leads
/// 4. actor is an admin: allowed
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
/// use teamsync_shared::auth::authorization::{can_assign, AssignDecision};
/// use teamsync_shared::models::{User, UserId};
///
/// let member = User::new("Uma", "uma@example.com");
/// let candidates: BTreeSet<UserId> = [UserId::new()].into_iter().collect();
///
/// assert!(matches!(can_assign(&member, &candidates, &[]), AssignDecision::Forbidden(_)));
/// assert_eq!(can_assign(&member, &BTreeSet::new(), &[]), AssignDecision::Allowed);
/// ```

use std::collections::BTreeSet;

use crate::error::{CoreError, CoreResult};
use crate::models::{Role, Task, Team, TeamId, User, UserId};
use crate::store::StoreTx;

/// Outcome of an assignment check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignDecision {
    Allowed,
    Forbidden(String),
}

impl AssignDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AssignDecision::Allowed)
    }

    /// Converts a refusal into [`CoreError::Forbidden`]
    pub fn into_result(self) -> CoreResult<()> {
        match self {
            AssignDecision::Allowed => Ok(()),
            AssignDecision::Forbidden(reason) => Err(CoreError::Forbidden(reason)),
        }
    }
}

/// Decides whether `actor` may assign a task to every user in `candidates`
///
/// `led_teams` must be the teams `actor` currently leads.
pub fn can_assign(actor: &User, candidates: &BTreeSet<UserId>, led_teams: &[Team]) -> AssignDecision {
    if candidates.is_empty() {
        return AssignDecision::Allowed;
    }

    match actor.role {
        Role::Member => AssignDecision::Forbidden(
            "Members may not assign tasks to individual users".to_string(),
        ),
        Role::TeamLeader => {
            let managed = candidates
                .iter()
                .all(|candidate| led_teams.iter().any(|team| team.is_member(*candidate)));
            if managed {
                AssignDecision::Allowed
            } else {
                AssignDecision::Forbidden("outside managed teams".to_string())
            }
        }
        Role::Admin => AssignDecision::Allowed,
    }
}

/// Loads the actor's led teams from `tx` and applies [`can_assign`]
pub async fn check_can_assign(
    tx: &mut dyn StoreTx,
    actor: &User,
    candidates: &BTreeSet<UserId>,
) -> CoreResult<()> {
    if candidates.is_empty() || actor.role.is_admin() {
        return Ok(());
    }
    let led = tx.teams_led_by(actor.id).await?;
    can_assign(actor, candidates, &led).into_result()
}

/// Non-admins may only attach tasks to teams they belong to
pub fn check_team_reference(actor: &User, teams: &BTreeSet<TeamId>) -> CoreResult<()> {
    if actor.role.is_admin() {
        return Ok(());
    }
    match teams.iter().find(|team_id| !actor.belongs_to(**team_id)) {
        Some(team_id) => Err(CoreError::Forbidden(format!(
            "You are not a member of team {}",
            team_id
        ))),
        None => Ok(()),
    }
}

fn leads_any(task: &Task, led_teams: &[TeamId]) -> bool {
    led_teams.iter().any(|team_id| task.teams.contains(team_id))
}

/// Creator, any assignee, leader of an assigned team, or admin
pub fn can_modify_task(actor: &User, task: &Task, led_teams: &[TeamId]) -> bool {
    actor.role.is_admin()
        || task.created_by == actor.id
        || task.assigned_to.contains(&actor.id)
        || leads_any(task, led_teams)
}

/// Creator, leader of an assigned team, or admin
pub fn can_delete_task(actor: &User, task: &Task, led_teams: &[TeamId]) -> bool {
    actor.role.is_admin() || task.created_by == actor.id || leads_any(task, led_teams)
}

/// Creator, assignee, member of an assigned team, or admin
///
/// Private tasks are visible to their creator and admins only.
pub fn can_view_task(actor: &User, task: &Task) -> bool {
    if actor.role.is_admin() || task.created_by == actor.id {
        return true;
    }
    if task.is_private() {
        return false;
    }
    task.assigned_to.contains(&actor.id) || task.teams.iter().any(|t| actor.belongs_to(*t))
}
