/// Role Transition Engine
///
/// A user's role is cached on the user row but is fully determined by two
/// facts: whether the admin flag was granted, and how many teams the user
/// leads. [`resolve_role`] is the only place that encodes that rule.
///
/// The engine itself is pure. [`apply_role`] is the thin step that loads
/// the leadership facts from a transaction, asks the engine, and writes the
/// answer back when it differs.
///
/// # Example
///
/// ```
/// use teamsync_shared::models::Role;
/// use teamsync_shared::roles::resolve_role;
///
/// assert_eq!(resolve_role(Role::Member, 1), Role::TeamLeader);
/// assert_eq!(resolve_role(Role::TeamLeader, 0), Role::Member);
/// assert_eq!(resolve_role(Role::Admin, 0), Role::Admin);
/// ```

use serde::Serialize;

use crate::error::CoreResult;
use crate::lookup::require_user;
use crate::models::{Role, UserId};
use crate::store::StoreTx;

/// Role a user should hold given how many teams they lead
///
/// `admin` is sticky and never overridden.
pub fn resolve_role(current: Role, teams_led: usize) -> Role {
    match current {
        Role::Admin => Role::Admin,
        _ if teams_led > 0 => Role::TeamLeader,
        _ => Role::Member,
    }
}

/// Role a user should hold once the admin flag is revoked
pub fn role_without_admin(teams_led: usize) -> Role {
    resolve_role(Role::Member, teams_led)
}

/// A role change produced by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleChange {
    pub user_id: UserId,
    pub from: Role,
    pub to: Role,
}

/// Recomputes and writes one user's role inside `tx`
///
/// Leadership is read from `tx`, so the caller must have written every team
/// change of the current operation before calling this. Returns the change,
/// or `None` when the cached role was already correct.
pub async fn apply_role(tx: &mut dyn StoreTx, user_id: UserId) -> CoreResult<Option<RoleChange>> {
    let mut user = require_user(tx, user_id).await?;
    let led = tx.teams_led_by(user_id).await?.len();
    let role = resolve_role(user.role, led);

    if role == user.role {
        return Ok(None);
    }

    let change = RoleChange {
        user_id,
        from: user.role,
        to: role,
    };
    user.role = role;
    tx.update_user(&user).await?;

    tracing::info!(
        user_id = %user_id,
        from = %change.from,
        to = %change.to,
        teams_led = led,
        "Role changed"
    );

    Ok(Some(change))
}
