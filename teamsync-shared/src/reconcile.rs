/// Drift repair
///
/// Every service keeps the cached fields consistent on its own. This pass
/// exists for data written around the services (manual SQL, restores, old
/// deployments) and is what the worker runs periodically.
///
/// In one transaction it:
///
/// 1. rebuilds every `user.teams` from `team.members`
/// 2. recomputes every cached role from current leadership
/// 3. reports, but does not repair, teams whose leader is not a member
///
/// Roles are written silently; drift is not a user-facing event.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::CoreResult;
use crate::models::{TeamId, UserId};
use crate::roles::{resolve_role, RoleChange};
use crate::store::Store;

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Cached roles that were corrected
    pub roles_fixed: Vec<RoleChange>,

    /// Users whose team set was rebuilt
    pub memberships_fixed: usize,

    /// Problems that need an operator
    pub violations: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.roles_fixed.is_empty() && self.memberships_fixed == 0 && self.violations.is_empty()
    }
}

/// Runs one reconciliation pass over the whole store
pub async fn reconcile(store: &dyn Store) -> CoreResult<ReconcileReport> {
    let mut tx = store.begin().await?;
    let teams = tx.teams().await?;
    let users = tx.users().await?;

    let mut membership: BTreeMap<UserId, BTreeSet<TeamId>> = BTreeMap::new();
    let mut led: BTreeMap<UserId, usize> = BTreeMap::new();
    let mut report = ReconcileReport::default();

    for team in &teams {
        for member in &team.members {
            membership.entry(*member).or_default().insert(team.id);
        }
        if let Some(leader) = team.leader {
            *led.entry(leader).or_default() += 1;
        }
        if let Err(problem) = team.validate() {
            report.violations.push(problem);
        }
    }

    for mut user in users {
        let teams = membership.remove(&user.id).unwrap_or_default();
        let role = resolve_role(user.role, led.get(&user.id).copied().unwrap_or(0));

        let teams_drifted = teams != user.teams;
        let role_drifted = role != user.role;
        if !teams_drifted && !role_drifted {
            continue;
        }

        if teams_drifted {
            tracing::warn!(
                user_id = %user.id,
                cached = user.teams.len(),
                actual = teams.len(),
                "Team membership drift"
            );
            user.teams = teams;
            report.memberships_fixed += 1;
        }
        if role_drifted {
            tracing::warn!(user_id = %user.id, from = %user.role, to = %role, "Role drift");
            report.roles_fixed.push(RoleChange {
                user_id: user.id,
                from: user.role,
                to: role,
            });
            user.role = role;
        }
        tx.update_user(&user).await?;
    }

    for (user_id, teams) in membership {
        report.violations.push(format!(
            "{} team(s) list missing user {}",
            teams.len(),
            user_id
        ));
    }

    for violation in &report.violations {
        tracing::warn!(violation = %violation, "Unrepaired inconsistency");
    }

    tx.commit().await?;
    Ok(report)
}

/// Clears every persisted `is_online` flag
///
/// Presence lives in the API process, so a flag still set when that process
/// starts is left over from a crash or a failed offline write. Returns how
/// many users were reset.
pub async fn reset_presence(store: &dyn Store) -> CoreResult<usize> {
    let mut tx = store.begin().await?;
    let mut reset = 0;
    for mut user in tx.users().await? {
        if user.is_online {
            user.is_online = false;
            tx.update_user(&user).await?;
            reset += 1;
        }
    }
    tx.commit().await?;

    if reset > 0 {
        tracing::warn!(reset, "Cleared stale online flags");
    }
    Ok(reset)
}
