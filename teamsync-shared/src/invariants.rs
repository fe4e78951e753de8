/// Model invariant checks
///
/// Every mutating operation calls [`check_affected`] on the teams and users
/// it touched right before committing; a failure aborts the transaction.
/// [`audit`] runs the same checks over the whole store and is what tests
/// and the reconciliation job use.
///
/// Checked:
///
/// 1. a team's leader is one of its members, and no member is listed twice
/// 2. a user's cached role matches their leadership (admin is never derived)
/// 3. `team.members` and `user.teams` mirror each other

use std::collections::BTreeSet;

use crate::error::{CoreError, CoreResult};
use crate::models::{Team, TeamId, User, UserId};
use crate::roles::resolve_role;
use crate::store::StoreTx;

fn check_team(team: &Team, members: &[Option<User>]) -> CoreResult<()> {
    team.validate().map_err(CoreError::invariant)?;

    for (member_id, member) in team.members.iter().zip(members) {
        match member {
            Some(user) if user.belongs_to(team.id) => {}
            Some(_) => {
                return Err(CoreError::invariant(format!(
                    "user {} is a member of team {} but does not list it",
                    member_id, team.id
                )))
            }
            None => {
                return Err(CoreError::invariant(format!(
                    "team {} lists missing user {}",
                    team.id, member_id
                )))
            }
        }
    }
    Ok(())
}

fn check_user(user: &User, led: usize, teams: &[Option<Team>]) -> CoreResult<()> {
    let expected = resolve_role(user.role, led);
    if expected != user.role {
        return Err(CoreError::invariant(format!(
            "user {} has role {} but leads {} team(s)",
            user.id, user.role, led
        )));
    }

    for (team_id, team) in user.teams.iter().zip(teams) {
        match team {
            Some(team) if team.is_member(user.id) => {}
            Some(_) => {
                return Err(CoreError::invariant(format!(
                    "user {} lists team {} without being a member",
                    user.id, team_id
                )))
            }
            None => {
                return Err(CoreError::invariant(format!(
                    "user {} lists missing team {}",
                    user.id, team_id
                )))
            }
        }
    }
    Ok(())
}

/// Checks the given teams and users inside `tx`
///
/// Teams that no longer exist are skipped; their absence is validated from
/// the user side.
pub async fn check_affected(tx: &mut dyn StoreTx, teams: &[TeamId], users: &[UserId]) -> CoreResult<()> {
    let teams: BTreeSet<TeamId> = teams.iter().copied().collect();
    let users: BTreeSet<UserId> = users.iter().copied().collect();

    for team_id in teams {
        if let Some(team) = tx.team(team_id).await? {
            let mut members = Vec::with_capacity(team.members.len());
            for member_id in &team.members {
                members.push(tx.user(*member_id).await?);
            }
            check_team(&team, &members)?;
        }
    }

    for user_id in users {
        let Some(user) = tx.user(user_id).await? else {
            continue;
        };
        let led = tx.teams_led_by(user_id).await?.len();
        let mut teams = Vec::with_capacity(user.teams.len());
        for team_id in &user.teams {
            teams.push(tx.team(*team_id).await?);
        }
        check_user(&user, led, &teams)?;
    }

    Ok(())
}

/// Checks every team and user inside `tx`; read only
pub async fn audit(tx: &mut dyn StoreTx) -> CoreResult<()> {
    let teams = tx.teams().await?;
    let users = tx.users().await?;

    let team_ids: Vec<TeamId> = teams.iter().map(|t| t.id).collect();
    let user_ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
    check_affected(tx, &team_ids, &user_ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::{InMemoryStore, Store};

    #[tokio::test]
    async fn test_consistent_state_passes() {
        let store = InMemoryStore::new();
        let mut lead = User::new("Lin", "lin@example.com");
        let mut team = Team::new("core", lead.id);
        team.add_member(lead.id);
        team.leader = Some(lead.id);
        lead.teams.insert(team.id);
        lead.role = Role::TeamLeader;

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&lead).await.unwrap();
        tx.insert_team(&team).await.unwrap();

        assert!(audit(tx.as_mut()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_back_reference_detected() {
        let store = InMemoryStore::new();
        let user = User::new("Ada", "ada@example.com");
        let mut team = Team::new("core", user.id);
        team.add_member(user.id);

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.insert_team(&team).await.unwrap();

        assert!(matches!(
            audit(tx.as_mut()).await,
            Err(CoreError::InvariantViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_leader_outside_members_detected() {
        let store = InMemoryStore::new();
        let mut user = User::new("Ada", "ada@example.com");
        user.role = Role::TeamLeader;
        let mut team = Team::new("core", user.id);
        team.leader = Some(user.id);

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.insert_team(&team).await.unwrap();

        let err = check_affected(tx.as_mut(), &[team.id], &[]).await.unwrap_err();
        assert!(err.to_string().contains("is not a member"));
    }
}
