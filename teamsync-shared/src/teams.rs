/// Team Membership Store
///
/// Owns every mutation of team structure. Each operation is one serializable
/// unit of work that:
///
/// 1. re-reads the actor, the team, and the affected users
/// 2. checks authorization and preconditions
/// 3. writes both sides of the team/user relation
/// 4. recomputes the role of every user whose leadership changed
/// 5. stages notifications for the consequences
/// 6. verifies the invariants of everything it touched, then commits
///
/// Notifications are pushed only after the commit succeeded.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamsync_shared::config::CoreConfig;
/// use teamsync_shared::models::UserId;
/// use teamsync_shared::services::CoreServices;
/// use teamsync_shared::store::InMemoryStore;
///
/// # async fn example(admin: UserId, lead: UserId, dev: UserId) -> Result<(), Box<dyn std::error::Error>> {
/// let core = CoreServices::in_memory(CoreConfig::default());
/// let team = core.teams.create_team(admin, "platform", vec![lead, dev]).await?;
/// assert_eq!(team.leader, Some(lead));
///
/// core.teams.remove_member(admin, team.id, lead).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{DomainEvent, EventKind};
use crate::invariants::check_affected;
use crate::lookup::{require_actor, require_team, require_user};
use crate::models::{Notification, Team, TeamId, User, UserId};
use crate::notifications::NotificationFanout;
use crate::retry::with_retries;
use crate::roles::{apply_role, RoleChange};
use crate::store::{Store, StoreError, StoreTx};

/// Team mutations and queries
#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn Store>,
    fanout: NotificationFanout,
    config: CoreConfig,
}

fn require_manager(actor: &User, team: &Team) -> CoreResult<()> {
    if actor.role.is_admin() || team.is_led_by(actor.id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only an admin or the team leader can manage this team".to_string(),
        ))
    }
}

fn require_admin(actor: &User, action: &str) -> CoreResult<()> {
    if actor.role.is_admin() {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!("Only admins can {}", action)))
    }
}

fn role_events(actor: UserId, changes: impl IntoIterator<Item = RoleChange>) -> Vec<DomainEvent> {
    changes
        .into_iter()
        .map(|change| {
            DomainEvent::new(
                actor,
                EventKind::RoleChanged {
                    user_id: change.user_id,
                    role: change.to,
                },
            )
        })
        .collect()
}

impl TeamService {
    pub fn new(store: Arc<dyn Store>, fanout: NotificationFanout, config: CoreConfig) -> Self {
        Self {
            store,
            fanout,
            config,
        }
    }

    /// Creates a team; the first initial member becomes its leader
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is an admin
    /// - `Conflict` if the name is taken
    /// - `NotFound` if an initial member does not exist
    pub async fn create_team(
        &self,
        actor: UserId,
        name: &str,
        initial_members: Vec<UserId>,
    ) -> CoreResult<Team> {
        let members = &initial_members;
        let (team, staged) = with_retries(self.config.max_attempts, "create_team", move || {
            self.create_team_once(actor, name, members)
        })
        .await?;

        tracing::info!(
            team_id = %team.id,
            name = %team.name,
            members = team.members.len(),
            leader = ?team.leader.map(|l| l.to_string()),
            "Team created"
        );
        self.fanout.deliver(&staged);
        Ok(team)
    }

    async fn create_team_once(
        &self,
        actor_id: UserId,
        name: &str,
        initial_members: &[UserId],
    ) -> CoreResult<(Team, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        require_admin(&actor, "create teams")?;

        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Conflict("Team name must not be empty".to_string()));
        }
        if tx.team_by_name(name).await?.is_some() {
            return Err(CoreError::Conflict("Team name already taken".to_string()));
        }

        let mut team = Team::new(name, actor.id);
        let mut users = Vec::with_capacity(initial_members.len());
        for member_id in initial_members {
            if team.add_member(*member_id) {
                users.push(require_user(tx.as_mut(), *member_id).await?);
            }
        }
        team.leader = team.members.first().copied();

        tx.insert_team(&team).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => CoreError::Conflict("Team name already taken".to_string()),
            other => other.into(),
        })?;
        for user in &mut users {
            user.teams.insert(team.id);
            tx.update_user(user).await?;
        }

        let mut events: Vec<DomainEvent> = team
            .members
            .iter()
            .map(|member_id| {
                DomainEvent::new(
                    actor.id,
                    EventKind::MemberAdded {
                        team_id: team.id,
                        team_name: team.name.clone(),
                        user_id: *member_id,
                    },
                )
            })
            .collect();
        if let Some(leader) = team.leader {
            events.extend(role_events(actor.id, apply_role(tx.as_mut(), leader).await?));
        }

        let staged = self.fanout.stage_all(tx.as_mut(), &events).await?;
        check_affected(tx.as_mut(), &[team.id], &team.members).await?;
        tx.commit().await?;
        Ok((team, staged))
    }

    /// Adds a user to a team
    ///
    /// # Errors
    ///
    /// - `NotFound` if the team or user does not exist
    /// - `Forbidden` unless the actor is an admin or the team's leader
    /// - `Conflict` if the user already is a member
    pub async fn add_member(&self, actor: UserId, team_id: TeamId, user_id: UserId) -> CoreResult<Team> {
        let (team, staged) = with_retries(self.config.max_attempts, "add_member", move || {
            self.add_member_once(actor, team_id, user_id)
        })
        .await?;

        tracing::info!(team_id = %team_id, user_id = %user_id, actor = %actor, "Member added");
        self.fanout.deliver(&staged);
        Ok(team)
    }

    async fn add_member_once(
        &self,
        actor_id: UserId,
        team_id: TeamId,
        user_id: UserId,
    ) -> CoreResult<(Team, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let mut team = require_team(tx.as_mut(), team_id).await?;
        let mut user = require_user(tx.as_mut(), user_id).await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        require_manager(&actor, &team)?;

        if !team.add_member(user_id) {
            return Err(CoreError::Conflict(
                "User is already a member of this team".to_string(),
            ));
        }
        user.teams.insert(team_id);
        tx.update_team(&team).await?;
        tx.update_user(&user).await?;

        let event = DomainEvent::new(
            actor.id,
            EventKind::MemberAdded {
                team_id,
                team_name: team.name.clone(),
                user_id,
            },
        );
        let staged = self.fanout.stage(tx.as_mut(), &event).await?;

        check_affected(tx.as_mut(), &[team_id], &[user_id]).await?;
        tx.commit().await?;
        Ok((team, staged))
    }

    /// Removes a user from a team, handing leadership on if needed
    ///
    /// When the leader leaves, the successor is chosen by the configured
    /// [`LeaderSuccession`](crate::config::LeaderSuccession) policy; an empty
    /// team is left without a leader.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the team or user does not exist
    /// - `Forbidden` unless the actor is an admin or the team's leader
    /// - `Conflict` if the user is the owner or not a member
    pub async fn remove_member(&self, actor: UserId, team_id: TeamId, user_id: UserId) -> CoreResult<Team> {
        let (team, staged) = with_retries(self.config.max_attempts, "remove_member", move || {
            self.remove_member_once(actor, team_id, user_id)
        })
        .await?;

        tracing::info!(
            team_id = %team_id,
            user_id = %user_id,
            actor = %actor,
            leader = ?team.leader.map(|l| l.to_string()),
            "Member removed"
        );
        self.fanout.deliver(&staged);
        Ok(team)
    }

    async fn remove_member_once(
        &self,
        actor_id: UserId,
        team_id: TeamId,
        user_id: UserId,
    ) -> CoreResult<(Team, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let mut team = require_team(tx.as_mut(), team_id).await?;
        let user = require_user(tx.as_mut(), user_id).await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        require_manager(&actor, &team)?;

        if team.owner == user_id {
            return Err(CoreError::Conflict(
                "The team owner cannot be removed from the team".to_string(),
            ));
        }

        let (events, affected) = self.detach_member(tx.as_mut(), &mut team, user, actor.id).await?;

        let staged = self.fanout.stage_all(tx.as_mut(), &events).await?;
        check_affected(tx.as_mut(), &[team_id], &affected).await?;
        tx.commit().await?;
        Ok((team, staged))
    }

    /// Lets a member leave a team on their own
    ///
    /// Follows the same succession rules as [`TeamService::remove_member`].
    ///
    /// # Errors
    ///
    /// - `NotFound` if the team does not exist
    /// - `Conflict` if the actor is not a member or owns the team
    pub async fn leave_team(&self, actor: UserId, team_id: TeamId) -> CoreResult<Team> {
        let (team, staged) = with_retries(self.config.max_attempts, "leave_team", move || {
            self.leave_team_once(actor, team_id)
        })
        .await?;

        tracing::info!(
            team_id = %team_id,
            user_id = %actor,
            leader = ?team.leader.map(|l| l.to_string()),
            "Member left team"
        );
        self.fanout.deliver(&staged);
        Ok(team)
    }

    async fn leave_team_once(
        &self,
        actor_id: UserId,
        team_id: TeamId,
    ) -> CoreResult<(Team, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let mut team = require_team(tx.as_mut(), team_id).await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;

        if !team.is_member(actor.id) {
            return Err(CoreError::Conflict(
                "You are not a member of this team".to_string(),
            ));
        }
        if team.owner == actor.id {
            return Err(CoreError::Conflict(
                "The team owner cannot leave the team".to_string(),
            ));
        }

        let (events, affected) = self.detach_member(tx.as_mut(), &mut team, actor, actor_id).await?;

        let staged = self.fanout.stage_all(tx.as_mut(), &events).await?;
        check_affected(tx.as_mut(), &[team_id], &affected).await?;
        tx.commit().await?;
        Ok((team, staged))
    }

    /// Takes `user` out of `team` on both sides of the relation
    ///
    /// Returns the events to stage and the users whose state changed.
    async fn detach_member(
        &self,
        tx: &mut dyn StoreTx,
        team: &mut Team,
        mut user: User,
        actor_id: UserId,
    ) -> CoreResult<(Vec<DomainEvent>, Vec<UserId>)> {
        let was_leader = team.is_led_by(user.id);
        if !team.remove_member(user.id) {
            return Err(CoreError::Conflict(
                "User is not a member of this team".to_string(),
            ));
        }

        let successor = if was_leader {
            self.config.leader_succession.pick(team)
        } else {
            None
        };
        if was_leader {
            team.leader = successor;
        }

        user.teams.remove(&team.id);
        tx.update_team(team).await?;
        tx.update_user(&user).await?;

        let mut events = vec![DomainEvent::new(
            actor_id,
            EventKind::MemberRemoved {
                team_id: team.id,
                team_name: team.name.clone(),
                user_id: user.id,
            },
        )];
        let mut affected = vec![user.id];
        if was_leader {
            events.extend(role_events(actor_id, apply_role(tx, user.id).await?));
            if let Some(successor) = successor {
                tracing::info!(team_id = %team.id, leader = %successor, "Leadership passed on");
                events.extend(role_events(actor_id, apply_role(tx, successor).await?));
                affected.push(successor);
            }
        }
        Ok((events, affected))
    }

    /// Makes a current member the team's leader
    ///
    /// Reassigning the current leader is a no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the team or user does not exist
    /// - `Forbidden` unless the actor is an admin or the team's leader
    /// - `Conflict` if the user is not a member
    pub async fn assign_leader(&self, actor: UserId, team_id: TeamId, user_id: UserId) -> CoreResult<Team> {
        let (team, staged) = with_retries(self.config.max_attempts, "assign_leader", move || {
            self.assign_leader_once(actor, team_id, user_id)
        })
        .await?;

        self.fanout.deliver(&staged);
        Ok(team)
    }

    async fn assign_leader_once(
        &self,
        actor_id: UserId,
        team_id: TeamId,
        user_id: UserId,
    ) -> CoreResult<(Team, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let mut team = require_team(tx.as_mut(), team_id).await?;
        require_user(tx.as_mut(), user_id).await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        require_manager(&actor, &team)?;

        if !team.is_member(user_id) {
            return Err(CoreError::Conflict(
                "Only a current member can lead the team".to_string(),
            ));
        }
        if team.is_led_by(user_id) {
            return Ok((team, Vec::new()));
        }

        let previous = team.leader.replace(user_id);
        tx.update_team(&team).await?;

        let mut changes = Vec::new();
        let mut affected = vec![user_id];
        if let Some(previous) = previous {
            changes.extend(apply_role(tx.as_mut(), previous).await?);
            affected.push(previous);
        }
        changes.extend(apply_role(tx.as_mut(), user_id).await?);

        tracing::info!(
            team_id = %team_id,
            leader = %user_id,
            previous = ?previous.map(|p| p.to_string()),
            "Leader assigned"
        );

        let staged = self
            .fanout
            .stage_all(tx.as_mut(), &role_events(actor.id, changes))
            .await?;
        check_affected(tx.as_mut(), &[team_id], &affected).await?;
        tx.commit().await?;
        Ok((team, staged))
    }

    /// Deletes a team and cascades
    ///
    /// In one transaction: demotes the leader if this was their only team,
    /// removes the team from every member, deletes tasks whose only audience
    /// was this team, and deletes the team.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is an admin
    /// - `NotFound` if the team does not exist
    pub async fn delete_team(&self, actor: UserId, team_id: TeamId) -> CoreResult<()> {
        let (orphans, staged) = with_retries(self.config.max_attempts, "delete_team", move || {
            self.delete_team_once(actor, team_id)
        })
        .await?;

        tracing::info!(team_id = %team_id, actor = %actor, orphans_deleted = orphans, "Team deleted");
        self.fanout.deliver(&staged);
        Ok(())
    }

    async fn delete_team_once(&self, actor_id: UserId, team_id: TeamId) -> CoreResult<(usize, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        require_admin(&actor, "delete teams")?;
        let team = require_team(tx.as_mut(), team_id).await?;

        for member_id in &team.members {
            if let Some(mut member) = tx.user(*member_id).await? {
                member.teams.remove(&team_id);
                tx.update_user(&member).await?;
            }
        }

        let mut orphans = 0;
        for task in tx.tasks_for_team(team_id).await? {
            if task.is_orphaned_by(team_id) {
                tracing::debug!(task_id = %task.id, team_id = %team_id, "Deleting orphaned task");
                tx.delete_task(task.id).await?;
                orphans += 1;
            }
        }

        tx.delete_team(team_id).await?;

        let mut events = Vec::new();
        if let Some(leader) = team.leader {
            events.extend(role_events(actor.id, apply_role(tx.as_mut(), leader).await?));
        }

        let staged = self.fanout.stage_all(tx.as_mut(), &events).await?;
        check_affected(tx.as_mut(), &[], &team.members).await?;
        tx.commit().await?;
        Ok((orphans, staged))
    }

    /// Teams the actor belongs to, by name
    pub async fn teams_for(&self, actor: UserId) -> CoreResult<Vec<Team>> {
        with_retries(self.config.max_attempts, "teams_for", move || async move {
            let mut tx = self.store.begin().await?;
            let user = require_actor(tx.as_mut(), actor).await?;
            let mut teams = Vec::with_capacity(user.teams.len());
            for team_id in &user.teams {
                if let Some(team) = tx.team(*team_id).await? {
                    teams.push(team);
                }
            }
            teams.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(teams)
        })
        .await
    }

    /// Every team; admin only
    pub async fn all_teams(&self, actor: UserId) -> CoreResult<Vec<Team>> {
        with_retries(self.config.max_attempts, "all_teams", move || async move {
            let mut tx = self.store.begin().await?;
            let user = require_actor(tx.as_mut(), actor).await?;
            require_admin(&user, "list all teams")?;
            let mut teams = tx.teams().await?;
            teams.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(teams)
        })
        .await
    }

    /// Loads a single team visible to the actor
    pub async fn team(&self, actor: UserId, team_id: TeamId) -> CoreResult<Team> {
        with_retries(self.config.max_attempts, "team", move || async move {
            let mut tx = self.store.begin().await?;
            let user = require_actor(tx.as_mut(), actor).await?;
            let team = require_team(tx.as_mut(), team_id).await?;
            if !user.role.is_admin() && !team.is_member(actor) {
                return Err(CoreError::Forbidden("Not a member of this team".to_string()));
            }
            Ok(team)
        })
        .await
    }
}

