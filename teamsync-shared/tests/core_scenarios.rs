/// End-to-end behavior of the core services over the in-memory store
///
/// Every test finishes with a full invariant audit so that no sequence of
/// operations may leave the model inconsistent.

use std::collections::BTreeSet;
use std::sync::Arc;

use teamsync_shared::config::{CoreConfig, LeaderSuccession};
use teamsync_shared::error::CoreError;
use teamsync_shared::invariants::audit;
use teamsync_shared::models::{NewTask, Role, TaskChanges, TaskStatus, User, UserId};
use teamsync_shared::presence::{Rooms, ServerMessage};
use teamsync_shared::services::CoreServices;
use teamsync_shared::store::{InMemoryStore, Store};
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    core: CoreServices,
    rooms: Arc<Rooms>,
    admin: User,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(CoreConfig::default()).await
    }

    async fn with_config(config: CoreConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let rooms = Arc::new(Rooms::new());
        let core = CoreServices::new(store.clone(), rooms.clone(), config);

        let admin = User::new_admin("Root", "root@example.com");
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&admin).await.unwrap();
        tx.commit().await.unwrap();

        Self { core, rooms, admin }
    }

    async fn user(&self, name: &str) -> User {
        self.core
            .accounts
            .register(name, &format!("{}@example.com", name.to_lowercase()))
            .await
            .unwrap()
    }

    async fn role_of(&self, user: UserId) -> Role {
        self.core.accounts.get_user(user).await.unwrap().role
    }

    async fn connect(&self, user: UserId) -> UnboundedReceiver<String> {
        let (connection, outbound) = self.rooms.attach();
        self.core.presence.on_connect(connection, user).await.unwrap();
        outbound
    }

    async fn assert_consistent(&self) {
        let mut tx = self.core.store.begin().await.unwrap();
        audit(tx.as_mut()).await.expect("invariants must hold");
    }
}

fn drain(outbound: &mut UnboundedReceiver<String>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(raw) = outbound.try_recv() {
        messages.push(serde_json::from_str(&raw).unwrap());
    }
    messages
}

fn notifications(messages: &[ServerMessage]) -> usize {
    messages
        .iter()
        .filter(|m| matches!(m, ServerMessage::NewNotification(_)))
        .count()
}

fn set(ids: &[UserId]) -> BTreeSet<UserId> {
    ids.iter().copied().collect()
}

#[tokio::test]
async fn test_removing_leader_hands_leadership_on() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;

    let team = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, b.id, c.id])
        .await
        .unwrap();
    assert_eq!(team.leader, Some(a.id));
    assert_eq!(h.role_of(a.id).await, Role::TeamLeader);

    let team = h.core.teams.remove_member(h.admin.id, team.id, a.id).await.unwrap();

    let expected = *[b.id, c.id].iter().min().unwrap();
    assert_eq!(team.leader, Some(expected));
    assert!(!team.is_member(a.id));
    assert_eq!(h.role_of(a.id).await, Role::Member);
    assert_eq!(h.role_of(expected).await, Role::TeamLeader);
    assert!(!h.core.accounts.get_user(a.id).await.unwrap().belongs_to(team.id));
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_join_order_succession() {
    let config = CoreConfig {
        leader_succession: LeaderSuccession::JoinOrder,
        ..Default::default()
    };
    let h = Harness::with_config(config).await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;

    let team = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, c.id, b.id])
        .await
        .unwrap();
    let team = h.core.teams.remove_member(h.admin.id, team.id, a.id).await.unwrap();

    assert_eq!(team.leader, Some(c.id));
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_removing_last_member_leaves_team_leaderless() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;

    let team = h.core.teams.create_team(h.admin.id, "solo", vec![a.id]).await.unwrap();
    let team = h.core.teams.remove_member(h.admin.id, team.id, a.id).await.unwrap();

    assert!(team.members.is_empty());
    assert_eq!(team.leader, None);
    assert_eq!(h.role_of(a.id).await, Role::Member);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_member_cannot_assign_individuals() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    h.core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, b.id])
        .await
        .unwrap();

    let err = h
        .core
        .tasks
        .create_task(
            b.id,
            NewTask {
                title: "Ship it".to_string(),
                assigned_to: set(&[a.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Forbidden(_)));
    assert!(h.core.tasks.list_tasks(h.admin.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_leader_limited_to_managed_teams() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let outsider = h.user("Oscar").await;
    h.core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, b.id])
        .await
        .unwrap();

    let inside = NewTask {
        title: "Review".to_string(),
        assigned_to: set(&[b.id]),
        ..Default::default()
    };
    assert!(h.core.tasks.create_task(a.id, inside).await.is_ok());

    let outside = NewTask {
        title: "Review".to_string(),
        assigned_to: set(&[b.id, outsider.id]),
        ..Default::default()
    };
    let err = h.core.tasks.create_task(a.id, outside).await.unwrap_err();
    assert_eq!(err.to_string(), "outside managed teams");
}

#[tokio::test]
async fn test_team_task_notifies_members_except_creator() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;
    let team = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, b.id, c.id])
        .await
        .unwrap();

    let mut a_out = h.connect(a.id).await;
    let mut b_out = h.connect(b.id).await;
    let before_a = h.core.inbox.list(a.id).await.unwrap().len();
    let before_b = h.core.inbox.list(b.id).await.unwrap().len();
    let before_c = h.core.inbox.list(c.id).await.unwrap().len();
    drain(&mut a_out);
    drain(&mut b_out);

    let task = h
        .core
        .tasks
        .create_task(
            a.id,
            NewTask {
                title: "Plan sprint".to_string(),
                teams: [team.id].into_iter().collect(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let b_inbox = h.core.inbox.list(b.id).await.unwrap();
    let c_inbox = h.core.inbox.list(c.id).await.unwrap();
    assert_eq!(h.core.inbox.list(a.id).await.unwrap().len(), before_a);
    assert_eq!(b_inbox.len(), before_b + 1);
    assert_eq!(c_inbox.len(), before_c + 1);
    assert_eq!(b_inbox[0].kind.related_task(), Some(task.id));
    assert_eq!(
        b_inbox[0].message,
        "You have been assigned to a new task: \"Plan sprint\" by Alice."
    );

    assert_eq!(notifications(&drain(&mut b_out)), 1);
    assert_eq!(notifications(&drain(&mut a_out)), 0);
}

#[tokio::test]
async fn test_delete_team_demotes_and_removes_orphans() {
    let h = Harness::new().await;
    let l = h.user("Lin").await;
    let m = h.user("Max").await;
    let team = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![l.id, m.id])
        .await
        .unwrap();
    assert_eq!(h.role_of(l.id).await, Role::TeamLeader);

    let orphan = h
        .core
        .tasks
        .create_task(
            l.id,
            NewTask {
                title: "Team only".to_string(),
                teams: [team.id].into_iter().collect(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let kept = h
        .core
        .tasks
        .create_task(
            l.id,
            NewTask {
                title: "Also Max".to_string(),
                assigned_to: set(&[m.id]),
                teams: [team.id].into_iter().collect(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.core.teams.delete_team(h.admin.id, team.id).await.unwrap();

    assert_eq!(h.role_of(l.id).await, Role::Member);
    assert!(matches!(
        h.core.tasks.get_task(h.admin.id, orphan.id).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(h.core.tasks.get_task(h.admin.id, kept.id).await.is_ok());
    assert!(h.core.teams.all_teams(h.admin.id).await.unwrap().is_empty());
    assert!(h.core.teams.teams_for(m.id).await.unwrap().is_empty());
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_presence_broadcast_once_per_transition() {
    let h = Harness::new().await;
    let u = h.user("Uma").await;
    let (_observer, mut watch) = h.rooms.attach();

    let (first, _first_out) = h.rooms.attach();
    let (second, _second_out) = h.rooms.attach();

    assert!(h.core.presence.on_connect(first, u.id).await.unwrap());
    assert!(!h.core.presence.on_connect(second, u.id).await.unwrap());
    assert!(h.core.accounts.get_user(u.id).await.unwrap().is_online);

    assert!(!h.core.presence.on_disconnect(first).await.unwrap());
    assert!(h.core.accounts.get_user(u.id).await.unwrap().is_online);
    assert!(h.core.presence.on_disconnect(second).await.unwrap());
    assert!(!h.core.accounts.get_user(u.id).await.unwrap().is_online);

    let changes: Vec<bool> = drain(&mut watch)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::UserStatusChange(p) if p.user_id == u.id => Some(p.is_online),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![true, false]);
}

#[tokio::test]
async fn test_owner_cannot_be_removed() {
    let h = Harness::new().await;
    let team = h
        .core
        .teams
        .create_team(h.admin.id, "ops", vec![h.admin.id])
        .await
        .unwrap();

    let err = h
        .core
        .teams
        .remove_member(h.admin.id, team.id, h.admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_membership_conflicts_and_permissions() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;
    let team = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, b.id])
        .await
        .unwrap();

    let err = h.core.teams.add_member(a.id, team.id, b.id).await.unwrap_err();
    assert_eq!(err.to_string(), "User is already a member of this team");

    let err = h.core.teams.add_member(b.id, team.id, c.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = h.core.teams.remove_member(a.id, team.id, c.id).await.unwrap_err();
    assert_eq!(err.to_string(), "User is not a member of this team");

    let err = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Team name already taken");

    let err = h.core.teams.create_team(a.id, "mine", vec![]).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    h.core.teams.add_member(a.id, team.id, c.id).await.unwrap();
    assert!(h.core.accounts.get_user(c.id).await.unwrap().belongs_to(team.id));
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_assign_leader_moves_roles() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let team = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, b.id])
        .await
        .unwrap();

    let team = h.core.teams.assign_leader(a.id, team.id, b.id).await.unwrap();
    assert_eq!(team.leader, Some(b.id));
    assert_eq!(h.role_of(a.id).await, Role::Member);
    assert_eq!(h.role_of(b.id).await, Role::TeamLeader);

    let b_inbox = h.core.inbox.list(b.id).await.unwrap();
    assert_eq!(b_inbox[0].message, "Your role is now team-leader.");
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_leader_of_two_teams_keeps_role() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let first = h.core.teams.create_team(h.admin.id, "one", vec![a.id, b.id]).await.unwrap();
    h.core.teams.create_team(h.admin.id, "two", vec![a.id]).await.unwrap();

    h.core.teams.remove_member(h.admin.id, first.id, a.id).await.unwrap();
    assert_eq!(h.role_of(a.id).await, Role::TeamLeader);
    assert_eq!(h.role_of(b.id).await, Role::TeamLeader);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_admin_flag_round_trip_respects_leadership() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    h.core.teams.create_team(h.admin.id, "one", vec![a.id]).await.unwrap();

    let granted = h.core.accounts.set_admin(h.admin.id, a.id, true).await.unwrap();
    assert_eq!(granted.role, Role::Admin);
    let revoked = h.core.accounts.set_admin(h.admin.id, a.id, false).await.unwrap();
    assert_eq!(revoked.role, Role::TeamLeader);

    let err = h.core.accounts.set_admin(a.id, a.id, true).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_task_update_notifications() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;
    h.core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, b.id, c.id])
        .await
        .unwrap();

    let task = h
        .core
        .tasks
        .create_task(
            a.id,
            NewTask {
                title: "Write docs".to_string(),
                assigned_to: set(&[b.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let before_b = h.core.inbox.list(b.id).await.unwrap().len();
    let before_c = h.core.inbox.list(c.id).await.unwrap().len();

    h.core
        .tasks
        .update_task(
            a.id,
            task.id,
            TaskChanges {
                status: Some(TaskStatus::Completed),
                assigned_to: Some(set(&[b.id, c.id])),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let b_inbox = h.core.inbox.list(b.id).await.unwrap();
    let c_inbox = h.core.inbox.list(c.id).await.unwrap();
    assert_eq!(c_inbox.len(), before_c + 2);
    let c_kinds: BTreeSet<&str> = c_inbox[..2].iter().map(|n| n.kind.as_str()).collect();
    assert_eq!(c_kinds, BTreeSet::from(["task_assigned", "task_status_changed"]));
    assert!(c_inbox
        .iter()
        .any(|n| n.message == "Alice marked task \"Write docs\" as completed."));
    assert!(b_inbox
        .iter()
        .any(|n| n.message == "Alice marked task \"Write docs\" as completed."));
    assert!(h.core.inbox.list(a.id).await.unwrap().iter().all(|n| n.sender != Some(a.id)));

    let err = h
        .core
        .tasks
        .update_task(
            b.id,
            task.id,
            TaskChanges {
                assigned_to: Some(set(&[b.id, c.id, h.admin.id])),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let ok = h
        .core
        .tasks
        .update_task(
            b.id,
            task.id,
            TaskChanges {
                title: Some("Write better docs".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(ok.is_ok());
    assert_eq!(h.core.inbox.list(b.id).await.unwrap().len(), b_inbox.len());
}

#[tokio::test]
async fn test_private_task_visibility() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;

    let task = h
        .core
        .tasks
        .create_task(
            a.id,
            NewTask {
                title: "Note to self".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(h.core.tasks.get_task(a.id, task.id).await.is_ok());
    assert!(h.core.tasks.get_task(h.admin.id, task.id).await.is_ok());
    assert!(matches!(
        h.core.tasks.get_task(b.id, task.id).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(h.core.tasks.list_tasks(b.id).await.unwrap().is_empty());
    assert!(matches!(
        h.core.tasks.delete_task(b.id, task.id).await,
        Err(CoreError::Forbidden(_))
    ));
    h.core.tasks.delete_task(a.id, task.id).await.unwrap();
}

#[tokio::test]
async fn test_inbox_is_recipient_only() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    h.core.teams.create_team(h.admin.id, "platform", vec![a.id, b.id]).await.unwrap();

    let inbox = h.core.inbox.list(b.id).await.unwrap();
    let note = inbox.first().expect("member added notification");
    assert!(!note.read);

    assert!(matches!(
        h.core.inbox.mark_read(a.id, note.id).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(h.core.inbox.mark_read(b.id, note.id).await.unwrap().read);
    h.core.inbox.delete(b.id, note.id).await.unwrap();
    assert!(matches!(
        h.core.inbox.delete(b.id, note.id).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_membership_changes_stay_consistent() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;
    let d = h.user("Dave").await;
    let team = h.core.teams.create_team(h.admin.id, "platform", vec![a.id, b.id]).await.unwrap();

    let (added_c, added_d, removed_a) = tokio::join!(
        h.core.teams.add_member(h.admin.id, team.id, c.id),
        h.core.teams.add_member(h.admin.id, team.id, d.id),
        h.core.teams.remove_member(h.admin.id, team.id, a.id),
    );
    assert!(added_c.is_ok() && added_d.is_ok() && removed_a.is_ok());

    let team = h.core.teams.team(h.admin.id, team.id).await.unwrap();
    assert_eq!(team.members.len(), 3);
    assert!(team.leader.is_some());
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_register_rejects_duplicates_case_insensitively() {
    let h = Harness::new().await;
    h.user("Alice").await;
    let err = h
        .core
        .accounts
        .register("Alice Again", "ALICE@example.com")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "User already exists");
}

#[tokio::test]
async fn test_team_and_individual_audience_skips_sender() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;
    let team = h.core.teams.create_team(h.admin.id, "platform", vec![a.id, b.id]).await.unwrap();
    h.core.teams.create_team(h.admin.id, "infra", vec![a.id, c.id]).await.unwrap();

    let mut before = Vec::new();
    for id in [a.id, b.id, c.id] {
        before.push(h.core.inbox.list(id).await.unwrap().len());
    }

    h.core
        .tasks
        .create_task(
            a.id,
            NewTask {
                title: "Cut release".to_string(),
                assigned_to: set(&[c.id]),
                teams: [team.id].into_iter().collect(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(h.core.inbox.list(a.id).await.unwrap().len(), before[0]);
    assert_eq!(h.core.inbox.list(b.id).await.unwrap().len(), before[1] + 1);
    assert_eq!(h.core.inbox.list(c.id).await.unwrap().len(), before[2] + 1);
}

#[tokio::test]
async fn test_demoted_leader_loses_assignment_rights() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let team = h.core.teams.create_team(h.admin.id, "platform", vec![a.id, b.id]).await.unwrap();

    let task = || NewTask {
        title: "Review".to_string(),
        assigned_to: set(&[b.id]),
        ..Default::default()
    };
    assert!(h.core.tasks.create_task(a.id, task()).await.is_ok());

    h.core.teams.assign_leader(h.admin.id, team.id, b.id).await.unwrap();
    let err = h.core.tasks.create_task(a.id, task()).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    assert!(h.core.tasks.create_task(h.admin.id, task()).await.is_ok());
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_invariants_hold_after_every_step() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;

    let t1 = h.core.teams.create_team(h.admin.id, "one", vec![a.id, b.id]).await.unwrap();
    h.assert_consistent().await;
    let t2 = h.core.teams.create_team(h.admin.id, "two", vec![b.id]).await.unwrap();
    h.assert_consistent().await;
    h.core.teams.add_member(a.id, t1.id, c.id).await.unwrap();
    h.assert_consistent().await;
    h.core.teams.assign_leader(a.id, t1.id, b.id).await.unwrap();
    h.assert_consistent().await;
    h.core.teams.add_member(b.id, t2.id, a.id).await.unwrap();
    h.assert_consistent().await;
    h.core.teams.remove_member(h.admin.id, t2.id, b.id).await.unwrap();
    h.assert_consistent().await;
    h.core.teams.delete_team(h.admin.id, t1.id).await.unwrap();
    h.assert_consistent().await;

    assert_eq!(h.role_of(a.id).await, Role::TeamLeader);
    assert_eq!(h.role_of(b.id).await, Role::Member);
    assert_eq!(h.role_of(c.id).await, Role::Member);
}

#[tokio::test]
async fn test_leader_leaving_hands_leadership_on() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let b = h.user("Bob").await;
    let c = h.user("Carol").await;
    let team = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![a.id, b.id, c.id])
        .await
        .unwrap();
    let before_a = h.core.inbox.list(a.id).await.unwrap().len();

    let team = h.core.teams.leave_team(a.id, team.id).await.unwrap();

    let expected = *[b.id, c.id].iter().min().unwrap();
    assert!(!team.is_member(a.id));
    assert_eq!(team.leader, Some(expected));
    assert_eq!(h.role_of(a.id).await, Role::Member);
    assert_eq!(h.role_of(expected).await, Role::TeamLeader);
    assert!(!h.core.accounts.get_user(a.id).await.unwrap().belongs_to(team.id));
    assert_eq!(h.core.inbox.list(a.id).await.unwrap().len(), before_a);
    h.assert_consistent().await;

    let other = if expected == b.id { c.id } else { b.id };
    let team = h.core.teams.leave_team(other, team.id).await.unwrap();
    assert_eq!(team.members, vec![expected]);
    assert_eq!(team.leader, Some(expected));
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_leave_team_conflicts() {
    let h = Harness::new().await;
    let a = h.user("Alice").await;
    let outsider = h.user("Oscar").await;
    let team = h
        .core
        .teams
        .create_team(h.admin.id, "platform", vec![h.admin.id, a.id])
        .await
        .unwrap();

    let err = h.core.teams.leave_team(outsider.id, team.id).await.unwrap_err();
    assert_eq!(err.to_string(), "You are not a member of this team");

    let err = h.core.teams.leave_team(h.admin.id, team.id).await.unwrap_err();
    assert_eq!(err.to_string(), "The team owner cannot leave the team");

    let team = h.core.teams.team(h.admin.id, team.id).await.unwrap();
    assert_eq!(team.members.len(), 2);
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_blank_team_name_rejected() {
    let h = Harness::new().await;

    let err = h
        .core
        .teams
        .create_team(h.admin.id, "   ", vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(err.to_string(), "Team name must not be empty");
    h.assert_consistent().await;
}
