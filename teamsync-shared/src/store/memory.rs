/// In-memory store
///
/// Backs tests and local development. A transaction holds the whole state
/// behind one async mutex and works on a copy, so commits are atomic and
/// transactions are fully serialized.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreError, StoreResult, StoreTx};
use crate::models::{Notification, NotificationId, Task, TaskId, Team, TeamId, User, UserId};

/// Thread-safe in-memory store
///
/// A transaction holds the single state lock for its whole lifetime and
/// works on a copy; commit swaps the copy in. Transactions are therefore
/// strictly serial and never fail with [`StoreError::Serialization`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    teams: BTreeMap<TeamId, Team>,
    tasks: BTreeMap<TaskId, Task>,
    notifications: BTreeMap<NotificationId, Notification>,
}

impl InMemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn users(&mut self) -> StoreResult<Vec<User>> {
        Ok(self.working.users.values().cloned().collect())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.working.users.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation(format!("users.id {}", user.id)));
        }
        if self
            .working
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::UniqueViolation("users.email".to_string()));
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        if let Some(slot) = self.working.users.get_mut(&user.id) {
            *slot = user.clone();
        }
        Ok(())
    }

    async fn team(&mut self, id: TeamId) -> StoreResult<Option<Team>> {
        Ok(self.working.teams.get(&id).cloned())
    }

    async fn team_by_name(&mut self, name: &str) -> StoreResult<Option<Team>> {
        Ok(self.working.teams.values().find(|t| t.name == name).cloned())
    }

    async fn teams(&mut self) -> StoreResult<Vec<Team>> {
        Ok(self.working.teams.values().cloned().collect())
    }

    async fn teams_led_by(&mut self, user_id: UserId) -> StoreResult<Vec<Team>> {
        Ok(self
            .working
            .teams
            .values()
            .filter(|t| t.is_led_by(user_id))
            .cloned()
            .collect())
    }

    async fn insert_team(&mut self, team: &Team) -> StoreResult<()> {
        if self.working.teams.values().any(|t| t.name == team.name) {
            return Err(StoreError::UniqueViolation("teams.name".to_string()));
        }
        self.working.teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn update_team(&mut self, team: &Team) -> StoreResult<()> {
        if let Some(slot) = self.working.teams.get_mut(&team.id) {
            *slot = team.clone();
        }
        Ok(())
    }

    async fn delete_team(&mut self, id: TeamId) -> StoreResult<()> {
        self.working.teams.remove(&id);
        Ok(())
    }

    async fn task(&mut self, id: TaskId) -> StoreResult<Option<Task>> {
        Ok(self.working.tasks.get(&id).cloned())
    }

    async fn tasks(&mut self) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self.working.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn tasks_for_team(&mut self, team_id: TeamId) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .working
            .tasks
            .values()
            .filter(|t| t.teams.contains(&team_id))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn insert_task(&mut self, task: &Task) -> StoreResult<()> {
        if self.working.tasks.contains_key(&task.id) {
            return Err(StoreError::UniqueViolation(format!("tasks.id {}", task.id)));
        }
        self.working.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn update_task(&mut self, task: &Task) -> StoreResult<()> {
        if let Some(slot) = self.working.tasks.get_mut(&task.id) {
            *slot = task.clone();
        }
        Ok(())
    }

    async fn delete_task(&mut self, id: TaskId) -> StoreResult<()> {
        self.working.tasks.remove(&id);
        Ok(())
    }

    async fn insert_notification(&mut self, notification: &Notification) -> StoreResult<()> {
        self.working
            .notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn notification(&mut self, id: NotificationId) -> StoreResult<Option<Notification>> {
        Ok(self.working.notifications.get(&id).cloned())
    }

    async fn notifications_for(
        &mut self,
        recipient: UserId,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        let mut found: Vec<Notification> = self
            .working
            .notifications
            .values()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn update_notification(&mut self, notification: &Notification) -> StoreResult<()> {
        if let Some(slot) = self.working.notifications.get_mut(&notification.id) {
            *slot = notification.clone();
        }
        Ok(())
    }

    async fn delete_notification(&mut self, id: NotificationId) -> StoreResult<()> {
        self.working.notifications.remove(&id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
