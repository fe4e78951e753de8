/// Task Store
///
/// Task mutations with authorization evaluated against the team structure
/// as it is inside the operation's own transaction. Every mutation stages
/// its notifications before commit and pushes them after.
///
/// # Recipients
///
/// | Operation                 | Notified                                           |
/// |---------------------------|----------------------------------------------------|
/// | create                    | assignees ∪ members of assigned teams              |
/// | update, new audience      | newly added assignees ∪ members of newly added teams |
/// | update, status/fields     | creator ∪ assignees, minus the newly added         |
/// | delete                    | creator ∪ assignees                                |
///
/// The actor is never notified about their own action.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::auth::authorization::{
    can_delete_task, can_modify_task, can_view_task, check_can_assign, check_team_reference,
};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{DomainEvent, EventKind};
use crate::lookup::{require_actor, require_task, require_team, require_user};
use crate::models::{NewTask, Notification, Task, TaskChanges, TaskId, TeamId, User, UserId};
use crate::notifications::NotificationFanout;
use crate::retry::with_retries;
use crate::store::{Store, StoreTx};

/// Task mutations and queries
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn Store>,
    fanout: NotificationFanout,
    config: CoreConfig,
}

async fn led_team_ids(tx: &mut dyn StoreTx, actor: &User) -> CoreResult<Vec<TeamId>> {
    Ok(tx.teams_led_by(actor.id).await?.into_iter().map(|t| t.id).collect())
}

async fn require_audience(
    tx: &mut dyn StoreTx,
    assignees: &BTreeSet<UserId>,
    teams: &BTreeSet<TeamId>,
) -> CoreResult<()> {
    for user_id in assignees {
        require_user(tx, *user_id).await?;
    }
    for team_id in teams {
        require_team(tx, *team_id).await?;
    }
    Ok(())
}

fn validate_title(title: &str) -> CoreResult<()> {
    if title.trim().is_empty() {
        return Err(CoreError::Conflict("Task title must not be empty".to_string()));
    }
    Ok(())
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>, fanout: NotificationFanout, config: CoreConfig) -> Self {
        Self {
            store,
            fanout,
            config,
        }
    }

    /// Creates a task
    ///
    /// # Errors
    ///
    /// - `NotFound` if an assignee or team does not exist
    /// - `Forbidden` if the actor may not assign these users, or references
    ///   a team they do not belong to
    pub async fn create_task(&self, actor: UserId, input: NewTask) -> CoreResult<Task> {
        let input = &input;
        let (task, staged) = with_retries(self.config.max_attempts, "create_task", move || {
            self.create_task_once(actor, input)
        })
        .await?;

        tracing::info!(
            task_id = %task.id,
            created_by = %actor,
            assignees = task.assigned_to.len(),
            teams = task.teams.len(),
            "Task created"
        );
        self.fanout.deliver(&staged);
        Ok(task)
    }

    async fn create_task_once(&self, actor_id: UserId, input: &NewTask) -> CoreResult<(Task, Vec<Notification>)> {
        validate_title(&input.title)?;

        let mut tx = self.store.begin().await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        require_audience(tx.as_mut(), &input.assigned_to, &input.teams).await?;
        check_can_assign(tx.as_mut(), &actor, &input.assigned_to).await?;
        check_team_reference(&actor, &input.teams)?;

        let task = Task::new(actor.id, input.clone());
        tx.insert_task(&task).await?;

        let staged = if task.is_private() {
            Vec::new()
        } else {
            let event = DomainEvent::new(
                actor.id,
                EventKind::TaskAssigned {
                    task_id: task.id,
                    title: task.title.clone(),
                    assignees: task.assigned_to.clone(),
                    teams: task.teams.clone(),
                },
            );
            self.fanout.stage(tx.as_mut(), &event).await?
        };

        tx.commit().await?;
        Ok((task, staged))
    }

    /// Applies a partial update
    ///
    /// Only newly added assignees go through the assignment check, so a
    /// member may still edit a task they were assigned to by a leader.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the task, a new assignee, or a new team does not exist
    /// - `Forbidden` if the actor may not modify the task or assign the new
    ///   audience
    pub async fn update_task(&self, actor: UserId, task_id: TaskId, changes: TaskChanges) -> CoreResult<Task> {
        let changes = &changes;
        let (task, staged) = with_retries(self.config.max_attempts, "update_task", move || {
            self.update_task_once(actor, task_id, changes)
        })
        .await?;

        tracing::info!(task_id = %task_id, actor = %actor, status = task.status.as_str(), "Task updated");
        self.fanout.deliver(&staged);
        Ok(task)
    }

    async fn update_task_once(
        &self,
        actor_id: UserId,
        task_id: TaskId,
        changes: &TaskChanges,
    ) -> CoreResult<(Task, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let mut task = require_task(tx.as_mut(), task_id).await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        let led = led_team_ids(tx.as_mut(), &actor).await?;

        if !can_modify_task(&actor, &task, &led) {
            return Err(CoreError::Forbidden(
                "Not authorized to update this task".to_string(),
            ));
        }

        let new_assignees: BTreeSet<UserId> = match &changes.assigned_to {
            Some(next) => next.difference(&task.assigned_to).copied().collect(),
            None => BTreeSet::new(),
        };
        let new_teams: BTreeSet<TeamId> = match &changes.teams {
            Some(next) => next.difference(&task.teams).copied().collect(),
            None => BTreeSet::new(),
        };
        require_audience(tx.as_mut(), &new_assignees, &new_teams).await?;
        check_can_assign(tx.as_mut(), &actor, &new_assignees).await?;
        check_team_reference(&actor, &new_teams)?;

        let mut fields_changed = false;
        if let Some(title) = &changes.title {
            validate_title(title)?;
            fields_changed |= *title != task.title;
            task.title = title.clone();
        }
        if changes.description.is_some() && changes.description != task.description {
            task.description = changes.description.clone();
            fields_changed = true;
        }
        if changes.deadline.is_some() && changes.deadline != task.deadline {
            task.deadline = changes.deadline;
            fields_changed = true;
        }
        if let Some(assigned_to) = &changes.assigned_to {
            fields_changed |= *assigned_to != task.assigned_to;
            task.assigned_to = assigned_to.clone();
        }
        if let Some(teams) = &changes.teams {
            fields_changed |= *teams != task.teams;
            task.teams = teams.clone();
        }
        let status_changed = match changes.status {
            Some(status) if status != task.status => {
                task.status = status;
                true
            }
            _ => false,
        };

        task.updated_at = Utc::now();
        tx.update_task(&task).await?;

        let mut events = Vec::new();
        if !new_assignees.is_empty() || !new_teams.is_empty() {
            events.push(DomainEvent::new(
                actor.id,
                EventKind::TaskAssigned {
                    task_id: task.id,
                    title: task.title.clone(),
                    assignees: new_assignees.clone(),
                    teams: new_teams,
                },
            ));
        }

        // A status change reaches every stakeholder, including ones just added
        if status_changed {
            events.push(DomainEvent::new(
                actor.id,
                EventKind::TaskStatusChanged {
                    task_id: task.id,
                    title: task.title.clone(),
                    status: task.status,
                    stakeholders: task.stakeholders(),
                },
            ));
        }
        if fields_changed {
            let stakeholders: BTreeSet<UserId> = task
                .stakeholders()
                .difference(&new_assignees)
                .copied()
                .collect();
            events.push(DomainEvent::new(
                actor.id,
                EventKind::TaskUpdated {
                    task_id: task.id,
                    title: task.title.clone(),
                    stakeholders,
                },
            ));
        }

        let staged = self.fanout.stage_all(tx.as_mut(), &events).await?;
        tx.commit().await?;
        Ok((task, staged))
    }

    /// Deletes a task and notifies its stakeholders
    ///
    /// # Errors
    ///
    /// - `NotFound` if the task does not exist
    /// - `Forbidden` unless the actor is the creator, a leader of an
    ///   assigned team, or an admin
    pub async fn delete_task(&self, actor: UserId, task_id: TaskId) -> CoreResult<()> {
        let staged = with_retries(self.config.max_attempts, "delete_task", move || {
            self.delete_task_once(actor, task_id)
        })
        .await?;

        tracing::info!(task_id = %task_id, actor = %actor, "Task deleted");
        self.fanout.deliver(&staged);
        Ok(())
    }

    async fn delete_task_once(&self, actor_id: UserId, task_id: TaskId) -> CoreResult<Vec<Notification>> {
        let mut tx = self.store.begin().await?;
        let task = require_task(tx.as_mut(), task_id).await?;
        let actor = require_actor(tx.as_mut(), actor_id).await?;
        let led = led_team_ids(tx.as_mut(), &actor).await?;

        if !can_delete_task(&actor, &task, &led) {
            return Err(CoreError::Forbidden(
                "Not authorized to delete this task".to_string(),
            ));
        }

        tx.delete_task(task.id).await?;
        let event = DomainEvent::new(
            actor.id,
            EventKind::TaskDeleted {
                task_id: task.id,
                title: task.title.clone(),
                stakeholders: task.stakeholders(),
            },
        );
        let staged = self.fanout.stage(tx.as_mut(), &event).await?;

        tx.commit().await?;
        Ok(staged)
    }

    /// Loads one task the actor may see
    pub async fn get_task(&self, actor: UserId, task_id: TaskId) -> CoreResult<Task> {
        with_retries(self.config.max_attempts, "get_task", move || async move {
            let mut tx = self.store.begin().await?;
            let task = require_task(tx.as_mut(), task_id).await?;
            let user = require_actor(tx.as_mut(), actor).await?;
            if !can_view_task(&user, &task) {
                return Err(CoreError::Forbidden(
                    "Not authorized to view this task".to_string(),
                ));
            }
            Ok(task)
        })
        .await
    }

    /// Every task the actor may see, newest first
    pub async fn list_tasks(&self, actor: UserId) -> CoreResult<Vec<Task>> {
        with_retries(self.config.max_attempts, "list_tasks", move || async move {
            let mut tx = self.store.begin().await?;
            let user = require_actor(tx.as_mut(), actor).await?;
            let mut tasks: Vec<Task> = tx
                .tasks()
                .await?
                .into_iter()
                .filter(|task| can_view_task(&user, task))
                .collect();
            tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(tasks)
        })
        .await
    }
}
