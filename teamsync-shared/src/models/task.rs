/// Task model
///
/// A task's audience is `assigned_to` (individuals) plus `teams`. A task with
/// neither is private to its creator.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('pending', 'in-progress', 'completed');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     title TEXT NOT NULL,
///     description TEXT,
///     deadline TIMESTAMPTZ,
///     status task_status NOT NULL DEFAULT 'pending',
///     assigned_to UUID[] NOT NULL DEFAULT '{}',
///     team_ids UUID[] NOT NULL DEFAULT '{}',
///     created_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{TaskId, TeamId, UserId};

/// Task progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not started
    #[default]
    Pending,

    /// Being worked on
    InProgress,

    /// Done
    Completed,
}

impl TaskStatus {
    /// Converts status to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Checks if the task is done
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// A unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task ID
    pub id: TaskId,

    /// Short title
    pub title: String,

    /// Optional long description
    pub description: Option<String>,

    /// Optional due date
    pub deadline: Option<DateTime<Utc>>,

    /// Current status
    pub status: TaskStatus,

    /// Individual assignees
    pub assigned_to: BTreeSet<UserId>,

    /// Assigned teams
    pub teams: BTreeSet<TeamId>,

    /// Creator, immutable
    pub created_by: UserId,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    /// Title
    pub title: String,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Deadline
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,

    /// Individual assignees
    #[serde(default)]
    pub assigned_to: BTreeSet<UserId>,

    /// Assigned teams
    #[serde(default)]
    pub teams: BTreeSet<TeamId>,
}

/// Partial update of a task; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskChanges {
    /// New title
    pub title: Option<String>,

    /// New description
    pub description: Option<String>,

    /// New deadline
    pub deadline: Option<DateTime<Utc>>,

    /// New status
    pub status: Option<TaskStatus>,

    /// Replacement assignee set
    pub assigned_to: Option<BTreeSet<UserId>>,

    /// Replacement team set
    pub teams: Option<BTreeSet<TeamId>>,
}

impl Task {
    /// Builds a pending task from creation input
    pub fn new(created_by: UserId, input: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            title: input.title,
            description: input.description,
            deadline: input.deadline,
            status: TaskStatus::Pending,
            assigned_to: input.assigned_to,
            teams: input.teams,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Private tasks have no audience besides the creator
    pub fn is_private(&self) -> bool {
        self.assigned_to.is_empty() && self.teams.is_empty()
    }

    /// Whether deleting `team_id` leaves this task without any audience
    pub fn is_orphaned_by(&self, team_id: TeamId) -> bool {
        self.assigned_to.is_empty() && self.teams.len() == 1 && self.teams.contains(&team_id)
    }

    /// `{created_by} ∪ assigned_to`, the audience of status and edit events
    pub fn stakeholders(&self) -> BTreeSet<UserId> {
        let mut users = self.assigned_to.clone();
        users.insert(self.created_by);
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with(assigned: &[UserId], teams: &[TeamId]) -> Task {
        Task::new(
            UserId::new(),
            NewTask {
                title: "Write docs".to_string(),
                assigned_to: assigned.iter().copied().collect(),
                teams: teams.iter().copied().collect(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(TaskStatus::Pending.as_str(), "pending");
        assert_eq!(TaskStatus::InProgress.as_str(), "in-progress");
        assert_eq!(TaskStatus::Completed.as_str(), "completed");
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
    }

    #[test]
    fn test_private_task() {
        assert!(task_with(&[], &[]).is_private());
        assert!(!task_with(&[UserId::new()], &[]).is_private());
        assert!(!task_with(&[], &[TeamId::new()]).is_private());
    }

    #[test]
    fn test_orphaned_only_when_team_was_sole_audience() {
        let team = TeamId::new();
        assert!(task_with(&[], &[team]).is_orphaned_by(team));
        assert!(!task_with(&[UserId::new()], &[team]).is_orphaned_by(team));
        assert!(!task_with(&[], &[team, TeamId::new()]).is_orphaned_by(team));
        assert!(!task_with(&[], &[TeamId::new()]).is_orphaned_by(team));
    }

    #[test]
    fn test_stakeholders_include_creator() {
        let assignee = UserId::new();
        let task = task_with(&[assignee], &[]);
        let stakeholders = task.stakeholders();
        assert!(stakeholders.contains(&assignee));
        assert!(stakeholders.contains(&task.created_by));
    }
}
