/// Notification model
///
/// Notifications are written only by the fan-out engine and afterwards only
/// touched by their recipient (mark read, delete).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY,
///     recipient_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     sender_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     kind JSONB NOT NULL,
///     type TEXT NOT NULL,
///     message TEXT NOT NULL,
///     read BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{NotificationId, TaskId, TeamId, UserId};
use super::task::TaskStatus;
use super::user::Role;

/// What a notification is about, with only the fields that kind needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Recipient became part of a task's audience
    TaskAssigned { task_id: TaskId },

    /// Task fields other than status changed
    TaskUpdated { task_id: TaskId },

    /// Task moved to a new status
    TaskStatusChanged { task_id: TaskId, status: TaskStatus },

    /// Task was deleted
    TaskDeleted { task_id: TaskId },

    /// Recipient was added to a team
    TeamAdded { team_id: TeamId },

    /// Recipient was removed from a team
    TeamRemoved { team_id: TeamId },

    /// Recipient's role changed
    RoleChange { role: Role },
}

impl NotificationKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskAssigned { .. } => "task_assigned",
            NotificationKind::TaskUpdated { .. } => "task_updated",
            NotificationKind::TaskStatusChanged { .. } => "task_status_changed",
            NotificationKind::TaskDeleted { .. } => "task_deleted",
            NotificationKind::TeamAdded { .. } => "team_added",
            NotificationKind::TeamRemoved { .. } => "team_removed",
            NotificationKind::RoleChange { .. } => "role_change",
        }
    }

    /// Task this notification refers to, if any
    pub fn related_task(&self) -> Option<TaskId> {
        match self {
            NotificationKind::TaskAssigned { task_id }
            | NotificationKind::TaskUpdated { task_id }
            | NotificationKind::TaskStatusChanged { task_id, .. }
            | NotificationKind::TaskDeleted { task_id } => Some(*task_id),
            _ => None,
        }
    }

    /// Team this notification refers to, if any
    pub fn related_team(&self) -> Option<TeamId> {
        match self {
            NotificationKind::TeamAdded { team_id } | NotificationKind::TeamRemoved { team_id } => {
                Some(*team_id)
            }
            _ => None,
        }
    }
}

/// A persisted notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification ID
    pub id: NotificationId,

    /// Who receives it
    pub recipient: UserId,

    /// Who caused it; `None` for system-initiated changes
    pub sender: Option<UserId>,

    /// Kind and related entity
    pub kind: NotificationKind,

    /// Rendered text
    pub message: String,

    /// Whether the recipient has read it
    pub read: bool,

    /// Creation timestamp; persisted order is authoritative
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Builds an unread notification stamped now
    pub fn new(
        recipient: UserId,
        sender: Option<UserId>,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient,
            sender,
            kind,
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }

    /// Converts to the wire payload pushed to clients
    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload {
            id: self.id,
            kind: self.kind.as_str().to_string(),
            message: self.message.clone(),
            related_task_id: self.kind.related_task(),
            related_team_id: self.kind.related_team(),
            read: self.read,
            created_at: self.created_at,
        }
    }
}

/// Wire format of a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Notification ID
    pub id: NotificationId,

    /// Kind name, e.g. `task_assigned`
    #[serde(rename = "type")]
    pub kind: String,

    /// Rendered text
    pub message: String,

    /// Related task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<TaskId>,

    /// Related team
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_team_id: Option<TeamId>,

    /// Read flag
    pub read: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
