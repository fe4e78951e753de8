/// Domain events
///
/// Mutations in the team and task services describe their consequences as
/// [`DomainEvent`]s and hand them to the notification fan-out. An event says
/// what happened and who caused it; the fan-out decides who hears about it.
///
/// # Example
///
/// ```
/// use teamsync_shared::events::{DomainEvent, EventKind};
/// use teamsync_shared::models::{Role, UserId};
///
/// let user_id = UserId::new();
/// let event = DomainEvent::system(EventKind::RoleChanged { user_id, role: Role::Member });
/// assert_eq!(event.render("Ada"), "Your role is now member.");
/// ```

use std::collections::BTreeSet;

use crate::models::{NotificationKind, Role, TaskId, TaskStatus, TeamId, UserId};

/// Something that happened, plus who made it happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    /// Acting user; `None` for system-initiated changes
    pub sender: Option<UserId>,

    pub kind: EventKind,
}

/// What happened, with the raw recipient candidates for that kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Users and teams became part of a task's audience
    ///
    /// `assignees` and `teams` are only the newly added ones.
    TaskAssigned {
        task_id: TaskId,
        title: String,
        assignees: BTreeSet<UserId>,
        teams: BTreeSet<TeamId>,
    },

    /// Non-status fields changed
    TaskUpdated {
        task_id: TaskId,
        title: String,
        stakeholders: BTreeSet<UserId>,
    },

    /// Status moved
    TaskStatusChanged {
        task_id: TaskId,
        title: String,
        status: TaskStatus,
        stakeholders: BTreeSet<UserId>,
    },

    /// Task removed
    TaskDeleted {
        task_id: TaskId,
        title: String,
        stakeholders: BTreeSet<UserId>,
    },

    /// User joined a team
    MemberAdded {
        team_id: TeamId,
        team_name: String,
        user_id: UserId,
    },

    /// User left a team
    MemberRemoved {
        team_id: TeamId,
        team_name: String,
        user_id: UserId,
    },

    /// User's cached role changed
    RoleChanged { user_id: UserId, role: Role },
}

impl DomainEvent {
    pub fn new(sender: UserId, kind: EventKind) -> Self {
        Self {
            sender: Some(sender),
            kind,
        }
    }

    pub fn system(kind: EventKind) -> Self {
        Self { sender: None, kind }
    }

    /// Persisted notification kind for this event
    pub fn notification_kind(&self) -> NotificationKind {
        match &self.kind {
            EventKind::TaskAssigned { task_id, .. } => NotificationKind::TaskAssigned { task_id: *task_id },
            EventKind::TaskUpdated { task_id, .. } => NotificationKind::TaskUpdated { task_id: *task_id },
            EventKind::TaskStatusChanged { task_id, status, .. } => {
                NotificationKind::TaskStatusChanged {
                    task_id: *task_id,
                    status: *status,
                }
            }
            EventKind::TaskDeleted { task_id, .. } => NotificationKind::TaskDeleted { task_id: *task_id },
            EventKind::MemberAdded { team_id, .. } => NotificationKind::TeamAdded { team_id: *team_id },
            EventKind::MemberRemoved { team_id, .. } => NotificationKind::TeamRemoved { team_id: *team_id },
            EventKind::RoleChanged { role, .. } => NotificationKind::RoleChange { role: *role },
        }
    }

    /// Renders the message text, addressed to the recipient
    pub fn render(&self, sender_name: &str) -> String {
        match &self.kind {
            EventKind::TaskAssigned { title, .. } => {
                format!("You have been assigned to a new task: \"{}\" by {}.", title, sender_name)
            }
            EventKind::TaskUpdated { title, .. } => {
                format!("Task \"{}\" was updated by {}.", title, sender_name)
            }
            EventKind::TaskStatusChanged { title, status, .. } if status.is_completed() => {
                format!("{} marked task \"{}\" as completed.", sender_name, title)
            }
            EventKind::TaskStatusChanged { title, status, .. } => {
                format!("{} moved task \"{}\" to {}.", sender_name, title, status.as_str())
            }
            EventKind::TaskDeleted { title, .. } => {
                format!("Task \"{}\" was deleted by {}.", title, sender_name)
            }
            EventKind::MemberAdded { team_name, .. } => {
                format!("You were added to team \"{}\" by {}.", team_name, sender_name)
            }
            EventKind::MemberRemoved { team_name, .. } => {
                format!("You were removed from team \"{}\" by {}.", team_name, sender_name)
            }
            EventKind::RoleChanged { role, .. } => format!("Your role is now {}.", role),
        }
    }
}
