/// Notification Fan-out Engine
///
/// Turns committed domain events into per-recipient notifications. Staging
/// writes the rows inside the caller's transaction; delivery pushes them to
/// live sessions only after that transaction committed.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::CoreResult;
use crate::events::{DomainEvent, EventKind};
use crate::models::{Notification, UserId};
use crate::presence::{Presence, ServerMessage};
use crate::retry::with_retries;
use crate::store::{Store, StoreTx};

/// Turns domain events into persisted notifications and pushes
///
/// Fan-out is two-phase. [`NotificationFanout::stage`] runs inside the
/// mutating operation's transaction, so notifications commit or roll back
/// with the change that caused them. [`NotificationFanout::deliver`] runs
/// after commit and never fails.
///
/// Not idempotent: staging the same event twice yields two notifications
/// per recipient.
#[derive(Clone)]
pub struct NotificationFanout {
    store: Arc<dyn Store>,
    presence: Arc<Presence>,
    max_attempts: u32,
}

impl NotificationFanout {
    pub fn new(store: Arc<dyn Store>, presence: Arc<Presence>, max_attempts: u32) -> Self {
        Self {
            store,
            presence,
            max_attempts,
        }
    }

    /// Computes recipients for an event, minus the sender
    pub async fn recipients(tx: &mut dyn StoreTx, event: &DomainEvent) -> CoreResult<BTreeSet<UserId>> {
        let mut recipients = match &event.kind {
            EventKind::TaskAssigned { assignees, teams, .. } => {
                let mut users = assignees.clone();
                for team_id in teams {
                    if let Some(team) = tx.team(*team_id).await? {
                        users.extend(team.members.iter().copied());
                    }
                }
                users
            }
            EventKind::TaskUpdated { stakeholders, .. }
            | EventKind::TaskStatusChanged { stakeholders, .. }
            | EventKind::TaskDeleted { stakeholders, .. } => stakeholders.clone(),
            EventKind::MemberAdded { user_id, .. }
            | EventKind::MemberRemoved { user_id, .. }
            | EventKind::RoleChanged { user_id, .. } => BTreeSet::from([*user_id]),
        };

        if let Some(sender) = event.sender {
            recipients.remove(&sender);
        }
        Ok(recipients)
    }

    /// Persists one notification per recipient inside `tx`
    ///
    /// The caller must [`deliver`](Self::deliver) the returned notifications
    /// after committing.
    pub async fn stage(&self, tx: &mut dyn StoreTx, event: &DomainEvent) -> CoreResult<Vec<Notification>> {
        let recipients = Self::recipients(tx, event).await?;
        if recipients.is_empty() {
            return Ok(Vec::new());
        }

        let sender_name = match event.sender {
            Some(sender) => tx
                .user(sender)
                .await?
                .map(|user| user.name)
                .unwrap_or_else(|| "someone".to_string()),
            None => "the system".to_string(),
        };
        let message = event.render(&sender_name);
        let kind = event.notification_kind();

        let mut staged = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let notification = Notification::new(recipient, event.sender, kind.clone(), message.clone());
            tx.insert_notification(&notification).await?;
            staged.push(notification);
        }

        tracing::debug!(
            kind = kind.as_str(),
            recipients = staged.len(),
            "Notifications staged"
        );
        Ok(staged)
    }

    /// Stages every event in order
    pub async fn stage_all(&self, tx: &mut dyn StoreTx, events: &[DomainEvent]) -> CoreResult<Vec<Notification>> {
        let mut staged = Vec::new();
        for event in events {
            staged.extend(self.stage(tx, event).await?);
        }
        Ok(staged)
    }

    /// Pushes committed notifications to their recipients' live sessions
    ///
    /// Returns the number of sessions reached. Offline recipients are
    /// skipped silently.
    pub fn deliver(&self, notifications: &[Notification]) -> usize {
        let mut reached = 0;
        for notification in notifications {
            let message = ServerMessage::NewNotification(notification.payload());
            let sessions = self.presence.push(notification.recipient, &message);
            tracing::debug!(
                notification_id = %notification.id,
                recipient = %notification.recipient,
                sessions,
                "Notification pushed"
            );
            reached += sessions;
        }
        reached
    }

    /// Persists and pushes a standalone event in its own transaction
    pub async fn notify(&self, event: &DomainEvent) -> CoreResult<Vec<Notification>> {
        let staged = with_retries(self.max_attempts, "notify", move || async move {
            let mut tx = self.store.begin().await?;
            let staged = self.stage(tx.as_mut(), event).await?;
            tx.commit().await?;
            Ok(staged)
        })
        .await?;

        self.deliver(&staged);
        Ok(staged)
    }
}
