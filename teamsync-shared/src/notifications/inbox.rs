/// Notification Inbox
///
/// Recipient-side access to persisted notifications. Only the recipient may
/// read, mark, or delete a notification.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::{Notification, NotificationId, UserId};
use crate::retry::with_retries;
use crate::store::{Store, StoreTx};

/// A user's notification inbox
///
/// Only the recipient can read, mark, or delete a notification.
#[derive(Clone)]
pub struct Inbox {
    store: Arc<dyn Store>,
    config: CoreConfig,
}

impl Inbox {
    pub fn new(store: Arc<dyn Store>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Newest notifications first, at most one page
    pub async fn list(&self, actor: UserId) -> CoreResult<Vec<Notification>> {
        let limit = self.config.notification_page_size;
        with_retries(self.config.max_attempts, "list_notifications", move || async move {
            let mut tx = self.store.begin().await?;
            Ok(tx.notifications_for(actor, limit).await?)
        })
        .await
    }

    /// Marks a notification read; already-read notifications are returned as is
    pub async fn mark_read(&self, actor: UserId, id: NotificationId) -> CoreResult<Notification> {
        with_retries(self.config.max_attempts, "mark_read", move || async move {
            let mut tx = self.store.begin().await?;
            let mut notification = owned(tx.as_mut(), actor, id, "mark").await?;
            if !notification.read {
                notification.read = true;
                tx.update_notification(&notification).await?;
                tx.commit().await?;
            }
            Ok(notification)
        })
        .await
    }

    /// Deletes a notification
    pub async fn delete(&self, actor: UserId, id: NotificationId) -> CoreResult<()> {
        with_retries(self.config.max_attempts, "delete_notification", move || async move {
            let mut tx = self.store.begin().await?;
            owned(tx.as_mut(), actor, id, "delete").await?;
            tx.delete_notification(id).await?;
            tx.commit().await?;
            Ok(())
        })
        .await?;

        tracing::debug!(notification_id = %id, user_id = %actor, "Notification deleted");
        Ok(())
    }
}

async fn owned(
    tx: &mut dyn StoreTx,
    actor: UserId,
    id: NotificationId,
    verb: &str,
) -> CoreResult<Notification> {
    let notification = tx
        .notification(id)
        .await?
        .ok_or_else(|| CoreError::NotFound("Notification not found".to_string()))?;

    if notification.recipient != actor {
        return Err(CoreError::Forbidden(format!(
            "Not authorized to {} this notification",
            verb
        )));
    }
    Ok(notification)
}
