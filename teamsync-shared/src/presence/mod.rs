/// Presence & delivery
///
/// Tracks which users have live real-time sessions and pushes messages to
/// them. The transport (WebSocket handler) reports connection lifecycle
/// through [`Presence::on_connect`] and [`Presence::on_disconnect`]; the
/// notification fan-out pushes through [`Presence::push`].
///
/// A user may hold several sessions at once. Presence is reference counted:
/// `is_online` flips to true on the first session and back to false only
/// when the last one closes, and each flip is broadcast exactly once.
///
/// Delivery is best-effort. A push to a user with no live session, or to a
/// session whose socket already went away, is silently dropped; the
/// persisted notification is the durable record.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use teamsync_shared::models::User;
/// use teamsync_shared::presence::{Presence, Rooms};
/// use teamsync_shared::store::{InMemoryStore, Store};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(InMemoryStore::new());
/// let rooms = Arc::new(Rooms::new());
/// let presence = Presence::new(store.clone(), rooms.clone(), 3);
///
/// let user = User::new("Ada", "ada@example.com");
/// let mut tx = store.begin().await?;
/// tx.insert_user(&user).await?;
/// tx.commit().await?;
///
/// let (connection, _outbound) = rooms.attach();
/// presence.on_connect(connection, user.id).await?;
/// assert!(presence.is_online(user.id).await);
/// # Ok(())
/// # }
/// ```

pub mod rooms;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::models::{ConnectionId, NotificationPayload, UserId};
use crate::retry::with_retries;
use crate::store::Store;

pub use rooms::Rooms;

/// Message pushed to real-time clients
///
/// Serialized as `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// A notification was persisted for the receiving user
    NewNotification(NotificationPayload),

    /// A user came online or went offline
    UserStatusChange(PresencePayload),
}

/// Presence change payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: UserId,
    pub is_online: bool,
}

/// Publish-by-identity, subscribe-by-connection
///
/// Implementations must never block and must swallow delivery failures.
pub trait Broadcaster: Send + Sync {
    /// Subscribes a connection to a user's room
    fn join(&self, connection: ConnectionId, user_id: UserId);

    /// Removes a connection from whatever room it is in
    fn leave(&self, connection: ConnectionId);

    /// Sends to every connection in a user's room; returns how many accepted it
    fn publish(&self, user_id: UserId, message: &ServerMessage) -> usize;

    /// Sends to every connection; returns how many accepted it
    fn broadcast(&self, message: &ServerMessage) -> usize;
}

#[derive(Debug, Default)]
struct SessionTable {
    by_connection: HashMap<ConnectionId, UserId>,
    by_user: HashMap<UserId, usize>,
}

/// Session registry and push entry point
pub struct Presence {
    store: Arc<dyn Store>,
    broadcaster: Arc<dyn Broadcaster>,
    sessions: Mutex<SessionTable>,
    max_attempts: u32,
}

impl Presence {
    pub fn new(store: Arc<dyn Store>, broadcaster: Arc<dyn Broadcaster>, max_attempts: u32) -> Self {
        Self {
            store,
            broadcaster,
            sessions: Mutex::new(SessionTable::default()),
            max_attempts,
        }
    }

    /// Binds a connection to a user
    ///
    /// Returns `true` when this was the user's first live session, in which
    /// case `is_online` was set and the change broadcast. Binding an already
    /// bound connection is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user does not exist.
    pub async fn on_connect(&self, connection: ConnectionId, user_id: UserId) -> CoreResult<bool> {
        let mut sessions = self.sessions.lock().await;
        if sessions.by_connection.contains_key(&connection) {
            return Ok(false);
        }

        let first = sessions.by_user.get(&user_id).copied().unwrap_or(0) == 0;
        if first {
            self.set_online(user_id, true).await?;
        } else {
            self.ensure_user(user_id).await?;
        }

        sessions.by_connection.insert(connection, user_id);
        *sessions.by_user.entry(user_id).or_insert(0) += 1;
        self.broadcaster.join(connection, user_id);

        tracing::debug!(
            connection = %connection,
            user_id = %user_id,
            sessions = sessions.by_user.get(&user_id).copied().unwrap_or(0),
            "Session connected"
        );

        if first {
            self.announce(user_id, true);
        }
        Ok(first)
    }

    /// Releases a connection
    ///
    /// Returns `true` when this closed the user's last live session, in
    /// which case the change is broadcast and `is_online` cleared. A store
    /// failure while clearing the flag is logged, not returned, since the
    /// session itself is already released. Unknown connections are ignored.
    pub async fn on_disconnect(&self, connection: ConnectionId) -> CoreResult<bool> {
        let mut sessions = self.sessions.lock().await;
        let Some(user_id) = sessions.by_connection.remove(&connection) else {
            return Ok(false);
        };
        self.broadcaster.leave(connection);

        let remaining = match sessions.by_user.get_mut(&user_id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };

        tracing::debug!(
            connection = %connection,
            user_id = %user_id,
            sessions = remaining,
            "Session disconnected"
        );

        if remaining > 0 {
            return Ok(false);
        }

        // The session is gone either way; a failed write is cleared by
        // `reset_presence` on the next start
        sessions.by_user.remove(&user_id);
        match self.set_online(user_id, false).await {
            Ok(()) | Err(CoreError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to persist offline presence");
            }
        }
        self.announce(user_id, false);
        Ok(true)
    }

    /// Delivers a message to every live session of a user
    ///
    /// Returns the number of sessions reached; zero when the user is offline.
    pub fn push(&self, user_id: UserId, message: &ServerMessage) -> usize {
        let delivered = self.broadcaster.publish(user_id, message);
        if delivered == 0 {
            tracing::trace!(user_id = %user_id, "No live session, push dropped");
        }
        delivered
    }

    /// Whether the user has at least one live session in this process
    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.live_sessions(user_id).await > 0
    }

    pub async fn live_sessions(&self, user_id: UserId) -> usize {
        self.sessions
            .lock()
            .await
            .by_user
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    fn announce(&self, user_id: UserId, is_online: bool) {
        let reached = self
            .broadcaster
            .broadcast(&ServerMessage::UserStatusChange(PresencePayload { user_id, is_online }));
        tracing::info!(user_id = %user_id, is_online, reached, "Presence changed");
    }

    async fn ensure_user(&self, user_id: UserId) -> CoreResult<()> {
        let mut tx = self.store.begin().await?;
        tx.user(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| CoreError::NotFound(format!("User {} not found", user_id)))
    }

    async fn set_online(&self, user_id: UserId, is_online: bool) -> CoreResult<()> {
        with_retries(self.max_attempts, "set_online", move || async move {
            let mut tx = self.store.begin().await?;
            let mut user = tx
                .user(user_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("User {} not found", user_id)))?;
            if user.is_online != is_online {
                user.is_online = is_online;
                tx.update_user(&user).await?;
                tx.commit().await?;
            }
            Ok(())
        })
        .await
    }
}
