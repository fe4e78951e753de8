/// In-process rooms
///
/// Each open socket owns an unbounded channel. Channels are grouped by user
/// so a message for one user reaches all of that user's connections.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tokio::sync::mpsc;

use super::{Broadcaster, ServerMessage};
use crate::models::{ConnectionId, UserId};

/// Per-connection channels grouped into per-user rooms
///
/// The transport calls [`Rooms::attach`] when a socket opens and forwards
/// everything arriving on the returned receiver. A connection only receives
/// user-addressed messages after it has been joined to a room; broadcasts
/// reach every attached connection.
#[derive(Debug, Default)]
pub struct Rooms {
    inner: RwLock<RoomsInner>,
}

#[derive(Debug, Default)]
struct RoomsInner {
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,
    members: HashMap<UserId, HashSet<ConnectionId>>,
    owners: HashMap<ConnectionId, UserId>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and returns its outbound stream
    pub fn attach(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ConnectionId::new();
        if let Ok(mut inner) = self.inner.write() {
            inner.senders.insert(connection, tx);
        }
        (connection, rx)
    }

    /// Drops a connection's channel and room membership
    pub fn detach(&self, connection: ConnectionId) {
        self.leave(connection);
        if let Ok(mut inner) = self.inner.write() {
            inner.senders.remove(&connection);
        }
    }

    /// Number of attached connections
    pub fn connection_count(&self) -> usize {
        self.inner.read().map(|inner| inner.senders.len()).unwrap_or(0)
    }

    fn encode(message: &ServerMessage) -> Option<String> {
        match serde_json::to_string(message) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize server message");
                None
            }
        }
    }
}

impl Broadcaster for Rooms {
    fn join(&self, connection: ConnectionId, user_id: UserId) {
        if let Ok(mut inner) = self.inner.write() {
            inner.owners.insert(connection, user_id);
            inner.members.entry(user_id).or_default().insert(connection);
        }
    }

    fn leave(&self, connection: ConnectionId) {
        if let Ok(mut inner) = self.inner.write() {
            if let Some(user_id) = inner.owners.remove(&connection) {
                if let Some(room) = inner.members.get_mut(&user_id) {
                    room.remove(&connection);
                    if room.is_empty() {
                        inner.members.remove(&user_id);
                    }
                }
            }
        }
    }

    fn publish(&self, user_id: UserId, message: &ServerMessage) -> usize {
        let Some(json) = Self::encode(message) else {
            return 0;
        };
        let Ok(inner) = self.inner.read() else {
            return 0;
        };

        let delivered = inner
            .members
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|connection| inner.senders.get(connection))
            .filter(|sender| sender.send(json.clone()).is_ok())
            .count();
        delivered
    }

    fn broadcast(&self, message: &ServerMessage) -> usize {
        let Some(json) = Self::encode(message) else {
            return 0;
        };
        let Ok(inner) = self.inner.read() else {
            return 0;
        };

        let delivered = inner
            .senders
            .values()
            .filter(|sender| sender.send(json.clone()).is_ok())
            .count();
        delivered
    }
}
