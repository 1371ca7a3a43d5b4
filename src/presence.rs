//! In-memory presence registry: which users currently hold a live
//! push-capable WebSocket connection.
//!
//! Explicitly owned and constructor-injected (no module-level singleton)
//! so the dispatcher can be tested in isolation. The registry is rebuilt
//! from nothing on process restart; clients re-announce on reconnect.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Sender half of a connection's outbound channel. Cloning this is how
/// any part of the system pushes messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// A live connection: fresh id per socket plus the outbound sender.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub sender: ConnectionSender,
}

impl ConnectionHandle {
    pub fn new(sender: ConnectionSender) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender,
        }
    }
}

/// Bidirectional index over live connections: user id -> handle for
/// delivery lookups, connection id -> user id for O(1) disconnect cleanup.
/// At most one entry per user; a reconnect replaces the prior entry.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    by_user: DashMap<String, ConnectionHandle>,
    by_conn: DashMap<Uuid, String>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the connection for a user. Idempotent; a
    /// user reconnecting overwrites their prior entry rather than
    /// duplicating it.
    pub fn join(&self, user_id: &str, handle: ConnectionHandle) {
        let conn_id = handle.id;
        if let Some(old) = self.by_user.insert(user_id.to_string(), handle) {
            self.by_conn.remove(&old.id);
        }
        self.by_conn.insert(conn_id, user_id.to_string());

        tracing::debug!(user_id = %user_id, conn_id = %conn_id, "presence join");
    }

    /// Connection handle for a user, if they are online.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.by_user.get(user_id).map(|entry| entry.value().clone())
    }

    /// Remove the entry for a departing connection. A stale handle (one
    /// already replaced by a reconnect) only clears the reverse index and
    /// leaves the user's current entry alone.
    pub fn leave(&self, conn_id: Uuid) {
        if let Some((_, user_id)) = self.by_conn.remove(&conn_id) {
            self.by_user
                .remove_if(&user_id, |_, handle| handle.id == conn_id);
            tracing::debug!(user_id = %user_id, conn_id = %conn_id, "presence leave");
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.by_user.contains_key(user_id)
    }

    /// Number of online users.
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    /// Snapshot of all current handles, for broadcast events.
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.by_user
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
