//! Client-side event reconciliation.
//!
//! The reference model of what a connected client does with pushed
//! events: apply them to local state optimistically instead of
//! re-fetching. Because a push can race a history re-fetch, chat messages
//! are deduplicated by id before appending. The integration tests use
//! this as their client.

use crate::db::models::{ChatMessage, Notification};
use crate::ws::events::{self, Event};

/// Local client state fed by pushed events and store fetches.
#[derive(Debug, Default)]
pub struct ClientState {
    /// Chat history, chronological
    pub messages: Vec<ChatMessage>,
    /// Notifications, newest first
    pub notifications: Vec<Notification>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace chat history from a store fetch.
    pub fn load_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    /// Replace notifications from a store fetch.
    pub fn load_notifications(&mut self, notifications: Vec<Notification>) {
        self.notifications = notifications;
    }

    /// Apply a pushed event. Unknown events and undecodable payloads are
    /// ignored; the next fetch corrects any drift.
    pub fn apply(&mut self, event: &Event) {
        match event.event.as_str() {
            events::NEW_CHAT_MESSAGE => {
                if let Ok(message) = serde_json::from_value::<ChatMessage>(event.data.clone()) {
                    // Dedup by id: the same message may arrive both via
                    // push and via a concurrent re-fetch
                    if !self.messages.iter().any(|m| m.id == message.id) {
                        self.messages.push(message);
                    }
                }
            }
            events::RECEIVE_NOTIFICATION => {
                if let Ok(notification) =
                    serde_json::from_value::<Notification>(event.data.clone())
                {
                    if !self.notifications.iter().any(|n| n.id == notification.id) {
                        self.notifications.insert(0, notification);
                    }
                }
            }
            _ => {}
        }
    }

    /// Apply a raw JSON frame as received over the wire.
    pub fn apply_json(&mut self, frame: &str) {
        if let Ok(event) = serde_json::from_str::<Event>(frame) {
            self.apply(&event);
        }
    }

    pub fn unseen_notifications(&self) -> usize {
        self.notifications.iter().filter(|n| !n.seen).count()
    }
}
