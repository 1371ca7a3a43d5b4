//! JSON event envelope pushed over WebSocket connections.
//!
//! Every push is a text frame of the form `{"event": <name>, "data": <payload>}`.
//! No binary framing; payloads are the serialized row types.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{ChatMessage, Comment, Notification};

/// Pushed to the receiver of a just-persisted chat message.
pub const NEW_CHAT_MESSAGE: &str = "newChatMessage";
/// Pushed to the recipient of a just-persisted notification.
pub const RECEIVE_NOTIFICATION: &str = "receiveNotification";
/// Broadcast to all clients when a product's comments change.
pub const UPDATE_COMMENTS: &str = "updateComments";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event: String,
    pub data: Value,
}

impl Event {
    pub fn new(event: &str, data: impl Serialize) -> Self {
        Self {
            event: event.to_string(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn chat_message(message: &ChatMessage) -> Self {
        Self::new(NEW_CHAT_MESSAGE, message)
    }

    pub fn notification(notification: &Notification) -> Self {
        Self::new(RECEIVE_NOTIFICATION, notification)
    }

    pub fn comment_update(comment: &Comment) -> Self {
        Self::new(UPDATE_COMMENTS, comment)
    }

    /// Encode as a WebSocket text frame.
    pub fn to_message(&self) -> Message {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Message::Text(json.into())
    }
}
