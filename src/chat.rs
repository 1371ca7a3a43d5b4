//! Chat message store and endpoints.
//!
//! A send is persisted first (message plus a `message`-kind notification
//! for the receiver), then pushed to the receiver's connection if they are
//! online. Push failures never fail the send; the client re-fetches
//! history on next load. Messages are immutable except for the seen flag.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::models::ChatMessage;
use crate::error::ApiError;
use crate::notifications::{self, NotificationKind};
use crate::state::AppState;
use crate::users;
use crate::ws::events::Event;

// --- Store operations ---

pub fn create_message(
    conn: &Connection,
    sender_id: &str,
    receiver_id: &str,
    content: &str,
) -> Result<ChatMessage, ApiError> {
    let message = ChatMessage {
        id: Uuid::now_v7().to_string(),
        sender_id: sender_id.to_string(),
        receiver_id: receiver_id.to_string(),
        content: content.to_string(),
        seen: false,
        created_at: Utc::now().to_rfc3339(),
    };

    conn.execute(
        "INSERT INTO chat_messages (id, sender_id, receiver_id, content, seen, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        rusqlite::params![
            message.id,
            message.sender_id,
            message.receiver_id,
            message.content,
            message.created_at,
        ],
    )?;

    Ok(message)
}

/// Full history between two users in both directions, chronological.
/// No server-side deduplication: if a pushed message races a re-fetch,
/// the client reconciles by message id.
pub fn history_between(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> Result<Vec<ChatMessage>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_id, receiver_id, content, seen, created_at
         FROM chat_messages
         WHERE (sender_id = ?1 AND receiver_id = ?2)
            OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY created_at ASC, id ASC",
    )?;

    let messages = stmt
        .query_map(rusqlite::params![user_a, user_b], row_to_message)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(messages)
}

/// Flip seen on every unseen message from `sender_id` to `receiver_id`.
/// Returns the number of rows affected.
pub fn mark_seen_from(
    conn: &Connection,
    sender_id: &str,
    receiver_id: &str,
) -> Result<usize, ApiError> {
    let updated = conn.execute(
        "UPDATE chat_messages SET seen = 1
         WHERE sender_id = ?1 AND receiver_id = ?2 AND seen = 0",
        rusqlite::params![sender_id, receiver_id],
    )?;
    Ok(updated)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        seen: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// --- REST endpoint handlers ---

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver: String,
    pub content: String,
}

/// POST /api/chats — Send a chat message.
/// Validation happens before any write: an invalid request leaves no
/// partial rows behind.
pub async fn send_message(
    State(state): State<AppState>,
    Actor(sender_id): Actor,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    if body.receiver.trim().is_empty() || body.content.trim().is_empty() {
        return Err(ApiError::validation("Receiver and content are required"));
    }

    let db = state.db.clone();
    let receiver_id = body.receiver.clone();
    let content = body.content.clone();
    let sender = sender_id.clone();

    let (message, notification, email) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;

        if users::find_user(&conn, &receiver_id)
            .map_err(ApiError::from)?
            .is_none()
        {
            return Err(ApiError::not_found("Receiver not found"));
        }

        let message = create_message(&conn, &sender, &receiver_id, &content)?;

        let sender_name = users::display_name(&conn, &sender);
        let notification = notifications::create(
            &conn,
            &receiver_id,
            Some(&sender),
            NotificationKind::Message,
            &format!("New message from {sender_name}"),
        )?;
        let email = notifications::email_fallback(&conn, &receiver_id, &notification);

        Ok::<_, ApiError>((message, notification, email))
    })
    .await??;

    // Best-effort realtime delivery; the persisted rows are the record of
    // truth either way.
    state
        .dispatcher
        .deliver(&message.receiver_id, &Event::chat_message(&message));
    state.dispatcher.deliver_notification(
        &notification.recipient_id,
        &Event::notification(&notification),
        email,
    );

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/chats/{user_id} — Chat history with another user, chronological.
pub async fn get_history(
    State(state): State<AppState>,
    Actor(current_user): Actor,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let db = state.db.clone();

    let messages = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        history_between(&conn, &current_user, &user_id)
    })
    .await??;

    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct MarkSeenRequest {
    pub sender: String,
}

/// POST /api/chats/seen — Mark all messages from a sender to the actor seen.
pub async fn mark_seen(
    State(state): State<AppState>,
    Actor(receiver_id): Actor,
    Json(body): Json<MarkSeenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        mark_seen_from(&conn, &body.sender, &receiver_id)
    })
    .await??;

    Ok(Json(json!({ "message": "Chats marked as seen" })))
}
