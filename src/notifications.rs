//! Notification store and endpoints.
//!
//! Notifications are persisted first, then handed to the fanout
//! dispatcher: pushed if the recipient is online, otherwise a single
//! best-effort email when they opted in. Rows are never deleted; the seen
//! flag flips on single-item read or bulk mark-as-seen.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::models::Notification;
use crate::error::ApiError;
use crate::fanout::EmailFallback;
use crate::state::AppState;
use crate::users;
use crate::ws::events::Event;

/// Origin of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Triggered by a new chat message
    Message,
    /// Triggered by a new comment or reply
    Comment,
    /// Admin-issued or system notice
    Generic,
}

impl NotificationKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "message" => Some(Self::Message),
            "comment" => Some(Self::Comment),
            "generic" => Some(Self::Generic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Comment => "comment",
            Self::Generic => "generic",
        }
    }
}

/// Notifications returned per fetch. Older ones stay in the store but are
/// not paged; matches the original client's behavior.
const FETCH_LIMIT: u32 = 20;

// --- Store operations ---

pub fn create(
    conn: &Connection,
    recipient_id: &str,
    sender_id: Option<&str>,
    kind: NotificationKind,
    message: &str,
) -> Result<Notification, ApiError> {
    let notification = Notification {
        id: Uuid::now_v7().to_string(),
        recipient_id: recipient_id.to_string(),
        sender_id: sender_id.map(|s| s.to_string()),
        kind: kind.as_str().to_string(),
        message: message.to_string(),
        seen: false,
        created_at: Utc::now().to_rfc3339(),
    };

    conn.execute(
        "INSERT INTO notifications (id, recipient_id, sender_id, kind, message, seen, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        rusqlite::params![
            notification.id,
            notification.recipient_id,
            notification.sender_id,
            notification.kind,
            notification.message,
            notification.created_at,
        ],
    )?;

    Ok(notification)
}

pub fn list_for(conn: &Connection, recipient_id: &str) -> Result<Vec<Notification>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_id, sender_id, kind, message, seen, created_at
         FROM notifications
         WHERE recipient_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let notifications = stmt
        .query_map(rusqlite::params![recipient_id, FETCH_LIMIT], row_to_notification)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(notifications)
}

/// Flip seen on all of a recipient's unseen notifications. Returns the
/// number of rows affected.
pub fn mark_all_seen(conn: &Connection, recipient_id: &str) -> Result<usize, ApiError> {
    let updated = conn.execute(
        "UPDATE notifications SET seen = 1 WHERE recipient_id = ?1 AND seen = 0",
        rusqlite::params![recipient_id],
    )?;
    Ok(updated)
}

/// Mark a single notification as read. Only the row matching both id and
/// recipient is touched; returns the updated row, or None if no match.
pub fn mark_read(
    conn: &Connection,
    id: &str,
    recipient_id: &str,
) -> Result<Option<Notification>, ApiError> {
    let updated = conn.execute(
        "UPDATE notifications SET seen = 1 WHERE id = ?1 AND recipient_id = ?2",
        rusqlite::params![id, recipient_id],
    )?;
    if updated == 0 {
        return Ok(None);
    }

    let notification = conn
        .query_row(
            "SELECT id, recipient_id, sender_id, kind, message, seen, created_at
             FROM notifications WHERE id = ?1",
            rusqlite::params![id],
            row_to_notification,
        )
        .optional()?;

    Ok(notification)
}

/// Build the email fallback for a notification, honoring the recipient's
/// opt-in preference. None means store-only delivery when offline.
pub fn email_fallback(
    conn: &Connection,
    recipient_id: &str,
    notification: &Notification,
) -> Option<EmailFallback> {
    let recipient = users::find_user(conn, recipient_id).ok().flatten()?;
    if !recipient.email_notifications || recipient.email.is_empty() {
        return None;
    }

    Some(EmailFallback {
        to: recipient.email,
        subject: "You have a new notification on AgroMart".to_string(),
        body: notification.message.clone(),
    })
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        sender_id: row.get(2)?,
        kind: row.get(3)?,
        message: row.get(4)?,
        seen: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// --- REST endpoint handlers ---

/// GET /api/notifications — Newest-first notifications for the actor.
pub async fn get_notifications(
    State(state): State<AppState>,
    Actor(user_id): Actor,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let db = state.db.clone();

    let notifications = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        list_for(&conn, &user_id)
    })
    .await??;

    Ok(Json(notifications))
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub recipient: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// POST /api/notifications — Create a notification (admin/system notices).
/// Persists first, then best-effort push or email fallback.
pub async fn create_notification(
    State(state): State<AppState>,
    Actor(sender_id): Actor,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    if body.recipient.trim().is_empty() || body.message.trim().is_empty() {
        return Err(ApiError::validation("Missing required fields"));
    }
    let kind = NotificationKind::from_str(&body.kind)
        .ok_or_else(|| ApiError::validation("Unknown notification type"))?;

    let db = state.db.clone();
    let recipient_id = body.recipient.clone();
    let message = body.message.clone();

    let (notification, email) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;

        if users::find_user(&conn, &recipient_id)
            .map_err(ApiError::from)?
            .is_none()
        {
            return Err(ApiError::not_found("Recipient not found"));
        }

        let notification = create(&conn, &recipient_id, Some(&sender_id), kind, &message)?;
        let email = email_fallback(&conn, &recipient_id, &notification);
        Ok::<_, ApiError>((notification, email))
    })
    .await??;

    state.dispatcher.deliver_notification(
        &notification.recipient_id,
        &Event::notification(&notification),
        email,
    );

    Ok((StatusCode::CREATED, Json(notification)))
}

/// POST /api/notifications/seen — Bulk mark the actor's notifications seen.
pub async fn mark_notifications_seen(
    State(state): State<AppState>,
    Actor(user_id): Actor,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        mark_all_seen(&conn, &user_id)
    })
    .await??;

    Ok(Json(json!({ "message": "Notifications marked as seen" })))
}

/// PATCH /api/notifications/{id}/read — Mark one notification as read.
/// 404 unless the notification exists and belongs to the actor.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ApiError> {
    let db = state.db.clone();

    let notification = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        mark_read(&conn, &id, &user_id)
    })
    .await??
    .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    Ok(Json(notification))
}
