//! Product comments and replies, with the same persist-then-fanout
//! pattern as chat.
//!
//! Nesting is exactly one level deep: a reply's parent must be a
//! top-level comment, validated at write time. Deleting a top-level
//! comment cascades to its direct replies and nothing else.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::models::{Comment, Notification};
use crate::error::ApiError;
use crate::fanout::EmailFallback;
use crate::notifications::{self, NotificationKind};
use crate::state::AppState;
use crate::users;
use crate::ws::events::Event;

/// A comment with author name attached and, for top-level comments, its
/// replies nested.
#[derive(Debug, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: String,
    pub replies: Vec<CommentView>,
}

// --- Store operations ---

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Comment>> {
    conn.query_row(
        "SELECT id, product_id, author_id, content, parent_id, created_at, updated_at
         FROM comments WHERE id = ?1",
        rusqlite::params![id],
        row_to_comment,
    )
    .optional()
}

/// Persist a comment (or reply) and, when someone other than the author
/// should hear about it, the matching notification with its email
/// fallback. The notification targets the parent comment's author for a
/// reply, the product's seller for a top-level comment; self-notification
/// is suppressed.
pub fn create_with_notification(
    conn: &Connection,
    product_id: &str,
    author_id: &str,
    content: &str,
    parent_id: Option<&str>,
) -> Result<(Comment, Option<(Notification, Option<EmailFallback>)>), ApiError> {
    let product = users::find_product(conn, product_id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let recipient_id = match parent_id {
        Some(parent_id) => {
            let parent = find(conn, parent_id)
                .map_err(ApiError::from)?
                .ok_or_else(|| ApiError::not_found("Parent comment not found"))?;
            if parent.parent_id.is_some() {
                return Err(ApiError::validation(
                    "Replies can only target top-level comments",
                ));
            }
            if parent.product_id != product_id {
                return Err(ApiError::validation(
                    "Parent comment belongs to a different product",
                ));
            }
            parent.author_id
        }
        None => product.seller_id,
    };

    let now = Utc::now().to_rfc3339();
    let comment = Comment {
        id: Uuid::now_v7().to_string(),
        product_id: product_id.to_string(),
        author_id: author_id.to_string(),
        content: content.to_string(),
        parent_id: parent_id.map(|s| s.to_string()),
        created_at: now.clone(),
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO comments (id, product_id, author_id, content, parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            comment.id,
            comment.product_id,
            comment.author_id,
            comment.content,
            comment.parent_id,
            comment.created_at,
            comment.updated_at,
        ],
    )?;

    // Commenting on your own product or replying to yourself stays silent
    if recipient_id == author_id {
        return Ok((comment, None));
    }

    let author_name = users::display_name(conn, author_id);
    let text = if comment.parent_id.is_some() {
        format!("{author_name} replied to your comment")
    } else {
        format!("{author_name} commented on {}", product.title)
    };
    let notification = notifications::create(
        conn,
        &recipient_id,
        Some(author_id),
        NotificationKind::Comment,
        &text,
    )?;
    let email = notifications::email_fallback(conn, &recipient_id, &notification);

    Ok((comment, Some((notification, email))))
}

/// Update a comment's content. Author-only.
pub fn edit(
    conn: &Connection,
    id: &str,
    actor_id: &str,
    content: &str,
) -> Result<Comment, ApiError> {
    let comment = find(conn, id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if comment.author_id != actor_id {
        return Err(ApiError::forbidden("Unauthorized to edit this comment"));
    }

    let updated_at = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![content, updated_at, id],
    )?;

    Ok(Comment {
        content: content.to_string(),
        updated_at,
        ..comment
    })
}

/// Delete a comment and, if it was top-level, every reply whose parent
/// reference equals it. Author-only. Returns the number of replies
/// removed alongside the comment itself.
pub fn delete_cascade(conn: &Connection, id: &str, actor_id: &str) -> Result<usize, ApiError> {
    let comment = find(conn, id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if comment.author_id != actor_id {
        return Err(ApiError::forbidden("Unauthorized to delete this comment"));
    }

    let replies_deleted = conn.execute(
        "DELETE FROM comments WHERE parent_id = ?1",
        rusqlite::params![id],
    )?;
    conn.execute("DELETE FROM comments WHERE id = ?1", rusqlite::params![id])?;

    Ok(replies_deleted)
}

/// Top-level comments for a product, newest first, replies nested
/// chronologically under each.
pub fn list_for_product(conn: &Connection, product_id: &str) -> Result<Vec<CommentView>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.product_id, c.author_id, c.content, c.parent_id, c.created_at,
                c.updated_at, COALESCE(u.name, 'Unknown')
         FROM comments c
         LEFT JOIN users u ON u.id = c.author_id
         WHERE c.product_id = ?1 AND c.parent_id IS NULL
         ORDER BY c.created_at DESC, c.id DESC",
    )?;
    let top_level = stmt
        .query_map(rusqlite::params![product_id], row_to_view)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut reply_stmt = conn.prepare(
        "SELECT c.id, c.product_id, c.author_id, c.content, c.parent_id, c.created_at,
                c.updated_at, COALESCE(u.name, 'Unknown')
         FROM comments c
         LEFT JOIN users u ON u.id = c.author_id
         WHERE c.parent_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;

    let mut views = Vec::with_capacity(top_level.len());
    for mut view in top_level {
        view.replies = reply_stmt
            .query_map(rusqlite::params![view.comment.id], row_to_view)?
            .collect::<Result<Vec<_>, _>>()?;
        views.push(view);
    }

    Ok(views)
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        product_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        parent_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentView> {
    Ok(CommentView {
        comment: row_to_comment(row)?,
        author_name: row.get(7)?,
        replies: Vec::new(),
    })
}

// --- REST endpoint handlers ---

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub product_id: String,
    pub content: String,
    pub parent_comment_id: Option<String>,
}

/// POST /api/comments — Add a comment or reply.
pub async fn add_comment(
    State(state): State<AppState>,
    Actor(author_id): Actor,
    Json(body): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    if body.product_id.trim().is_empty() || body.content.trim().is_empty() {
        return Err(ApiError::validation("Product ID and content are required"));
    }

    let db = state.db.clone();

    let (comment, notification) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        create_with_notification(
            &conn,
            &body.product_id,
            &author_id,
            &body.content,
            body.parent_comment_id.as_deref(),
        )
    })
    .await??;

    // All clients viewing the product refresh their comment lists
    state.dispatcher.broadcast(&Event::comment_update(&comment));

    if let Some((notification, email)) = notification {
        state.dispatcher.deliver_notification(
            &notification.recipient_id,
            &Event::notification(&notification),
            email,
        );
    }

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    pub content: String,
}

/// PUT /api/comments/{id} — Edit a comment. Author-only.
pub async fn edit_comment(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(id): Path<String>,
    Json(body): Json<EditCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::validation("Content is required"));
    }

    let db = state.db.clone();

    let comment = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        edit(&conn, &id, &actor_id, &body.content)
    })
    .await??;

    Ok(Json(comment))
}

/// DELETE /api/comments/{id} — Delete a comment and its replies. Author-only.
pub async fn delete_comment(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        delete_cascade(&conn, &id, &actor_id)
    })
    .await??;

    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}

/// GET /api/comments/{id} — Comments for a product, replies nested.
pub async fn get_comments(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let db = state.db.clone();

    let comments = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| ApiError::internal("db lock poisoned"))?;
        list_for_product(&conn, &product_id)
    })
    .await??;

    Ok(Json(comments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;
    use crate::users::{insert_product, insert_user};

    fn seed(conn: &Connection) {
        insert_user(conn, "seller", "Sam Seller", "sam@example.com", "seller", false).unwrap();
        insert_user(conn, "alice", "Alice", "alice@example.com", "buyer", false).unwrap();
        insert_user(conn, "bob", "Bob", "bob@example.com", "buyer", false).unwrap();
        insert_product(conn, "p1", "seller", "Organic Apples").unwrap();
        insert_product(conn, "p2", "seller", "Fresh Carrots").unwrap();
    }

    #[test]
    fn top_level_comment_notifies_the_seller() {
        let conn = test_conn();
        seed(&conn);

        let (comment, notification) =
            create_with_notification(&conn, "p1", "alice", "Are these in season?", None).unwrap();
        assert!(comment.parent_id.is_none());

        let (notification, _email) = notification.expect("seller should be notified");
        assert_eq!(notification.recipient_id, "seller");
        assert_eq!(notification.kind, "comment");
    }

    #[test]
    fn reply_notifies_the_parent_author_only() {
        let conn = test_conn();
        seed(&conn);

        let (parent, _) =
            create_with_notification(&conn, "p1", "alice", "Are these in season?", None).unwrap();
        let (reply, notification) =
            create_with_notification(&conn, "p1", "bob", "They are!", Some(&parent.id)).unwrap();

        assert_eq!(reply.parent_id.as_deref(), Some(parent.id.as_str()));
        let (notification, _email) = notification.expect("parent author should be notified");
        assert_eq!(notification.recipient_id, "alice");
    }

    #[test]
    fn self_reply_produces_no_notification() {
        let conn = test_conn();
        seed(&conn);

        let (parent, _) =
            create_with_notification(&conn, "p1", "alice", "Anyone know?", None).unwrap();
        let (_, notification) =
            create_with_notification(&conn, "p1", "alice", "Never mind", Some(&parent.id))
                .unwrap();
        assert!(notification.is_none());

        // Seller commenting on their own product is also silent
        let (_, notification) =
            create_with_notification(&conn, "p1", "seller", "Back in stock", None).unwrap();
        assert!(notification.is_none());
    }

    #[test]
    fn reply_to_reply_is_rejected() {
        let conn = test_conn();
        seed(&conn);

        let (parent, _) = create_with_notification(&conn, "p1", "alice", "Top", None).unwrap();
        let (reply, _) =
            create_with_notification(&conn, "p1", "bob", "Reply", Some(&parent.id)).unwrap();

        let err = create_with_notification(&conn, "p1", "alice", "Deeper", Some(&reply.id))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn parent_must_belong_to_the_same_product() {
        let conn = test_conn();
        seed(&conn);

        let (parent, _) = create_with_notification(&conn, "p1", "alice", "Top", None).unwrap();
        let err = create_with_notification(&conn, "p2", "bob", "Wrong place", Some(&parent.id))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn delete_cascades_to_exactly_its_replies() {
        let conn = test_conn();
        seed(&conn);

        let (doomed, _) = create_with_notification(&conn, "p1", "alice", "Doomed", None).unwrap();
        create_with_notification(&conn, "p1", "bob", "r1", Some(&doomed.id)).unwrap();
        create_with_notification(&conn, "p1", "seller", "r2", Some(&doomed.id)).unwrap();

        let (survivor, _) =
            create_with_notification(&conn, "p1", "bob", "Survivor", None).unwrap();
        create_with_notification(&conn, "p1", "alice", "r3", Some(&survivor.id)).unwrap();

        let replies_deleted = delete_cascade(&conn, &doomed.id, "alice").unwrap();
        assert_eq!(replies_deleted, 2);

        let remaining = list_for_product(&conn, "p1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].comment.id, survivor.id);
        assert_eq!(remaining[0].replies.len(), 1);
    }

    #[test]
    fn only_the_author_may_edit_or_delete() {
        let conn = test_conn();
        seed(&conn);

        let (comment, _) = create_with_notification(&conn, "p1", "alice", "Mine", None).unwrap();

        assert!(matches!(
            edit(&conn, &comment.id, "bob", "Hijacked"),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            delete_cascade(&conn, &comment.id, "bob"),
            Err(ApiError::Forbidden(_))
        ));

        let edited = edit(&conn, &comment.id, "alice", "Mine, edited").unwrap();
        assert_eq!(edited.content, "Mine, edited");
    }

    #[test]
    fn listing_nests_replies_newest_top_level_first() {
        let conn = test_conn();
        seed(&conn);

        let (older, _) = create_with_notification(&conn, "p1", "alice", "Older", None).unwrap();
        let (newer, _) = create_with_notification(&conn, "p1", "bob", "Newer", None).unwrap();
        create_with_notification(&conn, "p1", "bob", "Reply to older", Some(&older.id)).unwrap();

        let views = list_for_product(&conn, "p1").unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].comment.id, newer.id);
        assert_eq!(views[1].comment.id, older.id);
        assert_eq!(views[1].replies.len(), 1);
        assert_eq!(views[1].replies[0].author_name, "Bob");
    }
}
