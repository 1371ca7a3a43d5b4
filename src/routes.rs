use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::chat;
use crate::comments;
use crate::notifications;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// GET /api/health — liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chats", post(chat::send_message))
        .route("/api/chats/seen", post(chat::mark_seen))
        .route("/api/chats/{user_id}", get(chat::get_history))
        .route(
            "/api/notifications",
            get(notifications::get_notifications).post(notifications::create_notification),
        )
        .route(
            "/api/notifications/seen",
            post(notifications::mark_notifications_seen),
        )
        .route(
            "/api/notifications/{id}/read",
            patch(notifications::mark_notification_read),
        )
        .route("/api/comments", post(comments::add_comment))
        // GET takes the segment as a product id; PUT/DELETE as a comment id
        .route(
            "/api/comments/{id}",
            get(comments::get_comments)
                .put(comments::edit_comment)
                .delete(comments::delete_comment),
        )
        .route("/ws", get(ws_handler::ws_upgrade))
        .with_state(state)
}
