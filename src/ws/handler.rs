use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection. The client announces its
/// own user id on connect, mirroring the join event of the original web
/// client; identity verification is an upstream concern.
#[derive(Debug, Deserialize)]
pub struct WsConnectQuery {
    pub user_id: String,
}

/// Close code for a connect attempt with no usable user id.
const CLOSE_MISSING_USER: u16 = 4000;

/// GET /ws?user_id=...
/// WebSocket upgrade endpoint. On success, spawns an actor for the
/// connection; with an empty user id, upgrades then immediately closes.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if params.user_id.trim().is_empty() {
        tracing::warn!("WebSocket connect without user id");
        return ws.on_upgrade(move |mut socket: WebSocket| async move {
            let close_frame = CloseFrame {
                code: CLOSE_MISSING_USER,
                reason: "user_id required".into(),
            };
            let _ = socket.send(Message::Close(Some(close_frame))).await;
        });
    }

    ws.on_upgrade(move |socket| actor::run_connection(socket, state, params.user_id))
}
