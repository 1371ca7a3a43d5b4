use std::sync::Arc;

use crate::db::DbPool;
use crate::fanout::FanoutDispatcher;
use crate::presence::PresenceRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// In-memory registry of online users and their connections
    pub presence: Arc<PresenceRegistry>,
    /// Best-effort delivery of persisted records to live connections
    pub dispatcher: Arc<FanoutDispatcher>,
}
