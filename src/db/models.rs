//! Database row types. These correspond 1:1 to the SQLite schema
//! defined in migrations.rs.

use serde::{Deserialize, Serialize};

/// User record in the users table. Users are owned by the account
/// subsystem; the realtime core only reads them.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub verified: bool,
    pub email_notifications: bool,
    pub created_at: String,
}

/// Product listing. Referenced by comments; the seller is the default
/// notification target for top-level comments.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub created_at: String,
}

/// A chat message between two users. Immutable once created, except for
/// the seen flag which flips when the receiver acknowledges it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub seen: bool,
    pub created_at: String,
}

/// A notification to a recipient. Never deleted; the seen flag flips on
/// single-item read or bulk mark-as-seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub kind: String,
    pub message: String,
    pub seen: bool,
    pub created_at: String,
}

/// A product comment. parent_id is null for top-level comments; replies
/// must reference a top-level comment (one level of nesting, enforced at
/// write time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub product_id: String,
    pub author_id: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
