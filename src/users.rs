//! Read-side access to users and products. Both are owned by the account
//! and listing subsystems; the realtime core references them for
//! validation, display names, and notification targeting.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::db::models::{Product, User};

pub fn find_user(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, email, role, verified, email_notifications, created_at
         FROM users WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
                verified: row.get(4)?,
                email_notifications: row.get(5)?,
                created_at: row.get(6)?,
            })
        },
    )
    .optional()
}

pub fn find_product(conn: &Connection, id: &str) -> rusqlite::Result<Option<Product>> {
    conn.query_row(
        "SELECT id, seller_id, title, created_at FROM products WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(Product {
                id: row.get(0)?,
                seller_id: row.get(1)?,
                title: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .optional()
}

/// Display name for a user, with a fallback for dangling references.
pub fn display_name(conn: &Connection, id: &str) -> String {
    conn.query_row(
        "SELECT name FROM users WHERE id = ?1",
        rusqlite::params![id],
        |row| row.get(0),
    )
    .unwrap_or_else(|_| "Unknown".to_string())
}

/// Insert a user row. Registration itself lives in the account subsystem;
/// this is the seam it (and the test suite) writes through.
pub fn insert_user(
    conn: &Connection,
    id: &str,
    name: &str,
    email: &str,
    role: &str,
    email_notifications: bool,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, role, verified, email_notifications, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
        rusqlite::params![id, name, email, role, email_notifications, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Insert a product row. Listing management lives in the product
/// subsystem; comments only need the row to exist.
pub fn insert_product(
    conn: &Connection,
    id: &str,
    seller_id: &str,
    title: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO products (id, seller_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, seller_id, title, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
