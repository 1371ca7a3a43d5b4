//! Integration tests for comment endpoints: add/reply, nesting
//! validation, notification targeting, ownership, and cascade delete.

use std::sync::Arc;

use serde_json::json;
use tokio::net::TcpListener;

use agromart_server::db::{self, DbPool};
use agromart_server::fanout::FanoutDispatcher;
use agromart_server::mail::{Mailer, RecordingMailer};
use agromart_server::presence::PresenceRegistry;
use agromart_server::routes::build_router;
use agromart_server::state::AppState;
use agromart_server::users;

/// Start the server on a random port. Returns the base URL plus the
/// in-process handles the tests assert against.
async fn start_test_server() -> (String, DbPool, Arc<RecordingMailer>) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = db::init_db(&data_dir).expect("Failed to init DB");
    let mailer = Arc::new(RecordingMailer::new());
    let presence = Arc::new(PresenceRegistry::new());
    let dispatcher = Arc::new(FanoutDispatcher::new(
        presence.clone(),
        Some(mailer.clone() as Arc<dyn Mailer>),
    ));

    let state = AppState {
        db: db.clone(),
        presence,
        dispatcher,
    };

    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), db, mailer)
}

/// Seed a seller with one product plus two buyers.
fn seed_marketplace(db: &DbPool) {
    let conn = db.lock().unwrap();
    users::insert_user(&conn, "seller", "Sam Seller", "sam@example.com", "seller", false).unwrap();
    users::insert_user(&conn, "alice", "Alice", "alice@example.com", "buyer", false).unwrap();
    users::insert_user(&conn, "bob", "Bob", "bob@example.com", "buyer", false).unwrap();
    users::insert_product(&conn, "p1", "seller", "Organic Apples").unwrap();
}

async fn post_comment(
    client: &reqwest::Client,
    base_url: &str,
    author: &str,
    content: &str,
    parent: Option<&str>,
) -> reqwest::Response {
    client
        .post(format!("{base_url}/api/comments"))
        .header("X-User-Id", author)
        .json(&json!({
            "product_id": "p1",
            "content": content,
            "parent_comment_id": parent,
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn top_level_comment_notifies_seller_and_reply_notifies_author() {
    let (base_url, db, _mailer) = start_test_server().await;
    seed_marketplace(&db);

    let client = reqwest::Client::new();

    let resp = post_comment(&client, &base_url, "alice", "Are these in season?", None).await;
    assert_eq!(resp.status(), 201);
    let comment: serde_json::Value = resp.json().await.unwrap();
    let comment_id = comment["id"].as_str().unwrap().to_string();

    // Seller got a comment-kind notification
    let seller_list: Vec<serde_json::Value> = client
        .get(format!("{base_url}/api/notifications"))
        .header("X-User-Id", "seller")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seller_list.len(), 1);
    assert_eq!(seller_list[0]["kind"], "comment");

    // Bob replies; Alice (parent author) is notified, exactly once
    let resp = post_comment(&client, &base_url, "bob", "They are!", Some(&comment_id)).await;
    assert_eq!(resp.status(), 201);

    let alice_list: Vec<serde_json::Value> = client
        .get(format!("{base_url}/api/notifications"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alice_list.len(), 1);
    assert_eq!(alice_list[0]["kind"], "comment");
}

#[tokio::test]
async fn self_reply_produces_zero_notifications() {
    let (base_url, db, _mailer) = start_test_server().await;
    seed_marketplace(&db);

    let client = reqwest::Client::new();
    let comment: serde_json::Value = post_comment(&client, &base_url, "alice", "Anyone?", None)
        .await
        .json()
        .await
        .unwrap();
    let comment_id = comment["id"].as_str().unwrap();

    let resp = post_comment(&client, &base_url, "alice", "Never mind", Some(comment_id)).await;
    assert_eq!(resp.status(), 201);

    let alice_list: Vec<serde_json::Value> = client
        .get(format!("{base_url}/api/notifications"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(alice_list.is_empty());
}

#[tokio::test]
async fn reply_to_reply_is_rejected() {
    let (base_url, db, _mailer) = start_test_server().await;
    seed_marketplace(&db);

    let client = reqwest::Client::new();
    let parent: serde_json::Value = post_comment(&client, &base_url, "alice", "Top", None)
        .await
        .json()
        .await
        .unwrap();
    let reply: serde_json::Value = post_comment(
        &client,
        &base_url,
        "bob",
        "Reply",
        Some(parent["id"].as_str().unwrap()),
    )
    .await
    .json()
    .await
    .unwrap();

    let resp = post_comment(
        &client,
        &base_url,
        "alice",
        "Deeper",
        Some(reply["id"].as_str().unwrap()),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn delete_cascades_to_replies_and_requires_ownership() {
    let (base_url, db, _mailer) = start_test_server().await;
    seed_marketplace(&db);

    let client = reqwest::Client::new();
    let comment: serde_json::Value = post_comment(&client, &base_url, "alice", "Doomed", None)
        .await
        .json()
        .await
        .unwrap();
    let comment_id = comment["id"].as_str().unwrap();
    post_comment(&client, &base_url, "bob", "r1", Some(comment_id)).await;
    post_comment(&client, &base_url, "seller", "r2", Some(comment_id)).await;

    // Bob is not the author
    let resp = client
        .delete(format!("{base_url}/api/comments/{comment_id}"))
        .header("X-User-Id", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Alice is
    let resp = client
        .delete(format!("{base_url}/api/comments/{comment_id}"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let listing: Vec<serde_json::Value> = client
        .get(format!("{base_url}/api/comments/p1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listing.is_empty());
}

#[tokio::test]
async fn listing_nests_replies_under_top_level_comments() {
    let (base_url, db, _mailer) = start_test_server().await;
    seed_marketplace(&db);

    let client = reqwest::Client::new();
    let comment: serde_json::Value = post_comment(&client, &base_url, "alice", "Top", None)
        .await
        .json()
        .await
        .unwrap();
    post_comment(
        &client,
        &base_url,
        "bob",
        "Reply",
        Some(comment["id"].as_str().unwrap()),
    )
    .await;

    let listing: Vec<serde_json::Value> = client
        .get(format!("{base_url}/api/comments/p1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["author_name"], "Alice");
    assert_eq!(listing[0]["replies"].as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["replies"][0]["author_name"], "Bob");
}
