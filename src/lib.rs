//! AgroMart realtime backend library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod chat;
pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod fanout;
pub mod mail;
pub mod notifications;
pub mod presence;
pub mod routes;
pub mod state;
pub mod subscriber;
pub mod users;
pub mod ws;
