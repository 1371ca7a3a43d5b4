pub mod actor;
pub mod events;
pub mod handler;
