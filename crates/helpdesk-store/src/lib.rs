//! # helpdesk-store
//!
//! SQLite-backed notification store for the service desk.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection`, provides typed CRUD helpers for notifications and
//! their per-viewer read marks, and implements
//! [`helpdesk_shared::NotificationStore`] so it can back a
//! [`helpdesk_shared::NotificationFeed`].

pub mod database;
pub mod migrations;
pub mod notifications;

mod error;

pub use database::Database;
pub use error::StoreError;
