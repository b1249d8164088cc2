//! # localmighty-store
//!
//! Durable server-side store for LocalMighty, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every synced
//! domain (messages, notifications, calls, contacts, device status), for
//! pairing tokens, and for the hub (clipboard, files, vault).
//!
//! Last-writer-wins state is only ever mutated through the `overwrite_*`
//! methods so that a future merge strategy has a single place to land.

pub mod auth;
pub mod calls;
pub mod contacts;
pub mod database;
pub mod device;
pub mod hub_files;
pub mod hub_text;
pub mod hub_vault;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;

mod error;

pub use contacts::phone_suffix;
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
