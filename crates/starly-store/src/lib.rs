//! # starly-store
//!
//! Durable state for the Starly client. Everything is a string blob behind the
//! [`KeyValueStore`] trait, exactly like browser local storage. Two backends
//! are provided: [`MemoryStore`] for tests and ephemeral sessions, and
//! [`Database`], a SQLite-backed table for real installs.
//!
//! On top of the raw store sit typed repositories: per-user chat lists
//! ([`KvChatRepository`]), the global user directory ([`UserDirectory`]) and
//! the current session pointer ([`SessionStore`]).

pub mod chats;
pub mod database;
pub mod kv;
pub mod migrations;
pub mod session;
pub mod users;

mod error;

pub use chats::{ChatRepository, KvChatRepository};
pub use database::Database;
pub use error::{Result, StoreError};
pub use kv::{KeyValueStore, MemoryStore, SharedStore};
pub use session::SessionStore;
pub use users::UserDirectory;
