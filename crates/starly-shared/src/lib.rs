//! # starly-shared
//!
//! Types shared by every Starly crate: ids, the persisted domain models, the
//! cross-tab sync envelope, generated identities and inline media helpers.

pub mod constants;
pub mod error;
pub mod identity;
pub mod media;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::{MediaError, SharedError};
pub use models::*;
pub use types::*;
