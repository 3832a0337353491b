//! Cross-tab synchronisation transport.
//!
//! A [`SyncHub`] plays the role of a browser origin: every open client context
//! of the same install holds a [`SyncChannel`] on the same named channel and
//! broadcasts full chat-list snapshots to the others. Delivery is
//! best-effort and last-writer-wins; nothing is merged here.

pub mod channel;
pub mod error;
pub mod hub;

pub use channel::{SyncChannel, SyncSubscription};
pub use error::SyncError;
pub use hub::{Frame, OriginId, SyncHub};
