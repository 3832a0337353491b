//! Per-user chat lists.

use starly_shared::constants::CHATS_KEY_PREFIX;
use starly_shared::{Chat, UserId};

use crate::error::Result;
use crate::kv::{read_json, write_json, SharedStore};

/// Typed persistence of one user's full chat list.
///
/// The reducer and the session only see this trait, so the storage technology
/// can change without touching them.
pub trait ChatRepository: Send + Sync {
    /// The last persisted list, or `None` if the user never saved one (or the
    /// stored blob is unreadable).
    fn load(&self, user_id: &UserId) -> Result<Option<Vec<Chat>>>;

    /// Overwrite the user's list.
    fn save(&self, user_id: &UserId, chats: &[Chat]) -> Result<()>;
}

/// [`ChatRepository`] over any key-value store, one `chats_{user_id}` key per
/// user.
#[derive(Clone)]
pub struct KvChatRepository {
    store: SharedStore,
}

impl KvChatRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn key_for(user_id: &UserId) -> String {
        format!("{CHATS_KEY_PREFIX}{user_id}")
    }
}

impl ChatRepository for KvChatRepository {
    fn load(&self, user_id: &UserId) -> Result<Option<Vec<Chat>>> {
        read_json(self.store.as_ref(), &Self::key_for(user_id))
    }

    fn save(&self, user_id: &UserId, chats: &[Chat]) -> Result<()> {
        tracing::debug!(user = %user_id, count = chats.len(), "saving chat list");
        write_json(self.store.as_ref(), &Self::key_for(user_id), chats)
    }
}
