use serde::{Deserialize, Serialize};

use crate::error::SharedError;
use crate::models::Chat;
use crate::types::UserId;

/// Envelopes exchanged between tabs over the sync channel.
///
/// Serialized as `{ "type": "SYNC_ALL", "userId": ..., "chats": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEnvelope {
    /// Full chat-list snapshot of one user; receivers replace, never merge.
    #[serde(rename = "SYNC_ALL", rename_all = "camelCase")]
    SyncAll { user_id: UserId, chats: Vec<Chat> },
}

impl SyncEnvelope {
    pub fn sync_all(user_id: UserId, chats: Vec<Chat>) -> Self {
        Self::SyncAll { user_id, chats }
    }

    pub fn user_id(&self) -> &UserId {
        match self {
            Self::SyncAll { user_id, .. } => user_id,
        }
    }

    pub fn to_json(&self) -> Result<String, SharedError> {
        serde_json::to_string(self).map_err(SharedError::Encode)
    }

    pub fn from_json(data: &str) -> Result<Self, SharedError> {
        serde_json::from_str(data).map_err(SharedError::Decode)
    }
}
