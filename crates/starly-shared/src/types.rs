use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{AI_ASSISTANT_ID, SAVED_MESSAGES_ID, SYSTEM_SENDER_ID};

// User identity = short random id assigned at registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Sentinel sender of system notices ("group created", "x joined").
    pub fn system() -> Self {
        Self(SYSTEM_SENDER_ID.to_string())
    }

    /// Fixed identity of the AI assistant.
    pub fn assistant() -> Self {
        Self(AI_ASSISTANT_ID.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_SENDER_ID
    }

    pub fn is_assistant(&self) -> bool {
        self.0 == AI_ASSISTANT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id for a newly created chat, prefixed by its kind
    /// (`chat_…`, `group_…`, `channel_…`).
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}_{}", Uuid::new_v4().simple()))
    }

    pub fn saved() -> Self {
        Self(SAVED_MESSAGES_ID.to_string())
    }

    pub fn assistant() -> Self {
        Self(AI_ASSISTANT_ID.to_string())
    }

    pub fn is_saved(&self) -> bool {
        self.0 == SAVED_MESSAGES_ID
    }

    pub fn is_assistant(&self) -> bool {
        self.0 == AI_ASSISTANT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Channel,
    Saved,
    Bot,
}

impl ChatKind {
    /// Group-like chats carry admins, member permissions and slow mode.
    pub fn is_multi_user(self) -> bool {
        matches!(self, Self::Group | Self::Channel)
    }

    /// Prefix used when generating ids for new chats of this kind.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Private => "chat",
            Self::Group => "group",
            Self::Channel => "channel",
            Self::Saved => "saved",
            Self::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserStatus {
    #[default]
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "offline")]
    Offline,
    #[serde(rename = "typing...")]
    Typing,
}

/// Audience of a profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    All,
    Contacts,
    None,
}

impl Visibility {
    pub fn allows(self, is_contact: bool) -> bool {
        match self {
            Self::All => true,
            Self::Contacts => is_contact,
            Self::None => false,
        }
    }

    /// Settings toggle: anything visible becomes hidden, hidden becomes public.
    pub fn toggled(self) -> Self {
        match self {
            Self::All | Self::Contacts => Self::None,
            Self::None => Self::All,
        }
    }
}
