//! Domain models persisted as JSON blobs and broadcast between tabs.
//!
//! Field names serialize in camelCase so stored snapshots keep the shape the
//! web client has always written. Every optional field defaults on read, which
//! lets older blobs load without migration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, ChatKind, MessageId, UserId, UserStatus, Visibility};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    #[serde(default)]
    pub show_status: Visibility,
    #[serde(default)]
    pub show_avatar: Visibility,
    #[serde(default)]
    pub show_bio: Visibility,
}

/// Which privacy toggle to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyField {
    Status,
    Avatar,
    Bio,
}

impl PrivacySettings {
    pub fn get(&self, field: PrivacyField) -> Visibility {
        match field {
            PrivacyField::Status => self.show_status,
            PrivacyField::Avatar => self.show_avatar,
            PrivacyField::Bio => self.show_bio,
        }
    }

    pub fn set(&mut self, field: PrivacyField, value: Visibility) {
        match field {
            PrivacyField::Status => self.show_status = value,
            PrivacyField::Avatar => self.show_avatar = value,
            PrivacyField::Bio => self.show_bio = value,
        }
    }
}

/// An account in the local user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Lower-cased, unique, immutable after registration.
    pub username: String,
    pub display_name: String,
    /// Plaintext; the directory is local and offers no real security.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub avatar: String,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Four-digit local lock code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passcode: Option<String>,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_factor_secret: Option<String>,
    #[serde(default)]
    pub privacy: PrivacySettings,
}

impl User {
    /// Copy safe to embed in chat participant lists.
    pub fn without_credentials(&self) -> User {
        let mut view = self.clone();
        view.password = None;
        view.passcode = None;
        view.two_factor_secret = None;
        view
    }

    /// Copy of this profile as another user is allowed to see it.
    ///
    /// Credentials are always stripped; status, avatar and bio follow the
    /// owner's privacy settings.
    pub fn visible_to(&self, is_contact: bool) -> User {
        let mut view = self.without_credentials();
        if !self.privacy.show_status.allows(is_contact) {
            view.status = UserStatus::Offline;
        }
        if !self.privacy.show_avatar.allows(is_contact) {
            view.avatar = String::new();
        }
        if !self.privacy.show_bio.allows(is_contact) {
            view.bio = None;
        }
        view
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Per-admin permission bundle in a group or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPermissions {
    pub can_change_info: bool,
    pub can_delete_messages: bool,
    pub can_ban_users: bool,
    pub can_invite_users: bool,
    pub can_pin_messages: bool,
    pub can_add_admins: bool,
}

impl AdminPermissions {
    pub fn full() -> Self {
        Self {
            can_change_info: true,
            can_delete_messages: true,
            can_ban_users: true,
            can_invite_users: true,
            can_pin_messages: true,
            can_add_admins: true,
        }
    }
}

impl Default for AdminPermissions {
    fn default() -> Self {
        Self {
            can_change_info: true,
            can_delete_messages: true,
            can_ban_users: true,
            can_invite_users: true,
            can_pin_messages: true,
            can_add_admins: false,
        }
    }
}

/// Blanket permissions of plain members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPermissions {
    pub can_send_messages: bool,
    pub can_send_media: bool,
    pub can_add_users: bool,
    pub can_pin_messages: bool,
    pub can_change_info: bool,
}

impl Default for MemberPermissions {
    fn default() -> Self {
        Self {
            can_send_messages: true,
            can_send_media: true,
            can_add_users: false,
            can_pin_messages: false,
            can_change_info: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    /// Always equal to `users.len()`.
    pub count: u32,
    pub users: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub voters: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub question: String,
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub is_multiple_choice: bool,
    /// Distinct users that voted for at least one option.
    #[serde(default)]
    pub total_votes: u32,
}

impl Poll {
    /// Build a fresh poll; option ids are their positions (`"0"`, `"1"`, ...).
    pub fn new(question: impl Into<String>, options: &[&str], is_multiple_choice: bool) -> Self {
        Self {
            question: question.into(),
            options: options
                .iter()
                .enumerate()
                .map(|(i, text)| PollOption {
                    id: i.to_string(),
                    text: (*text).to_string(),
                    voters: Vec::new(),
                })
                .collect(),
            is_multiple_choice,
            total_votes: 0,
        }
    }

    /// Count of distinct voters across all options.
    pub fn distinct_voters(&self) -> u32 {
        let mut seen: Vec<&UserId> = Vec::new();
        for voter in self.options.iter().flat_map(|o| o.voters.iter()) {
            if !seen.contains(&voter) {
                seen.push(voter);
            }
        }
        seen.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_ai: bool,
}

impl Message {
    /// Plain text message with every optional field empty.
    pub fn text(id: MessageId, sender_id: UserId, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id,
            sender_id,
            text: text.into(),
            timestamp,
            image_url: None,
            audio_url: None,
            reply_to_id: None,
            forwarded_from: None,
            poll: None,
            reactions: Vec::new(),
            is_edited: false,
            is_read: false,
            is_ai: false,
        }
    }

    /// System notice ("group created", "x joined").
    pub fn system(text: impl Into<String>, timestamp: i64) -> Self {
        Self::text(MessageId::generate(), UserId::system(), text, timestamp)
    }

    pub fn has_attachment(&self) -> bool {
        self.image_url.is_some() || self.audio_url.is_some()
    }
}

/// Result of resolving a message id inside its chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRef<'a> {
    Found(&'a Message),
    /// The id is referenced (reply, pin) but the message was deleted.
    Missing(&'a MessageId),
}

impl<'a> MessageRef<'a> {
    pub fn found(self) -> Option<&'a Message> {
        match self {
            Self::Found(m) => Some(m),
            Self::Missing(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A conversation aggregate. Messages, pins and replies reference each other
/// only by id inside the same chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    pub participants: Vec<User>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default, rename = "pinnedMessages")]
    pub pinned_message_ids: Vec<MessageId>,
    #[serde(default, rename = "isPinned")]
    pub is_pinned_in_sidebar: bool,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owner of a group or channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub admins: BTreeMap<UserId, AdminPermissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<MemberPermissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_link: Option<String>,
    /// Minimum seconds between two messages of a non-admin member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_mode: Option<u32>,
    #[serde(default)]
    pub is_read_only_for_members: bool,
}

impl Chat {
    /// Empty chat of the given kind; callers fill in group metadata.
    pub fn new(id: ChatId, kind: ChatKind, participants: Vec<User>) -> Self {
        let mut chat = Self {
            id,
            kind,
            participants: Vec::with_capacity(participants.len()),
            messages: Vec::new(),
            last_message: None,
            pinned_message_ids: Vec::new(),
            is_pinned_in_sidebar: false,
            unread_count: 0,
            group_name: None,
            group_avatar: None,
            description: None,
            admin_id: None,
            admins: BTreeMap::new(),
            permissions: None,
            invite_link: None,
            slow_mode: None,
            is_read_only_for_members: false,
        };
        for user in participants {
            chat.add_participant(user);
        }
        chat
    }

    pub fn is_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| &p.id == user_id)
    }

    /// Append a participant unless one with the same id is present.
    /// Returns whether the list changed.
    pub fn add_participant(&mut self, user: User) -> bool {
        if self.is_participant(&user.id) {
            return false;
        }
        self.participants.push(user);
        true
    }

    /// The other side of a private chat, from `me`'s point of view.
    pub fn peer(&self, me: &UserId) -> Option<&User> {
        self.participants.iter().find(|p| &p.id != me)
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    pub fn resolve_message<'a>(&'a self, id: &'a MessageId) -> MessageRef<'a> {
        match self.message(id) {
            Some(m) => MessageRef::Found(m),
            None => MessageRef::Missing(id),
        }
    }

    /// What `message` replies to, if it replies to anything.
    pub fn reply_target<'a>(&'a self, message: &'a Message) -> Option<MessageRef<'a>> {
        message.reply_to_id.as_ref().map(|id| self.resolve_message(id))
    }

    /// Pinned references in pin order, deleted targets included as `Missing`.
    pub fn pinned(&self) -> Vec<MessageRef<'_>> {
        self.pinned_message_ids
            .iter()
            .map(|id| self.resolve_message(id))
            .collect()
    }

    /// Keep the `lastMessage` preview in step with the tail of `messages`.
    pub fn refresh_last_message(&mut self) {
        self.last_message = self.messages.last().cloned();
    }

    /// Two chats of type private cover the same pair of users.
    pub fn same_private_pair(&self, other: &Chat) -> bool {
        if self.kind != ChatKind::Private || other.kind != ChatKind::Private {
            return false;
        }
        let mut a: Vec<&UserId> = self.participants.iter().map(|p| &p.id).collect();
        let mut b: Vec<&UserId> = other.participants.iter().map(|p| &p.id).collect();
        a.sort();
        b.sort();
        a == b
    }
}
