//! Typed commands accepted by the chat reducer.

use std::collections::BTreeMap;

use starly_shared::{AdminPermissions, Chat, MemberPermissions, MessageId, Poll, User, UserId};

/// Payload of a new outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessage {
    pub text: String,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub poll: Option<Poll>,
    pub reply_to_id: Option<MessageId>,
    pub forwarded_from: Option<String>,
}

impl SendMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn reply_to(mut self, id: MessageId) -> Self {
        self.reply_to_id = Some(id);
        self
    }

    pub fn with_image(mut self, data_uri: impl Into<String>) -> Self {
        self.image_url = Some(data_uri.into());
        self
    }

    pub fn with_audio(mut self, data_uri: impl Into<String>) -> Self {
        self.audio_url = Some(data_uri.into());
        self
    }

    pub fn with_poll(mut self, poll: Poll) -> Self {
        self.poll = Some(poll);
        self
    }

    pub fn forwarded_from(mut self, origin: impl Into<String>) -> Self {
        self.forwarded_from = Some(origin.into());
        self
    }

    /// Carries an image, a voice note or a poll.
    pub fn has_media(&self) -> bool {
        self.image_url.is_some() || self.audio_url.is_some() || self.poll.is_some()
    }
}

/// Shallow patch of a chat's settings; every `Some` field replaces the
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPatch {
    pub group_name: Option<String>,
    pub group_avatar: Option<String>,
    pub description: Option<String>,
    pub admins: Option<BTreeMap<UserId, AdminPermissions>>,
    pub permissions: Option<MemberPermissions>,
    pub invite_link: Option<String>,
    /// `Some(0)` turns slow mode off.
    pub slow_mode: Option<u32>,
    pub is_read_only_for_members: Option<bool>,
}

impl ChatPatch {
    pub fn changes_admins(&self) -> bool {
        self.admins.is_some()
    }
}

/// One reducer command. Everything except [`ChatAction::CreateChat`] acts on
/// the targeted chat (normally the active one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    Send(SendMessage),
    Edit { id: MessageId, text: String },
    Delete { id: MessageId },
    PinMessage { id: MessageId },
    UnpinMessage { id: MessageId },
    VotePoll { message_id: MessageId, option_id: String },
    ToggleSidebarPin,
    UpdateSettings(ChatPatch),
    AddParticipant { user: User, announce: bool },
    RemoveParticipant { user_id: UserId },
    ClearHistory,
    UpdateChatInfo {
        group_name: Option<String>,
        description: Option<String>,
        slow_mode: Option<u32>,
    },
    React { message_id: MessageId, emoji: String },
    MarkRead,
    CreateChat(Box<Chat>),
    DeleteChat,
    /// Create or overwrite the streaming AI reply with the text accumulated
    /// so far.
    UpsertBotReply { message_id: MessageId, text: String },
}

impl ChatAction {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Send(_) => "send",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "delete",
            Self::PinMessage { .. } => "pin_message",
            Self::UnpinMessage { .. } => "unpin_message",
            Self::VotePoll { .. } => "vote_poll",
            Self::ToggleSidebarPin => "toggle_sidebar_pin",
            Self::UpdateSettings(_) => "update_settings",
            Self::AddParticipant { .. } => "add_participant",
            Self::RemoveParticipant { .. } => "remove_participant",
            Self::ClearHistory => "clear_history",
            Self::UpdateChatInfo { .. } => "update_chat_info",
            Self::React { .. } => "react",
            Self::MarkRead => "mark_read",
            Self::CreateChat(_) => "create_chat",
            Self::DeleteChat => "delete_chat",
            Self::UpsertBotReply { .. } => "upsert_bot_reply",
        }
    }
}
