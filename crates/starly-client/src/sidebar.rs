//! Chat list as shown in the sidebar: folder tabs, search and titles.

use starly_shared::{Chat, ChatKind, UserId};

/// Sidebar folder tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Folder {
    #[default]
    All,
    Private,
    Groups,
    Channels,
    Bots,
    Saved,
}

impl Folder {
    pub fn contains(self, kind: ChatKind) -> bool {
        match self {
            Self::All => true,
            Self::Private => kind == ChatKind::Private,
            Self::Groups => kind == ChatKind::Group,
            Self::Channels => kind == ChatKind::Channel,
            Self::Bots => kind == ChatKind::Bot,
            Self::Saved => kind == ChatKind::Saved,
        }
    }
}

/// Display title of `chat` for `me`.
pub fn chat_title(chat: &Chat, me: &UserId) -> String {
    match chat.kind {
        ChatKind::Saved => "Saved Messages".to_string(),
        ChatKind::Group | ChatKind::Channel => chat.group_name.clone().unwrap_or_default(),
        ChatKind::Private | ChatKind::Bot => chat
            .peer(me)
            .map(|peer| peer.display_name.clone())
            .unwrap_or_default(),
    }
}

/// Chats in `folder` whose title contains `query` (case-insensitive),
/// sidebar-pinned first, otherwise in list order.
pub fn visible_chats<'a>(chats: &'a [Chat], me: &UserId, folder: Folder, query: &str) -> Vec<&'a Chat> {
    let query = query.trim().to_lowercase();
    let mut visible: Vec<&Chat> = chats
        .iter()
        .filter(|chat| folder.contains(chat.kind))
        .filter(|chat| query.is_empty() || chat_title(chat, me).to_lowercase().contains(&query))
        .collect();
    visible.sort_by_key(|chat| !chat.is_pinned_in_sidebar);
    visible
}

pub fn unread_total(chats: &[Chat]) -> u32 {
    chats.iter().map(|chat| chat.unread_count).sum()
}
