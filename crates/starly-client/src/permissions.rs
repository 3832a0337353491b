//! Who may do what inside a chat.
//!
//! Private, saved and bot chats are the user's own copy and allow everything.
//! Groups and channels resolve the actor to a [`Role`]: the owner may do
//! anything, admins act per their [`AdminPermissions`] bundle and plain
//! members per the chat's [`MemberPermissions`].

use starly_shared::{AdminPermissions, Chat, ChatKind, MemberPermissions, UserId};

use crate::reducer::Rejected;

/// Something an action needs to be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SendMessages,
    SendMedia,
    PinMessages,
    DeleteMessages,
    ChangeInfo,
    AddAdmins,
    InviteUsers,
    BanUsers,
}

/// The actor's standing in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Private, saved or bot chat.
    Personal,
    Owner,
    Admin(AdminPermissions),
    Member(MemberPermissions),
    /// Not a participant of the group or channel.
    Outsider,
}

pub fn role_of(chat: &Chat, user_id: &UserId) -> Role {
    if !chat.kind.is_multi_user() {
        return Role::Personal;
    }
    if chat.admin_id.as_ref() == Some(user_id) {
        return Role::Owner;
    }
    if let Some(perms) = chat.admins.get(user_id) {
        return Role::Admin(*perms);
    }
    if chat.is_participant(user_id) {
        return Role::Member(chat.permissions.unwrap_or_default());
    }
    Role::Outsider
}

/// Owner or admin; exempt from slow mode and read-only restrictions.
pub fn is_admin(chat: &Chat, user_id: &UserId) -> bool {
    matches!(
        role_of(chat, user_id),
        Role::Personal | Role::Owner | Role::Admin(_)
    )
}

pub fn allows(chat: &Chat, user_id: &UserId, capability: Capability) -> bool {
    use Capability::*;

    match role_of(chat, user_id) {
        Role::Personal | Role::Owner => true,
        Role::Outsider => false,
        Role::Admin(perms) => match capability {
            SendMessages | SendMedia => true,
            PinMessages => perms.can_pin_messages,
            DeleteMessages => perms.can_delete_messages,
            ChangeInfo => perms.can_change_info,
            AddAdmins => perms.can_add_admins,
            InviteUsers => perms.can_invite_users,
            BanUsers => perms.can_ban_users,
        },
        Role::Member(perms) => {
            let muted = chat.kind == ChatKind::Channel || chat.is_read_only_for_members;
            match capability {
                SendMessages => !muted && perms.can_send_messages,
                SendMedia => !muted && perms.can_send_messages && perms.can_send_media,
                PinMessages => perms.can_pin_messages,
                ChangeInfo => perms.can_change_info,
                InviteUsers => perms.can_add_users,
                DeleteMessages | AddAdmins | BanUsers => false,
            }
        }
    }
}

pub fn check(chat: &Chat, user_id: &UserId, capability: Capability) -> Result<(), Rejected> {
    if allows(chat, user_id, capability) {
        Ok(())
    } else {
        Err(Rejected::Forbidden(capability))
    }
}

/// Enforce the chat's slow mode for a non-admin sender at `now_ms`.
pub fn check_slow_mode(chat: &Chat, user_id: &UserId, now_ms: i64) -> Result<(), Rejected> {
    let Some(delay) = chat.slow_mode.filter(|secs| *secs > 0) else {
        return Ok(());
    };
    if is_admin(chat, user_id) {
        return Ok(());
    }
    let Some(last) = chat
        .messages
        .iter()
        .rev()
        .find(|m| &m.sender_id == user_id)
    else {
        return Ok(());
    };

    let wait_ms = i64::from(delay) * 1000 - (now_ms - last.timestamp);
    if wait_ms > 0 {
        let retry_after_secs = u32::try_from((wait_ms + 999) / 1000).unwrap_or(delay);
        return Err(Rejected::SlowMode { retry_after_secs });
    }
    Ok(())
}
