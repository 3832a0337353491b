//! The chat-list reducer: the single place where chats change.
//!
//! [`reduce`] is pure. It takes the current list, who is acting on which chat
//! and the current time, and returns either the next list or a [`Rejected`]
//! reason. Callers treat a rejection as "nothing happened".

use thiserror::Error;
use tracing::debug;

use starly_shared::media::check_attachment;
use starly_shared::{Chat, ChatId, ChatKind, Message, MessageId, Reaction, User, UserId};

use crate::action::{ChatAction, ChatPatch, SendMessage};
use crate::permissions::{self, Capability};

/// Who is acting, on which chat, and when.
#[derive(Debug, Clone)]
pub struct ReduceContext {
    pub actor: Option<User>,
    /// The chat actions apply to; normally the active chat.
    pub target: Option<ChatId>,
    /// Milliseconds since the Unix epoch.
    pub now_ms: i64,
}

impl ReduceContext {
    pub fn new(actor: Option<&User>, target: Option<&ChatId>, now_ms: i64) -> Self {
        Self {
            actor: actor.cloned(),
            target: target.cloned(),
            now_ms,
        }
    }
}

/// Why an action left the list untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    #[error("no user is logged in")]
    NotAuthenticated,

    #[error("no chat is active")]
    NoActiveChat,

    #[error("chat not found")]
    ChatNotFound,

    #[error("message not found")]
    MessageNotFound,

    #[error("message has no poll")]
    PollNotFound,

    #[error("poll option not found")]
    PollOptionNotFound,

    #[error("not allowed: {0:?}")]
    Forbidden(Capability),

    #[error("only the sender may edit a message")]
    NotSender,

    #[error("slow mode: retry in {retry_after_secs}s")]
    SlowMode { retry_after_secs: u32 },

    #[error("message is empty")]
    EmptyMessage,

    #[error("attachment too large")]
    AttachmentTooLarge,

    #[error("chat already exists")]
    DuplicateChat,

    #[error("the owner cannot be removed")]
    CannotRemoveOwner,

    #[error("membership of this chat cannot change")]
    FixedMembership,

    #[error("not the AI assistant chat")]
    NotABotChat,
}

/// Apply `action` to `chats`.
pub fn reduce(chats: &[Chat], ctx: &ReduceContext, action: ChatAction) -> Result<Vec<Chat>, Rejected> {
    let actor = ctx.actor.as_ref().ok_or(Rejected::NotAuthenticated)?;

    if let ChatAction::CreateChat(chat) = action {
        return create_chat(chats, *chat);
    }

    let target = ctx.target.as_ref().ok_or(Rejected::NoActiveChat)?;
    let mut next = chats.to_vec();

    if let ChatAction::DeleteChat = action {
        let before = next.len();
        next.retain(|c| &c.id != target);
        if next.len() == before {
            return Err(Rejected::ChatNotFound);
        }
        return Ok(next);
    }

    if matches!(action, ChatAction::Send(_)) && target.is_saved() && !next.iter().any(|c| &c.id == target) {
        debug!("materialising saved messages chat");
        next.insert(0, Chat::new(target.clone(), ChatKind::Saved, vec![actor.clone()]));
    }

    let chat = next
        .iter_mut()
        .find(|c| &c.id == target)
        .ok_or(Rejected::ChatNotFound)?;
    apply(chat, actor, ctx.now_ms, action)?;
    Ok(next)
}

fn create_chat(chats: &[Chat], chat: Chat) -> Result<Vec<Chat>, Rejected> {
    if chats.iter().any(|c| c.id == chat.id || c.same_private_pair(&chat)) {
        return Err(Rejected::DuplicateChat);
    }
    let mut next = Vec::with_capacity(chats.len() + 1);
    next.push(chat);
    next.extend_from_slice(chats);
    Ok(next)
}

fn apply(chat: &mut Chat, actor: &User, now_ms: i64, action: ChatAction) -> Result<(), Rejected> {
    match action {
        ChatAction::Send(message) => send(chat, actor, now_ms, message),
        ChatAction::Edit { id, text } => {
            let message = chat.message_mut(&id).ok_or(Rejected::MessageNotFound)?;
            if message.sender_id != actor.id {
                return Err(Rejected::NotSender);
            }
            message.text = text;
            message.is_edited = true;
            if chat.last_message.as_ref().is_some_and(|m| m.id == id) {
                chat.refresh_last_message();
            }
            Ok(())
        }
        ChatAction::Delete { id } => {
            let message = chat.message(&id).ok_or(Rejected::MessageNotFound)?;
            if message.sender_id != actor.id {
                permissions::check(chat, &actor.id, Capability::DeleteMessages)?;
            }
            // Pins and replies pointing here are left dangling on purpose;
            // readers resolve them to `MessageRef::Missing`.
            chat.messages.retain(|m| m.id != id);
            chat.refresh_last_message();
            Ok(())
        }
        ChatAction::PinMessage { id } => {
            permissions::check(chat, &actor.id, Capability::PinMessages)?;
            if chat.message(&id).is_none() {
                return Err(Rejected::MessageNotFound);
            }
            if !chat.pinned_message_ids.contains(&id) {
                chat.pinned_message_ids.push(id);
            }
            Ok(())
        }
        ChatAction::UnpinMessage { id } => {
            permissions::check(chat, &actor.id, Capability::PinMessages)?;
            chat.pinned_message_ids.retain(|p| p != &id);
            Ok(())
        }
        ChatAction::VotePoll { message_id, option_id } => vote(chat, &actor.id, &message_id, &option_id),
        ChatAction::ToggleSidebarPin => {
            chat.is_pinned_in_sidebar = !chat.is_pinned_in_sidebar;
            Ok(())
        }
        ChatAction::UpdateSettings(patch) => update_settings(chat, &actor.id, patch),
        ChatAction::AddParticipant { user, announce } => {
            if !chat.kind.is_multi_user() {
                return Err(Rejected::FixedMembership);
            }
            if user.id != actor.id {
                permissions::check(chat, &actor.id, Capability::InviteUsers)?;
            }
            let notice = format!("{} به گروه پیوست.", user.display_name);
            if chat.add_participant(user) && announce {
                let timestamp = next_timestamp(chat, now_ms);
                chat.messages.push(Message::system(notice, timestamp));
                chat.refresh_last_message();
            }
            Ok(())
        }
        ChatAction::RemoveParticipant { user_id } => {
            if !chat.kind.is_multi_user() {
                return Err(Rejected::FixedMembership);
            }
            if chat.admin_id.as_ref() == Some(&user_id) {
                return Err(Rejected::CannotRemoveOwner);
            }
            if user_id != actor.id {
                permissions::check(chat, &actor.id, Capability::BanUsers)?;
            }
            chat.participants.retain(|p| p.id != user_id);
            chat.admins.remove(&user_id);
            Ok(())
        }
        ChatAction::ClearHistory => {
            chat.messages.clear();
            chat.last_message = None;
            chat.pinned_message_ids.clear();
            Ok(())
        }
        ChatAction::UpdateChatInfo {
            group_name,
            description,
            slow_mode,
        } => {
            permissions::check(chat, &actor.id, Capability::ChangeInfo)?;
            if let Some(name) = group_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
                chat.group_name = Some(name);
            }
            if let Some(description) = description {
                chat.description = Some(description).filter(|d| !d.trim().is_empty());
            }
            if let Some(secs) = slow_mode {
                chat.slow_mode = Some(secs).filter(|s| *s > 0);
            }
            Ok(())
        }
        ChatAction::React { message_id, emoji } => {
            let message = chat.message_mut(&message_id).ok_or(Rejected::MessageNotFound)?;
            toggle_reaction(&mut message.reactions, &actor.id, emoji);
            Ok(())
        }
        ChatAction::MarkRead => {
            chat.unread_count = 0;
            for message in chat.messages.iter_mut().filter(|m| m.sender_id != actor.id) {
                message.is_read = true;
            }
            Ok(())
        }
        ChatAction::UpsertBotReply { message_id, text } => {
            if chat.kind != ChatKind::Bot {
                return Err(Rejected::NotABotChat);
            }
            match chat.message_mut(&message_id) {
                Some(reply) => reply.text = text,
                None => {
                    let timestamp = next_timestamp(chat, now_ms);
                    let mut reply = Message::text(message_id, UserId::assistant(), text, timestamp);
                    reply.is_ai = true;
                    chat.messages.push(reply);
                }
            }
            chat.refresh_last_message();
            Ok(())
        }
        // List-level actions are resolved in `reduce`.
        ChatAction::CreateChat(_) | ChatAction::DeleteChat => Ok(()),
    }
}

fn send(chat: &mut Chat, actor: &User, now_ms: i64, payload: SendMessage) -> Result<(), Rejected> {
    if payload.text.trim().is_empty() && !payload.has_media() {
        return Err(Rejected::EmptyMessage);
    }
    permissions::check(chat, &actor.id, Capability::SendMessages)?;
    if payload.has_media() {
        permissions::check(chat, &actor.id, Capability::SendMedia)?;
    }
    for uri in [&payload.image_url, &payload.audio_url].into_iter().flatten() {
        check_attachment(uri).map_err(|_| Rejected::AttachmentTooLarge)?;
    }
    permissions::check_slow_mode(chat, &actor.id, now_ms)?;

    let reply_to_id = payload.reply_to_id.filter(|id| {
        let found = chat.message(id).is_some();
        if !found {
            debug!(reply_to = %id, "dropping reply to unknown message");
        }
        found
    });
    let poll = payload.poll.map(|mut poll| {
        poll.total_votes = poll.distinct_voters();
        poll
    });

    let mut message = Message::text(
        MessageId::generate(),
        actor.id.clone(),
        payload.text,
        next_timestamp(chat, now_ms),
    );
    message.image_url = payload.image_url;
    message.audio_url = payload.audio_url;
    message.reply_to_id = reply_to_id;
    message.forwarded_from = payload.forwarded_from;
    message.poll = poll;

    chat.messages.push(message.clone());
    chat.last_message = Some(message);
    chat.unread_count = 0;
    Ok(())
}

fn vote(chat: &mut Chat, voter: &UserId, message_id: &MessageId, option_id: &str) -> Result<(), Rejected> {
    let message = chat.message_mut(message_id).ok_or(Rejected::MessageNotFound)?;
    let poll = message.poll.as_mut().ok_or(Rejected::PollNotFound)?;
    let chosen = poll
        .options
        .iter()
        .find(|o| o.id == option_id)
        .ok_or(Rejected::PollOptionNotFound)?;
    let retracting = chosen.voters.contains(voter);

    for option in &mut poll.options {
        if option.id == option_id {
            if retracting {
                option.voters.retain(|v| v != voter);
            } else {
                option.voters.push(voter.clone());
            }
        } else if !poll.is_multiple_choice {
            option.voters.retain(|v| v != voter);
        }
    }
    poll.total_votes = poll.distinct_voters();
    Ok(())
}

fn update_settings(chat: &mut Chat, actor: &UserId, patch: ChatPatch) -> Result<(), Rejected> {
    permissions::check(chat, actor, Capability::ChangeInfo)?;
    if patch.changes_admins() {
        permissions::check(chat, actor, Capability::AddAdmins)?;
    }

    if let Some(name) = patch.group_name {
        chat.group_name = Some(name);
    }
    if let Some(avatar) = patch.group_avatar {
        chat.group_avatar = Some(avatar);
    }
    if let Some(description) = patch.description {
        chat.description = Some(description);
    }
    if let Some(mut admins) = patch.admins {
        admins.retain(|id, _| chat.is_participant(id));
        chat.admins = admins;
    }
    if let Some(permissions) = patch.permissions {
        chat.permissions = Some(permissions);
    }
    if let Some(link) = patch.invite_link {
        chat.invite_link = Some(link);
    }
    if let Some(secs) = patch.slow_mode {
        chat.slow_mode = Some(secs).filter(|s| *s > 0);
    }
    if let Some(read_only) = patch.is_read_only_for_members {
        chat.is_read_only_for_members = read_only;
    }
    Ok(())
}

fn toggle_reaction(reactions: &mut Vec<Reaction>, user: &UserId, emoji: String) {
    match reactions.iter_mut().find(|r| r.emoji == emoji) {
        Some(reaction) => {
            if reaction.users.contains(user) {
                reaction.users.retain(|u| u != user);
            } else {
                reaction.users.push(user.clone());
            }
            reaction.count = reaction.users.len() as u32;
        }
        None => reactions.push(Reaction {
            emoji,
            count: 1,
            users: vec![user.clone()],
        }),
    }
    reactions.retain(|r| !r.users.is_empty());
}

/// Timestamps stay strictly increasing inside a chat even if the clock
/// stalls or steps back.
fn next_timestamp(chat: &Chat, now_ms: i64) -> i64 {
    chat.messages
        .last()
        .map_or(now_ms, |last| now_ms.max(last.timestamp + 1))
}

#[cfg(test)]
mod tests {
    use starly_shared::identity::{assistant_user, new_user};
    use starly_shared::media::encode_data_uri;
    use starly_shared::constants::MAX_ATTACHMENT_BYTES;
    use starly_shared::{AdminPermissions, Poll};

    use super::*;

    fn alice() -> User {
        let mut user = new_user("alice", "Alice", None);
        user.id = UserId::new("alice00001");
        user
    }

    fn bob() -> User {
        let mut user = new_user("bob", "Bob", None);
        user.id = UserId::new("bob0000001");
        user
    }

    fn ctx(chat: &ChatId) -> ReduceContext {
        ReduceContext::new(Some(&alice()), Some(chat), 1_000)
    }

    fn private_chat() -> Chat {
        Chat::new(ChatId::new("chat_ab"), ChatKind::Private, vec![alice(), bob()])
    }

    fn with_message(mut chat: Chat, id: &str, sender: &User, text: &str) -> Chat {
        let ts = chat.messages.last().map_or(1, |m| m.timestamp + 1);
        chat.messages.push(Message::text(MessageId::new(id), sender.id.clone(), text, ts));
        chat.refresh_last_message();
        chat
    }

    fn owned_group() -> Chat {
        let mut chat = Chat::new(ChatId::new("group_1"), ChatKind::Group, vec![alice(), bob()]);
        chat.admin_id = Some(alice().id);
        chat
    }

    #[test]
    fn pin_twice_then_unpin_leaves_it_absent() {
        let chats = vec![with_message(private_chat(), "m1", &bob(), "hi")];
        let id = ChatId::new("chat_ab");
        let x = MessageId::new("m1");

        let chats = reduce(&chats, &ctx(&id), ChatAction::PinMessage { id: x.clone() }).unwrap();
        let chats = reduce(&chats, &ctx(&id), ChatAction::PinMessage { id: x.clone() }).unwrap();
        assert_eq!(chats[0].pinned_message_ids, vec![x.clone()]);

        let chats = reduce(&chats, &ctx(&id), ChatAction::UnpinMessage { id: x.clone() }).unwrap();
        assert!(!chats[0].pinned_message_ids.contains(&x));
    }

    #[test]
    fn single_choice_vote_moves_the_voter() {
        let mut chat = private_chat();
        let mut poll_msg = Message::text(MessageId::new("p"), bob().id, "", 1);
        poll_msg.poll = Some(Poll::new("lunch?", &["A", "B"], false));
        chat.messages.push(poll_msg);
        let id = chat.id.clone();
        let vote = |option: &str| ChatAction::VotePoll {
            message_id: MessageId::new("p"),
            option_id: option.to_string(),
        };

        let chats = reduce(&[chat], &ctx(&id), vote("0")).unwrap();
        let chats = reduce(&chats, &ctx(&id), vote("1")).unwrap();
        let poll = chats[0].messages[0].poll.as_ref().unwrap();
        assert!(poll.options[0].voters.is_empty());
        assert_eq!(poll.options[1].voters, vec![alice().id]);
        assert_eq!(poll.total_votes, 1);

        let as_bob = ReduceContext::new(Some(&bob()), Some(&id), 2_000);
        let chats = reduce(&chats, &as_bob, vote("0")).unwrap();
        assert_eq!(chats[0].messages[0].poll.as_ref().unwrap().total_votes, 2);
    }

    #[test]
    fn multiple_choice_counts_distinct_users() {
        let mut chat = private_chat();
        let mut poll_msg = Message::text(MessageId::new("p"), bob().id, "", 1);
        poll_msg.poll = Some(Poll::new("pick", &["A", "B"], true));
        chat.messages.push(poll_msg);
        let id = chat.id.clone();

        let mut chats = vec![chat];
        for option in ["0", "1"] {
            chats = reduce(
                &chats,
                &ctx(&id),
                ChatAction::VotePoll {
                    message_id: MessageId::new("p"),
                    option_id: option.into(),
                },
            )
            .unwrap();
        }
        let poll = chats[0].messages[0].poll.as_ref().unwrap();
        assert_eq!(poll.options[0].voters.len(), 1);
        assert_eq!(poll.options[1].voters.len(), 1);
        assert_eq!(poll.total_votes, 1);
    }

    #[test]
    fn voting_on_missing_poll_is_rejected() {
        let chats = vec![with_message(private_chat(), "m1", &bob(), "no poll here")];
        let id = ChatId::new("chat_ab");
        let action = |message: &str| ChatAction::VotePoll {
            message_id: MessageId::new(message),
            option_id: "0".into(),
        };
        assert_eq!(reduce(&chats, &ctx(&id), action("m1")), Err(Rejected::PollNotFound));
        assert_eq!(reduce(&chats, &ctx(&id), action("gone")), Err(Rejected::MessageNotFound));
    }

    #[test]
    fn send_resets_unread_and_updates_preview() {
        let mut chat = private_chat();
        chat.unread_count = 5;
        let id = chat.id.clone();

        let chats = reduce(&[chat], &ctx(&id), ChatAction::Send(SendMessage::text("hello"))).unwrap();
        assert_eq!(chats[0].unread_count, 0);
        assert_eq!(chats[0].last_message.as_ref().unwrap().text, "hello");
        assert_eq!(chats[0].messages.len(), 1);
    }

    #[test]
    fn send_to_missing_saved_chat_materialises_it() {
        let saved = ChatId::saved();
        let chats = reduce(&[private_chat()], &ctx(&saved), ChatAction::Send(SendMessage::text("note"))).unwrap();

        let saved_chats: Vec<&Chat> = chats.iter().filter(|c| c.kind == ChatKind::Saved).collect();
        assert_eq!(saved_chats.len(), 1);
        assert_eq!(saved_chats[0].messages.len(), 1);
        assert_eq!(saved_chats[0].messages[0].text, "note");
        assert_eq!(saved_chats[0].participants, vec![alice()]);
    }

    #[test]
    fn send_without_user_or_chat_is_a_noop() {
        let chats = vec![private_chat()];
        let id = ChatId::new("chat_ab");
        let anonymous = ReduceContext::new(None, Some(&id), 1);
        let nowhere = ReduceContext::new(Some(&alice()), None, 1);

        assert_eq!(
            reduce(&chats, &anonymous, ChatAction::Send(SendMessage::text("x"))),
            Err(Rejected::NotAuthenticated)
        );
        assert_eq!(
            reduce(&chats, &nowhere, ChatAction::Send(SendMessage::text("x"))),
            Err(Rejected::NoActiveChat)
        );
        assert_eq!(
            reduce(&chats, &ctx(&id), ChatAction::Send(SendMessage::text("   "))),
            Err(Rejected::EmptyMessage)
        );
    }

    #[test]
    fn send_rejects_oversized_attachment() {
        let id = ChatId::new("chat_ab");
        let huge = encode_data_uri("image/png", &vec![0u8; MAX_ATTACHMENT_BYTES + 1]);
        assert_eq!(
            reduce(&[private_chat()], &ctx(&id), ChatAction::Send(SendMessage::default().with_image(huge))),
            Err(Rejected::AttachmentTooLarge)
        );
    }

    #[test]
    fn timestamps_strictly_increase() {
        let id = ChatId::new("chat_ab");
        let frozen = ReduceContext::new(Some(&alice()), Some(&id), 500);
        let mut chats = vec![private_chat()];
        for text in ["a", "b", "c"] {
            chats = reduce(&chats, &frozen, ChatAction::Send(SendMessage::text(text))).unwrap();
        }
        let ts: Vec<i64> = chats[0].messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(ts, vec![500, 501, 502]);
    }

    #[test]
    fn unresolvable_reply_is_dropped() {
        let chats = vec![with_message(private_chat(), "m1", &bob(), "hi")];
        let id = ChatId::new("chat_ab");

        let chats = reduce(
            &chats,
            &ctx(&id),
            ChatAction::Send(SendMessage::text("re").reply_to(MessageId::new("m1"))),
        )
        .unwrap();
        let chats = reduce(
            &chats,
            &ctx(&id),
            ChatAction::Send(SendMessage::text("re?").reply_to(MessageId::new("nope"))),
        )
        .unwrap();

        assert_eq!(chats[0].messages[1].reply_to_id, Some(MessageId::new("m1")));
        assert_eq!(chats[0].messages[2].reply_to_id, None);
    }

    #[test]
    fn deleting_reply_and_pin_targets_leaves_missing_refs() {
        let id = ChatId::new("chat_ab");
        let mut chats = vec![with_message(private_chat(), "m1", &alice(), "target")];
        chats = reduce(&chats, &ctx(&id), ChatAction::Send(SendMessage::text("reply").reply_to(MessageId::new("m1")))).unwrap();
        chats = reduce(&chats, &ctx(&id), ChatAction::PinMessage { id: MessageId::new("m1") }).unwrap();

        chats = reduce(&chats, &ctx(&id), ChatAction::Delete { id: MessageId::new("m1") }).unwrap();

        let chat = &chats[0];
        assert_eq!(chat.messages.len(), 1);
        assert!(chat.reply_target(&chat.messages[0]).unwrap().is_missing());
        assert!(chat.pinned()[0].is_missing());
        assert_eq!(chat.last_message.as_ref().unwrap().text, "reply");
    }

    #[test]
    fn only_the_sender_edits() {
        let chats = vec![with_message(with_message(private_chat(), "mine", &alice(), "a"), "theirs", &bob(), "b")];
        let id = ChatId::new("chat_ab");

        let chats = reduce(&chats, &ctx(&id), ChatAction::Edit { id: MessageId::new("mine"), text: "a2".into() }).unwrap();
        assert!(chats[0].messages[0].is_edited);
        assert_eq!(chats[0].messages[0].text, "a2");

        assert_eq!(
            reduce(&chats, &ctx(&id), ChatAction::Edit { id: MessageId::new("theirs"), text: "x".into() }),
            Err(Rejected::NotSender)
        );
        assert_eq!(
            reduce(&chats, &ctx(&id), ChatAction::Edit { id: MessageId::new("ghost"), text: "x".into() }),
            Err(Rejected::MessageNotFound)
        );
    }

    #[test]
    fn edit_refreshes_last_message() {
        let chats = vec![with_message(private_chat(), "m1", &alice(), "old")];
        let id = ChatId::new("chat_ab");
        let chats = reduce(&chats, &ctx(&id), ChatAction::Edit { id: MessageId::new("m1"), text: "new".into() }).unwrap();
        assert_eq!(chats[0].last_message.as_ref().unwrap().text, "new");
    }

    #[test]
    fn clear_history_empties_everything() {
        let id = ChatId::new("chat_ab");
        let mut chats = vec![with_message(private_chat(), "m1", &bob(), "hi")];
        chats = reduce(&chats, &ctx(&id), ChatAction::PinMessage { id: MessageId::new("m1") }).unwrap();
        chats = reduce(&chats, &ctx(&id), ChatAction::ClearHistory).unwrap();

        assert!(chats[0].messages.is_empty());
        assert!(chats[0].last_message.is_none());
        assert!(chats[0].pinned_message_ids.is_empty());
    }

    #[test]
    fn add_participant_once_and_announce() {
        let group = owned_group();
        let id = group.id.clone();
        let carol = new_user("carol", "Carol", None);

        let add = ChatAction::AddParticipant { user: carol.clone(), announce: true };
        let chats = reduce(&[group], &ctx(&id), add.clone()).unwrap();
        let chats = reduce(&chats, &ctx(&id), add).unwrap();

        assert_eq!(chats[0].participants.len(), 3);
        assert_eq!(chats[0].messages.len(), 1);
        assert!(chats[0].messages[0].sender_id.is_system());
        assert!(chats[0].messages[0].text.contains("Carol"));
    }

    #[test]
    fn members_cannot_ban_but_may_leave() {
        let group = owned_group();
        let id = group.id.clone();
        let as_bob = ReduceContext::new(Some(&bob()), Some(&id), 1);

        assert_eq!(
            reduce(&[group.clone()], &as_bob, ChatAction::RemoveParticipant { user_id: alice().id }),
            Err(Rejected::CannotRemoveOwner)
        );
        let mut with_carol = group.clone();
        with_carol.add_participant(new_user("carol", "", None));
        let carol_id = with_carol.participants[2].id.clone();
        assert_eq!(
            reduce(&[with_carol], &as_bob, ChatAction::RemoveParticipant { user_id: carol_id }),
            Err(Rejected::Forbidden(Capability::BanUsers))
        );

        let chats = reduce(&[group], &as_bob, ChatAction::RemoveParticipant { user_id: bob().id }).unwrap();
        assert!(!chats[0].is_participant(&bob().id));
    }

    #[test]
    fn membership_is_fixed_outside_groups_and_channels() {
        let mallory = new_user("mallory", "Mallory", None);
        let saved = Chat::new(ChatId::saved(), ChatKind::Saved, vec![alice()]);
        let bot = Chat::new(ChatId::assistant(), ChatKind::Bot, vec![alice(), assistant_user()]);

        for chat in [saved, bot, private_chat()] {
            let id = chat.id.clone();
            let chats = vec![chat];
            let add = ChatAction::AddParticipant { user: mallory.clone(), announce: true };
            assert_eq!(reduce(&chats, &ctx(&id), add), Err(Rejected::FixedMembership));
            for member in &chats[0].participants {
                let remove = ChatAction::RemoveParticipant { user_id: member.id.clone() };
                assert_eq!(reduce(&chats, &ctx(&id), remove), Err(Rejected::FixedMembership));
            }
        }

        let mut channel = owned_group();
        channel.kind = ChatKind::Channel;
        let id = channel.id.clone();
        let add = ChatAction::AddParticipant { user: mallory, announce: false };
        assert_eq!(reduce(&[channel], &ctx(&id), add).unwrap()[0].participants.len(), 3);
    }

    #[test]
    fn removing_an_admin_drops_their_bundle() {
        let mut group = owned_group();
        group.admins.insert(bob().id, AdminPermissions::default());
        let id = group.id.clone();

        let chats = reduce(&[group], &ctx(&id), ChatAction::RemoveParticipant { user_id: bob().id }).unwrap();
        assert!(chats[0].admins.is_empty());
    }

    #[test]
    fn settings_patch_requires_rights() {
        let group = owned_group();
        let id = group.id.clone();
        let patch = ChatPatch {
            description: Some("about".into()),
            slow_mode: Some(10),
            ..ChatPatch::default()
        };

        let chats = reduce(&[group.clone()], &ctx(&id), ChatAction::UpdateSettings(patch.clone())).unwrap();
        assert_eq!(chats[0].description.as_deref(), Some("about"));
        assert_eq!(chats[0].slow_mode, Some(10));

        let as_bob = ReduceContext::new(Some(&bob()), Some(&id), 1);
        assert_eq!(
            reduce(&[group], &as_bob, ChatAction::UpdateSettings(patch)),
            Err(Rejected::Forbidden(Capability::ChangeInfo))
        );
    }

    #[test]
    fn update_chat_info_merges_selected_fields() {
        let mut group = owned_group();
        group.group_name = Some("Old".into());
        group.description = Some("keep".into());
        let id = group.id.clone();

        let chats = reduce(
            &[group],
            &ctx(&id),
            ChatAction::UpdateChatInfo {
                group_name: Some("New".into()),
                description: None,
                slow_mode: Some(0),
            },
        )
        .unwrap();
        assert_eq!(chats[0].group_name.as_deref(), Some("New"));
        assert_eq!(chats[0].description.as_deref(), Some("keep"));
        assert_eq!(chats[0].slow_mode, None);
    }

    #[test]
    fn reactions_toggle_and_keep_counts() {
        let id = ChatId::new("chat_ab");
        let chats = vec![with_message(private_chat(), "m1", &bob(), "hi")];
        let react = ChatAction::React { message_id: MessageId::new("m1"), emoji: "👍".into() };

        let chats = reduce(&chats, &ctx(&id), react.clone()).unwrap();
        let as_bob = ReduceContext::new(Some(&bob()), Some(&id), 1);
        let chats = reduce(&chats, &as_bob, react.clone()).unwrap();
        let reaction = &chats[0].messages[0].reactions[0];
        assert_eq!(reaction.count, 2);
        assert_eq!(reaction.count as usize, reaction.users.len());

        let chats = reduce(&chats, &ctx(&id), react.clone()).unwrap();
        let chats = reduce(&chats, &as_bob, react).unwrap();
        assert!(chats[0].messages[0].reactions.is_empty());
    }

    #[test]
    fn mark_read_clears_unread() {
        let mut chat = with_message(private_chat(), "m1", &bob(), "hi");
        chat.unread_count = 3;
        let id = chat.id.clone();
        let chats = reduce(&[chat], &ctx(&id), ChatAction::MarkRead).unwrap();
        assert_eq!(chats[0].unread_count, 0);
        assert!(chats[0].messages[0].is_read);
    }

    #[test]
    fn create_chat_rejects_second_private_pair() {
        let existing = private_chat();
        let twin = Chat::new(ChatId::new("chat_ba"), ChatKind::Private, vec![bob(), alice()]);
        let id = existing.id.clone();
        assert_eq!(
            reduce(&[existing], &ctx(&id), ChatAction::CreateChat(Box::new(twin))),
            Err(Rejected::DuplicateChat)
        );

        let group = owned_group();
        let chats = reduce(&[private_chat()], &ctx(&id), ChatAction::CreateChat(Box::new(group))).unwrap();
        assert_eq!(chats[0].id, ChatId::new("group_1"));
        assert_eq!(chats.len(), 2);
    }

    #[test]
    fn delete_chat_removes_target() {
        let id = ChatId::new("chat_ab");
        let chats = reduce(&[private_chat(), owned_group()], &ctx(&id), ChatAction::DeleteChat).unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].id, ChatId::new("group_1"));
    }

    #[test]
    fn bot_reply_is_created_once_then_updated() {
        let bot_chat = Chat::new(ChatId::assistant(), ChatKind::Bot, vec![alice(), assistant_user()]);
        let id = bot_chat.id.clone();
        let reply = MessageId::new("r1");

        let mut chats = vec![bot_chat];
        for text in ["س", "سلام"] {
            chats = reduce(
                &chats,
                &ctx(&id),
                ChatAction::UpsertBotReply { message_id: reply.clone(), text: text.into() },
            )
            .unwrap();
        }
        assert_eq!(chats[0].messages.len(), 1);
        assert_eq!(chats[0].messages[0].text, "سلام");
        assert!(chats[0].messages[0].is_ai);
        assert!(chats[0].messages[0].sender_id.is_assistant());

        let private = ChatId::new("chat_ab");
        assert_eq!(
            reduce(
                &[private_chat()],
                &ctx(&private),
                ChatAction::UpsertBotReply { message_id: reply, text: "x".into() }
            ),
            Err(Rejected::NotABotChat)
        );
    }

    #[test]
    fn sidebar_pin_flips() {
        let id = ChatId::new("chat_ab");
        let chats = reduce(&[private_chat()], &ctx(&id), ChatAction::ToggleSidebarPin).unwrap();
        assert!(chats[0].is_pinned_in_sidebar);
        let chats = reduce(&chats, &ctx(&id), ChatAction::ToggleSidebarPin).unwrap();
        assert!(!chats[0].is_pinned_in_sidebar);
    }
}
