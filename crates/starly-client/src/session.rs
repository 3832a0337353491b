//! One client context ("tab") of a logged-in user.
//!
//! The session owns the in-memory chat list and the active chat. Every action
//! runs to completion under the state lock: reduce, persist, commit, then
//! broadcast the new snapshot to the other contexts. A failed write leaves
//! the list untouched; a failed broadcast is only logged.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use starly_shared::constants::{WELCOME_BOT_TEXT, WELCOME_SAVED_TEXT};
use starly_shared::identity::{assistant_user, generate_invite_link, group_avatar_url};
use starly_shared::protocol::SyncEnvelope;
use starly_shared::{Chat, ChatId, ChatKind, MemberPermissions, Message, MessageId, User, UserId};
use starly_store::ChatRepository;
use starly_sync::{SyncChannel, SyncHub, SyncSubscription};

use crate::action::ChatAction;
use crate::auth::{normalize_username, IdentityGate};
use crate::bot::{BotAdapter, HistoryTurn};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{emit, ChangeOrigin, SessionEvent, EVENT_CAPACITY};
use crate::reducer::{reduce, ReduceContext, Rejected};
use crate::stream::{self, ReplyJob};
use crate::sync_bridge;

/// Result of a dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Nothing changed.
    Rejected(Rejected),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

struct Inner {
    owner: User,
    repo: Arc<dyn ChatRepository>,
    channel: SyncChannel,
    bot: Arc<dyn BotAdapter>,
    config: ClientConfig,
    chats: Mutex<Vec<Chat>>,
    active: watch::Sender<Option<ChatId>>,
    events: broadcast::Sender<SessionEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

/// Handle on a client context. Clones share the same state.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

/// Non-owning handle held by background tasks.
#[derive(Clone)]
pub struct WeakChatSession {
    inner: Weak<Inner>,
}

impl WeakChatSession {
    pub fn upgrade(&self) -> Option<ChatSession> {
        self.inner.upgrade().map(|inner| ChatSession { inner })
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The saved chat and the AI chat of a brand-new account.
fn initial_chats(owner: &User, now_ms: i64) -> Vec<Chat> {
    let mut saved = Chat::new(ChatId::saved(), ChatKind::Saved, vec![owner.clone()]);
    saved.messages.push(Message::system(WELCOME_SAVED_TEXT, now_ms));
    saved.refresh_last_message();

    let mut bot = Chat::new(
        ChatId::assistant(),
        ChatKind::Bot,
        vec![owner.clone(), assistant_user()],
    );
    let mut greeting = Message::text(MessageId::generate(), UserId::assistant(), WELCOME_BOT_TEXT, now_ms);
    greeting.is_ai = true;
    bot.messages.push(greeting);
    bot.refresh_last_message();
    bot.unread_count = 1;

    vec![saved, bot]
}

/// The messages that preceded the newest one, as model history.
fn reply_history(chat: &Chat, owner: &UserId, window: usize) -> Vec<HistoryTurn> {
    let earlier = &chat.messages[..chat.messages.len().saturating_sub(1)];
    let start = earlier.len().saturating_sub(window);
    earlier[start..]
        .iter()
        .filter(|m| !m.sender_id.is_system() && !m.text.is_empty())
        .map(|m| {
            if &m.sender_id == owner {
                HistoryTurn::user(m.text.clone())
            } else {
                HistoryTurn::model(m.text.clone())
            }
        })
        .collect()
}

impl ChatSession {
    /// Open a context for `owner`: load (or seed) the chat list, join the
    /// sync channel and start listening for other contexts.
    pub fn open(
        owner: &User,
        repo: Arc<dyn ChatRepository>,
        hub: &SyncHub,
        bot: Arc<dyn BotAdapter>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let owner = owner.without_credentials();
        let channel = hub.channel(&config.sync_channel)?;
        let subscription = channel.subscribe()?;

        let (chats, active) = match repo.load(&owner.id)? {
            Some(chats) => (chats, None),
            None => {
                let chats = initial_chats(&owner, now_ms());
                repo.save(&owner.id, &chats)?;
                info!(user = %owner.id, "Seeded chat list for new account");
                (chats, Some(ChatId::assistant()))
            }
        };

        let (active, _) = watch::channel(active);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = Self {
            inner: Arc::new(Inner {
                owner,
                repo,
                channel,
                bot,
                config,
                chats: Mutex::new(chats),
                active,
                events,
                listener: Mutex::new(None),
            }),
        };
        session.start_listener(subscription);
        info!(user = %session.inner.owner.id, origin = session.inner.channel.origin(), "Chat session opened");
        Ok(session)
    }

    fn start_listener(&self, subscription: SyncSubscription) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = runtime.spawn(sync_bridge::run(self.downgrade(), subscription));
                if let Ok(mut listener) = self.inner.listener.lock() {
                    *listener = Some(handle);
                }
            }
            Err(_) => warn!("No async runtime, cross-tab sync listener not started"),
        }
    }

    pub fn downgrade(&self) -> WeakChatSession {
        WeakChatSession {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn owner(&self) -> &User {
        &self.inner.owner
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn bot(&self) -> &Arc<dyn BotAdapter> {
        &self.inner.bot
    }

    /// Snapshot of the current chat list.
    pub fn chats(&self) -> Vec<Chat> {
        self.inner
            .chats
            .lock()
            .map(|chats| chats.clone())
            .unwrap_or_default()
    }

    pub fn chat(&self, id: &ChatId) -> Option<Chat> {
        self.inner
            .chats
            .lock()
            .ok()
            .and_then(|chats| chats.iter().find(|c| &c.id == id).cloned())
    }

    pub fn active_chat_id(&self) -> Option<ChatId> {
        self.inner.active.borrow().clone()
    }

    /// Follow active-chat changes; the AI stream cancels through this.
    pub fn watch_active(&self) -> watch::Receiver<Option<ChatId>> {
        self.inner.active.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        emit(&self.inner.events, event);
    }

    fn lock_chats(&self) -> Result<MutexGuard<'_, Vec<Chat>>, ClientError> {
        self.inner.chats.lock().map_err(|_| ClientError::LockPoisoned)
    }

    /// Switch the active chat without touching the list.
    pub fn set_active_chat(&self, chat_id: Option<ChatId>) {
        let previous = self.inner.active.send_replace(chat_id.clone());
        if previous != chat_id {
            debug!(chat = ?chat_id, "Active chat changed");
            self.emit(SessionEvent::ActiveChatChanged { chat_id });
        }
    }

    /// Make `chat_id` active and mark it read.
    pub fn open_chat(&self, chat_id: ChatId) -> Result<(), ClientError> {
        let unread = self.chat(&chat_id).is_some_and(|c| c.unread_count > 0);
        self.set_active_chat(Some(chat_id.clone()));
        if unread {
            self.dispatch_to(&chat_id, ChatAction::MarkRead)?;
        }
        Ok(())
    }

    /// Apply an action to the active chat.
    pub fn dispatch(&self, action: ChatAction) -> Result<Outcome, ClientError> {
        let target = self.active_chat_id();
        self.apply(target, action)
    }

    /// Apply an action to a specific chat, whatever is active.
    pub fn dispatch_to(&self, chat_id: &ChatId, action: ChatAction) -> Result<Outcome, ClientError> {
        self.apply(Some(chat_id.clone()), action)
    }

    fn apply(&self, target: Option<ChatId>, action: ChatAction) -> Result<Outcome, ClientError> {
        let name = action.name();
        let prompt = match &action {
            ChatAction::Send(message) if target.as_ref().is_some_and(ChatId::is_assistant) => {
                Some(message.text.clone())
            }
            _ => None,
        };
        let owner = &self.inner.owner;
        let ctx = ReduceContext::new(Some(owner), target.as_ref(), now_ms());

        let mut chats = self.lock_chats()?;
        let next = match reduce(&chats, &ctx, action) {
            Ok(next) => next,
            Err(reason) => {
                debug!(action = name, chat = ?target, %reason, "Action rejected");
                return Ok(Outcome::Rejected(reason));
            }
        };
        self.inner.repo.save(&owner.id, &next)?;
        *chats = next;
        self.broadcast(&chats);

        let reply = prompt.and_then(|prompt| {
            let chat = chats.iter().find(|c| c.id.is_assistant())?;
            let active = self.watch_active();
            let watching = active.borrow().as_ref() == Some(&chat.id);
            Some(ReplyJob {
                chat_id: chat.id.clone(),
                prompt,
                history: reply_history(chat, &owner.id, self.inner.config.history_window),
                active,
                watching,
            })
        });
        drop(chats);

        debug!(action = name, chat = ?target, "Action applied");
        self.emit(SessionEvent::ChatsChanged {
            origin: ChangeOrigin::Local,
        });
        if let Some(job) = reply {
            self.start_reply(job);
        }
        Ok(Outcome::Applied)
    }

    fn broadcast(&self, chats: &[Chat]) {
        let envelope = SyncEnvelope::sync_all(self.inner.owner.id.clone(), chats.to_vec());
        match self.inner.channel.publish(&envelope) {
            Ok(reached) => debug!(reached, "Snapshot broadcast"),
            Err(e) => warn!(error = %e, "Failed to broadcast snapshot"),
        }
    }

    fn start_reply(&self, job: ReplyJob) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(stream::run(self.clone(), job));
            }
            Err(_) => warn!("No async runtime, AI reply skipped"),
        }
    }

    /// Replace the in-memory list with the last durably written one.
    pub fn reconcile(&self) -> Result<(), ClientError> {
        let Some(stored) = self.inner.repo.load(&self.inner.owner.id)? else {
            return Ok(());
        };
        let mut chats = self.lock_chats()?;
        if *chats == stored {
            return Ok(());
        }
        *chats = stored;
        drop(chats);
        debug!("Reconciled chat list with storage");
        self.emit(SessionEvent::ChatsChanged {
            origin: ChangeOrigin::Storage,
        });
        Ok(())
    }

    /// Adopt a snapshot broadcast by another context. Snapshots of other
    /// users are ignored. Returns whether the list was replaced.
    pub fn apply_remote(&self, user_id: &UserId, chats: Vec<Chat>) -> Result<bool, ClientError> {
        if user_id != &self.inner.owner.id {
            debug!(from = %user_id, "Ignoring snapshot of another user");
            return Ok(false);
        }
        *self.lock_chats()? = chats;
        self.emit(SessionEvent::ChatsChanged {
            origin: ChangeOrigin::Remote,
        });
        Ok(true)
    }

    /// Open (or create) the private chat with `username`. Mentioning
    /// yourself opens saved messages.
    pub fn start_private_chat(&self, gate: &IdentityGate, username: &str) -> Result<ChatId, ClientError> {
        let name = normalize_username(username);
        if name == self.inner.owner.username {
            self.open_chat(ChatId::saved())?;
            return Ok(ChatId::saved());
        }

        let peer = gate
            .lookup(&name)?
            .ok_or_else(|| ClientError::UserNotFound(name.clone()))?;
        let existing = self
            .chats()
            .into_iter()
            .find(|c| c.kind == ChatKind::Private && c.is_participant(&peer.id))
            .map(|c| c.id);
        if let Some(id) = existing {
            self.open_chat(id.clone())?;
            return Ok(id);
        }

        let chat = Chat::new(
            ChatId::generate(ChatKind::Private.id_prefix()),
            ChatKind::Private,
            vec![self.inner.owner.clone(), peer.visible_to(true)],
        );
        self.create(chat)
    }

    /// Resolve a clicked `@mention`.
    pub fn open_mention(&self, gate: &IdentityGate, mention: &str) -> Result<ChatId, ClientError> {
        self.start_private_chat(gate, mention)
    }

    pub fn create_group(&self, gate: &IdentityGate, name: &str, members: &[&str]) -> Result<ChatId, ClientError> {
        self.create_multi_user(gate, ChatKind::Group, name, members)
    }

    pub fn create_channel(&self, gate: &IdentityGate, name: &str, members: &[&str]) -> Result<ChatId, ClientError> {
        self.create_multi_user(gate, ChatKind::Channel, name, members)
    }

    fn create_multi_user(
        &self,
        gate: &IdentityGate,
        kind: ChatKind,
        name: &str,
        members: &[&str],
    ) -> Result<ChatId, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::EmptyChatName);
        }

        let owner = &self.inner.owner;
        let mut participants = vec![owner.clone()];
        for member in members {
            match gate.lookup(member)? {
                Some(user) => participants.push(user.visible_to(true)),
                None => debug!(member, "Skipping unknown member"),
            }
        }

        let mut chat = Chat::new(ChatId::generate(kind.id_prefix()), kind, participants);
        chat.group_name = Some(name.to_string());
        chat.group_avatar = Some(group_avatar_url(name));
        chat.admin_id = Some(owner.id.clone());
        chat.permissions = Some(MemberPermissions::default());
        chat.invite_link = Some(generate_invite_link());
        chat.is_read_only_for_members = kind == ChatKind::Channel;
        let notice = match kind {
            ChatKind::Channel => format!("کانال {name} ایجاد شد."),
            _ => format!("گروه {name} ایجاد شد."),
        };
        chat.messages.push(Message::system(notice, now_ms()));
        chat.refresh_last_message();

        self.create(chat)
    }

    fn create(&self, chat: Chat) -> Result<ChatId, ClientError> {
        let id = chat.id.clone();
        match self.apply(None, ChatAction::CreateChat(Box::new(chat)))? {
            Outcome::Applied => {
                info!(chat = %id, "Chat created");
                self.open_chat(id.clone())?;
                Ok(id)
            }
            Outcome::Rejected(reason) => Err(ClientError::Rejected(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use starly_shared::constants::BOT_FALLBACK_TEXT;
    use starly_store::{Database, KvChatRepository, MemoryStore, SharedStore, StoreError};

    use super::*;
    use crate::action::SendMessage;
    use crate::auth::AuthRequest;
    use crate::bot::{ScriptedBot, UnavailableBot};

    struct Fixture {
        store: SharedStore,
        hub: SyncHub,
        gate: IdentityGate,
        owner: User,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::shared();
        let gate = IdentityGate::new(store.clone());
        let owner = gate
            .authenticate(AuthRequest::register("alice", "pass", Some("Alice")))
            .unwrap();
        Fixture {
            hub: SyncHub::new(),
            store,
            gate,
            owner,
        }
    }

    impl Fixture {
        fn open_with(&self, bot: Arc<dyn BotAdapter>, config: ClientConfig) -> ChatSession {
            let repo = Arc::new(KvChatRepository::new(self.store.clone()));
            ChatSession::open(&self.owner, repo, &self.hub, bot, config).unwrap()
        }

        fn open(&self) -> ChatSession {
            self.open_with(Arc::new(UnavailableBot), ClientConfig::default())
        }
    }

    async fn wait_for(events: &mut broadcast::Receiver<SessionEvent>, wanted: impl Fn(&SessionEvent) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Ok(event) if wanted(&event) => return,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for session event");
    }

    fn typing_stopped(event: &SessionEvent) -> bool {
        matches!(event, SessionEvent::Typing { active: false, .. })
    }

    #[tokio::test]
    async fn new_account_is_seeded() {
        let f = fixture();
        let session = f.open();

        let chats = session.chats();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].kind, ChatKind::Saved);
        assert_eq!(chats[1].kind, ChatKind::Bot);
        assert_eq!(chats[1].unread_count, 1);
        assert_eq!(session.active_chat_id(), Some(ChatId::assistant()));
        assert!(chats[0].participants[0].password.is_none());

        let repo = KvChatRepository::new(f.store.clone());
        assert_eq!(repo.load(&f.owner.id).unwrap(), Some(chats));
    }

    #[tokio::test]
    async fn dispatch_persists_and_rejections_are_noops() {
        let f = fixture();
        let session = f.open();
        session.set_active_chat(Some(ChatId::saved()));

        let outcome = session.dispatch(ChatAction::Send(SendMessage::text("note"))).unwrap();
        assert!(outcome.is_applied());

        let before = session.chats();
        let outcome = session
            .dispatch(ChatAction::Edit {
                id: MessageId::new("ghost"),
                text: "x".into(),
            })
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected(Rejected::MessageNotFound));
        assert_eq!(session.chats(), before);

        let stored = KvChatRepository::new(f.store.clone()).load(&f.owner.id).unwrap().unwrap();
        assert_eq!(stored, before);
    }

    struct BrokenRepo;

    impl ChatRepository for BrokenRepo {
        fn load(&self, _user_id: &UserId) -> starly_store::Result<Option<Vec<Chat>>> {
            Ok(Some(vec![Chat::new(ChatId::saved(), ChatKind::Saved, vec![])]))
        }

        fn save(&self, _user_id: &UserId, _chats: &[Chat]) -> starly_store::Result<()> {
            Err(StoreError::Migration("disk full".into()))
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_state_unchanged() {
        let f = fixture();
        let session = ChatSession::open(
            &f.owner,
            Arc::new(BrokenRepo),
            &f.hub,
            Arc::new(UnavailableBot),
            ClientConfig::default(),
        )
        .unwrap();

        let before = session.chats();
        let result = session.dispatch_to(&ChatId::saved(), ChatAction::Send(SendMessage::text("lost")));
        assert!(matches!(result, Err(ClientError::Store(_))));
        assert_eq!(session.chats(), before);
    }

    #[tokio::test]
    async fn tabs_converge_last_writer_wins() {
        let f = fixture();
        let tab_a = f.open();
        let tab_b = f.open();
        let mut b_events = tab_b.subscribe();
        let mut a_events = tab_a.subscribe();
        let remote = |e: &SessionEvent| {
            matches!(e, SessionEvent::ChatsChanged { origin: ChangeOrigin::Remote })
        };

        tab_a
            .dispatch_to(&ChatId::saved(), ChatAction::Send(SendMessage::text("from A")))
            .unwrap();
        wait_for(&mut b_events, remote).await;
        assert_eq!(tab_b.chats(), tab_a.chats());

        tab_b
            .dispatch_to(&ChatId::saved(), ChatAction::Send(SendMessage::text("from B")))
            .unwrap();
        wait_for(&mut a_events, remote).await;

        let saved = tab_a.chat(&ChatId::saved()).unwrap();
        let texts: Vec<&str> = saved.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts[texts.len() - 2..], ["from A", "from B"]);
        assert_eq!(tab_a.chats(), tab_b.chats());
    }

    #[tokio::test]
    async fn snapshots_of_other_users_are_ignored() {
        let f = fixture();
        let session = f.open();
        let before = session.chats();
        assert!(!session.apply_remote(&UserId::new("someone"), vec![]).unwrap());
        assert_eq!(session.chats(), before);
    }

    #[tokio::test]
    async fn ai_reply_accumulates_into_one_message() {
        let f = fixture();
        let session = f.open_with(Arc::new(ScriptedBot::new(["س", "لام"])), ClientConfig::default());
        let mut events = session.subscribe();
        let before = session.chat(&ChatId::assistant()).unwrap().messages.len();

        session.dispatch(ChatAction::Send(SendMessage::text("hi"))).unwrap();
        wait_for(&mut events, typing_stopped).await;

        let chat = session.chat(&ChatId::assistant()).unwrap();
        assert_eq!(chat.messages.len(), before + 2);
        let reply = chat.messages.last().unwrap();
        assert!(reply.sender_id.is_assistant());
        assert!(reply.is_ai);
        assert_eq!(reply.text, "سلام");
        assert_eq!(chat.messages[before].text, "hi");
    }

    #[tokio::test]
    async fn ai_reply_stops_when_leaving_the_bot_chat() {
        let f = fixture();
        let bot = ScriptedBot::new(["a", "b", "c"]).with_delay(Duration::from_millis(200));
        let session = f.open_with(Arc::new(bot), ClientConfig::default());
        let mut events = session.subscribe();
        let before = session.chat(&ChatId::assistant()).unwrap().messages.len();

        session.dispatch(ChatAction::Send(SendMessage::text("hi"))).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.chat(&ChatId::assistant()).unwrap().messages.len() < before + 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        session.set_active_chat(Some(ChatId::saved()));
        wait_for(&mut events, typing_stopped).await;

        let reply = session.chat(&ChatId::assistant()).unwrap().messages.last().cloned().unwrap();
        assert!(reply.is_ai);
        assert!(reply.text.starts_with('a'));
        assert_ne!(reply.text, "abc");
    }

    #[tokio::test]
    async fn ai_replies_while_another_chat_is_active() {
        let f = fixture();
        let session = f.open_with(Arc::new(ScriptedBot::new(["hey"])), ClientConfig::default());
        let mut events = session.subscribe();
        session.set_active_chat(None);
        let before = session.chat(&ChatId::assistant()).unwrap().messages.len();

        session
            .dispatch_to(&ChatId::assistant(), ChatAction::Send(SendMessage::text("hi")))
            .unwrap();
        wait_for(&mut events, typing_stopped).await;

        let chat = session.chat(&ChatId::assistant()).unwrap();
        assert_eq!(chat.messages.len(), before + 2);
        assert_eq!(chat.messages.last().unwrap().text, "hey");
    }

    #[tokio::test]
    async fn writes_during_a_reply_survive_it() {
        let f = fixture();
        let bot = ScriptedBot::new(["a", "b", "c"]).with_delay(Duration::from_millis(150));
        let session = f.open_with(Arc::new(bot), ClientConfig::default());
        let other_tab = f.open();
        let mut events = session.subscribe();
        let before = session.chat(&ChatId::assistant()).unwrap().messages.len();

        session.dispatch(ChatAction::Send(SendMessage::text("hi"))).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.chat(&ChatId::assistant()).unwrap().messages.len() < before + 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        session
            .dispatch_to(&ChatId::saved(), ChatAction::Send(SendMessage::text("local note")))
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !other_tab.chats().iter().any(|c| c.messages.iter().any(|m| m.text == "local note")) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        other_tab
            .dispatch_to(&ChatId::saved(), ChatAction::ToggleSidebarPin)
            .unwrap();
        wait_for(&mut events, |e| {
            matches!(e, SessionEvent::ChatsChanged { origin: ChangeOrigin::Remote })
        })
        .await;
        wait_for(&mut events, typing_stopped).await;

        let chats = session.chats();
        let saved = chats.iter().find(|c| c.id.is_saved()).unwrap();
        assert!(saved.is_pinned_in_sidebar);
        assert_eq!(saved.messages.last().unwrap().text, "local note");
        let bot = chats.iter().find(|c| c.id.is_assistant()).unwrap();
        assert_eq!(bot.messages.last().unwrap().text, "abc");

        let stored = KvChatRepository::new(f.store.clone()).load(&f.owner.id).unwrap();
        assert_eq!(stored, Some(chats));
    }

    #[tokio::test]
    async fn slow_fragments_time_out_into_fallback() {
        let f = fixture();
        let bot = ScriptedBot::new(["late"]).with_delay(Duration::from_secs(2));
        let config = ClientConfig {
            stream_timeout: Duration::from_millis(50),
            ..ClientConfig::default()
        };
        let session = f.open_with(Arc::new(bot), config);
        let mut events = session.subscribe();

        session.dispatch(ChatAction::Send(SendMessage::text("hi"))).unwrap();
        wait_for(&mut events, typing_stopped).await;

        let reply = session.chat(&ChatId::assistant()).unwrap().messages.last().cloned().unwrap();
        assert_eq!(reply.text, BOT_FALLBACK_TEXT);
    }

    #[test]
    fn history_covers_prior_messages_only() {
        let owner = UserId::new("me");
        let mut chat = Chat::new(ChatId::assistant(), ChatKind::Bot, vec![]);
        chat.messages.push(Message::system("welcome", 1));
        for i in 0..20 {
            let sender = if i % 2 == 0 { owner.clone() } else { UserId::assistant() };
            chat.messages.push(Message::text(MessageId::generate(), sender, format!("m{i}"), 2 + i));
        }

        let history = reply_history(&chat, &owner, 15);
        assert_eq!(history.len(), 15);
        assert_eq!(history[0], HistoryTurn::user("m4"));
        assert_eq!(history[14], HistoryTurn::user("m18"));
        assert!(!history.iter().any(|t| t.text == "m19"));
    }

    #[tokio::test]
    async fn mentions_open_private_chats() {
        let f = fixture();
        f.gate
            .authenticate(AuthRequest::register("bob", "pass", Some("Bob")))
            .unwrap();
        let session = f.open();

        let id = session.open_mention(&f.gate, "@bob").unwrap();
        assert!(id.as_str().starts_with("chat_"));
        assert_eq!(session.active_chat_id(), Some(id.clone()));
        assert_eq!(session.start_private_chat(&f.gate, "BOB").unwrap(), id);
        assert_eq!(session.chats().len(), 3);

        assert_eq!(session.open_mention(&f.gate, "@alice").unwrap(), ChatId::saved());
        assert!(matches!(
            session.open_mention(&f.gate, "@nobody"),
            Err(ClientError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn groups_are_owned_by_their_creator() {
        let f = fixture();
        f.gate
            .authenticate(AuthRequest::register("bob", "pass", None))
            .unwrap();
        let session = f.open();

        let id = session.create_group(&f.gate, "Friends", &["bob", "ghost"]).unwrap();
        let group = session.chat(&id).unwrap();
        assert_eq!(group.kind, ChatKind::Group);
        assert_eq!(group.participants.len(), 2);
        assert_eq!(group.admin_id.as_ref(), Some(&session.owner().id));
        assert!(group.invite_link.is_some());
        assert!(group.messages[0].sender_id.is_system());
        assert!(group.participants.iter().all(|p| p.password.is_none()));

        assert!(matches!(
            session.create_channel(&f.gate, "  ", &[]),
            Err(ClientError::EmptyChatName)
        ));
    }

    #[tokio::test]
    async fn sqlite_backed_list_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store: SharedStore = Arc::new(Database::open_at(&dir.path().join("starly.db")).unwrap());
        let gate = IdentityGate::new(store.clone());
        let owner = gate.authenticate(AuthRequest::register("carol", "pass", None)).unwrap();
        let hub = SyncHub::new();
        let open = || {
            let repo = Arc::new(KvChatRepository::new(store.clone()));
            ChatSession::open(&owner, repo, &hub, Arc::new(UnavailableBot), ClientConfig::default()).unwrap()
        };

        let first = open();
        first
            .dispatch_to(&ChatId::saved(), ChatAction::Send(SendMessage::text("keep me")))
            .unwrap();
        let expected = first.chats();
        drop(first);

        let second = open();
        assert_eq!(second.chats(), expected);
        assert_eq!(second.active_chat_id(), None);
    }

    #[tokio::test]
    async fn opening_a_chat_marks_it_read() {
        let f = fixture();
        let session = f.open();
        session.open_chat(ChatId::assistant()).unwrap();
        assert_eq!(session.chat(&ChatId::assistant()).unwrap().unread_count, 0);
    }
}
