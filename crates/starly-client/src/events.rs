use tokio::sync::broadcast;

use starly_shared::ChatId;

/// Events buffered per subscriber before it starts lagging.
pub const EVENT_CAPACITY: usize = 128;

/// Where a change to the in-memory chat list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// An action dispatched in this context.
    Local,
    /// A snapshot broadcast by another context.
    Remote,
    /// Reloaded from the durable store.
    Storage,
}

/// Notifications a UI layer subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ChatsChanged { origin: ChangeOrigin },
    ActiveChatChanged { chat_id: Option<ChatId> },
    /// The AI assistant started or stopped writing in `chat_id`.
    Typing { chat_id: ChatId, active: bool },
}

pub(crate) fn emit(tx: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    if tx.send(event).is_err() {
        tracing::trace!("No session event subscribers");
    }
}
