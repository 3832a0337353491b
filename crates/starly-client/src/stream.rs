//! Drives one streamed AI reply into the assistant chat.

use std::fmt;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use starly_shared::constants::BOT_FALLBACK_TEXT;
use starly_shared::{ChatId, MessageId};

use crate::action::ChatAction;
use crate::bot::HistoryTurn;
use crate::events::SessionEvent;
use crate::session::{ChatSession, Outcome};

pub(crate) struct ReplyJob {
    pub chat_id: ChatId,
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
    /// Subscribed when the prompt was sent, so a switch that happens before
    /// the task starts is still seen as a change.
    pub active: watch::Receiver<Option<ChatId>>,
    /// Whether the assistant chat was active when the prompt was sent.
    pub watching: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Completed,
    /// The user left the assistant chat.
    Cancelled,
    TimedOut,
    /// The reply could not be written.
    Aborted,
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Write `text` as the current content of the reply message.
fn upsert(session: &ChatSession, chat_id: &ChatId, message_id: &MessageId, text: &str) -> bool {
    let action = ChatAction::UpsertBotReply {
        message_id: message_id.clone(),
        text: text.to_string(),
    };
    match session.dispatch_to(chat_id, action) {
        Ok(Outcome::Applied) => true,
        Ok(Outcome::Rejected(reason)) => {
            warn!(chat = %chat_id, %reason, "AI reply rejected");
            false
        }
        Err(e) => {
            warn!(chat = %chat_id, error = %e, "Failed to store AI reply");
            false
        }
    }
}

/// Accumulate fragments into a single reply message until the stream ends,
/// a fragment takes longer than the configured timeout, or the user switches
/// away from the assistant chat.
///
/// A prompt sent while another chat is active (or none) streams to the end
/// unless the user opens the assistant chat and then leaves it.
pub(crate) async fn run(session: ChatSession, job: ReplyJob) {
    let ReplyJob {
        chat_id,
        prompt,
        history,
        mut active,
        mut watching,
    } = job;
    let message_id = MessageId::generate();
    let timeout = session.config().stream_timeout;
    let turns = history.len();
    let mut fragments = session.bot().stream_reply(prompt, history);
    let mut text = String::new();

    session.emit(SessionEvent::Typing {
        chat_id: chat_id.clone(),
        active: true,
    });
    debug!(chat = %chat_id, history = turns, "AI reply started");

    let end = loop {
        tokio::select! {
            changed = active.changed() => {
                if changed.is_err() {
                    break StreamEnd::Cancelled;
                }
                let on_chat = active.borrow_and_update().as_ref() == Some(&chat_id);
                if watching && !on_chat {
                    break StreamEnd::Cancelled;
                }
                watching = on_chat;
            }
            next = tokio::time::timeout(timeout, fragments.next()) => match next {
                Ok(Some(fragment)) => {
                    text.push_str(&fragment);
                    if !upsert(&session, &chat_id, &message_id, &text) {
                        break StreamEnd::Aborted;
                    }
                }
                Ok(None) => break StreamEnd::Completed,
                Err(_) => {
                    text.push_str(BOT_FALLBACK_TEXT);
                    upsert(&session, &chat_id, &message_id, &text);
                    break StreamEnd::TimedOut;
                }
            },
        }
    };
    drop(fragments);

    if let Err(e) = session.reconcile() {
        warn!(error = %e, "Failed to reconcile after AI reply");
    }
    session.emit(SessionEvent::Typing {
        chat_id: chat_id.clone(),
        active: false,
    });
    info!(chat = %chat_id, end = %end, chars = text.chars().count(), "AI reply finished");
}
