//! # starly-client
//!
//! The chat core of one client context: the pure chat-list reducer and its
//! authorization rules, the identity gate, the AI bot adapters, and the
//! [`ChatSession`] that ties them to storage and cross-tab sync.

pub mod action;
pub mod auth;
pub mod bot;
pub mod config;
pub mod error;
pub mod events;
pub mod mentions;
pub mod permissions;
pub mod reducer;
pub mod session;
pub mod sidebar;

mod stream;
mod sync_bridge;

use tracing_subscriber::{fmt, EnvFilter};

pub use action::{ChatAction, ChatPatch, SendMessage};
pub use auth::{AuthRequest, IdentityGate};
pub use bot::{BotAdapter, GeminiAdapter, HistoryTurn, ScriptedBot, TurnRole, UnavailableBot};
pub use config::ClientConfig;
pub use error::{AuthError, ClientError};
pub use events::{ChangeOrigin, SessionEvent};
pub use reducer::{reduce, ReduceContext, Rejected};
pub use mentions::{extract_mentions, segments, Segment};
pub use session::{ChatSession, Outcome, WeakChatSession};
pub use sidebar::{chat_title, visible_chats, Folder};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("starly_client=debug,starly_sync=debug,starly_store=info,warn")
    });

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Starting {}", starly_shared::constants::APP_NAME);
    }
}
