//! Background task that feeds snapshots from other contexts into a session.

use tracing::{debug, warn};

use starly_shared::protocol::SyncEnvelope;
use starly_sync::SyncSubscription;

use crate::session::WeakChatSession;

/// Runs until the channel closes or the session is dropped.
pub(crate) async fn run(session: WeakChatSession, mut subscription: SyncSubscription) {
    while let Some(envelope) = subscription.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        match envelope {
            SyncEnvelope::SyncAll { user_id, chats } => {
                let count = chats.len();
                match session.apply_remote(&user_id, chats) {
                    Ok(true) => debug!(user = %user_id, chats = count, "Applied remote snapshot"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Failed to apply remote snapshot"),
                }
            }
        }
    }
    debug!("Sync listener stopped");
}
