//! Registry of named broadcast channels.
//!
//! Each name maps to one `tokio::sync::broadcast` sender kept alive by the hub,
//! so subscribers never observe the channel closing while the hub exists.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

use crate::channel::SyncChannel;
use crate::error::SyncError;

/// Frames buffered per channel before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Identifies the context that posted a frame, so it is not echoed back.
pub type OriginId = u64;

/// One posted message: who sent it and the serialized envelope.
#[derive(Debug, Clone)]
pub struct Frame {
    pub origin: OriginId,
    pub payload: String,
}

#[derive(Default)]
struct HubInner {
    channels: Mutex<HashMap<String, broadcast::Sender<Frame>>>,
    next_origin: AtomicU64,
}

/// Same-origin broadcast hub. Clones share the same channels.
#[derive(Clone, Default)]
pub struct SyncHub {
    inner: Arc<HubInner>,
}

impl SyncHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new handle on channel `name` with its own origin id.
    pub fn channel(&self, name: &str) -> Result<SyncChannel, SyncError> {
        let origin = self.inner.next_origin.fetch_add(1, Ordering::Relaxed) + 1;
        let sender = self.sender(name)?;
        Ok(SyncChannel::new(self.clone(), name.to_string(), origin, sender))
    }

    /// Sender for `name`, creating the channel on first use.
    pub(crate) fn sender(&self, name: &str) -> Result<broadcast::Sender<Frame>, SyncError> {
        let mut channels = self
            .inner
            .channels
            .lock()
            .map_err(|_| SyncError::LockPoisoned)?;
        let sender = channels.entry(name.to_string()).or_insert_with(|| {
            debug!(channel = name, "creating sync channel");
            broadcast::channel(CHANNEL_CAPACITY).0
        });
        Ok(sender.clone())
    }

    /// Number of live subscriptions on `name` across all contexts.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner
            .channels
            .lock()
            .map(|c| c.get(name).map_or(0, |s| s.receiver_count()))
            .unwrap_or(0)
    }
}
