//! Per-context handle on a named sync channel.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use starly_shared::protocol::SyncEnvelope;

use crate::error::SyncError;
use crate::hub::{Frame, OriginId, SyncHub};

/// A context's handle on a named channel.
///
/// Closing a handle only stops it from posting; the next [`publish`] quietly
/// re-opens it and retries once.
///
/// [`publish`]: SyncChannel::publish
pub struct SyncChannel {
    hub: SyncHub,
    name: String,
    origin: OriginId,
    sender: Mutex<Option<broadcast::Sender<Frame>>>,
}

impl SyncChannel {
    pub(crate) fn new(
        hub: SyncHub,
        name: String,
        origin: OriginId,
        sender: broadcast::Sender<Frame>,
    ) -> Self {
        Self {
            hub,
            name,
            origin,
            sender: Mutex::new(Some(sender)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> OriginId {
        self.origin
    }

    pub fn is_open(&self) -> bool {
        self.sender.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Drop this handle's sender. Subscriptions already handed out keep
    /// receiving.
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            if sender.take().is_some() {
                debug!(channel = %self.name, origin = self.origin, "sync channel closed");
            }
        }
    }

    fn reopen(&self) -> Result<(), SyncError> {
        let fresh = self.hub.sender(&self.name)?;
        let mut sender = self.sender.lock().map_err(|_| SyncError::LockPoisoned)?;
        *sender = Some(fresh);
        debug!(channel = %self.name, origin = self.origin, "sync channel re-opened");
        Ok(())
    }

    fn post(&self, payload: &str) -> Result<usize, SyncError> {
        let sender = self.sender.lock().map_err(|_| SyncError::LockPoisoned)?;
        let Some(tx) = sender.as_ref() else {
            return Err(SyncError::Closed(self.name.clone()));
        };
        let frame = Frame {
            origin: self.origin,
            payload: payload.to_string(),
        };
        // No subscribers anywhere is not a failure: nobody else is listening.
        Ok(tx.send(frame).unwrap_or(0))
    }

    /// Broadcast an envelope to every other context on this channel.
    ///
    /// Returns how many subscriptions the frame reached.
    pub fn publish(&self, envelope: &SyncEnvelope) -> Result<usize, SyncError> {
        let payload = envelope.to_json()?;
        match self.post(&payload) {
            Err(SyncError::Closed(_)) => {
                self.reopen()?;
                self.post(&payload)
            }
            other => other,
        }
    }

    /// Listen for envelopes posted by other contexts.
    pub fn subscribe(&self) -> Result<SyncSubscription, SyncError> {
        let rx = self.hub.sender(&self.name)?.subscribe();
        Ok(SyncSubscription {
            rx,
            origin: self.origin,
            name: self.name.clone(),
        })
    }
}

/// Receiving side of a [`SyncChannel`]; filters out the owner's own frames.
pub struct SyncSubscription {
    rx: broadcast::Receiver<Frame>,
    origin: OriginId,
    name: String,
}

impl SyncSubscription {
    /// Next envelope from another context, or `None` once the hub is gone.
    ///
    /// Undecodable frames are logged and skipped. A lagging receiver skips
    /// the frames it missed; every frame is a full snapshot, so the next one
    /// supersedes them.
    pub async fn recv(&mut self) -> Option<SyncEnvelope> {
        loop {
            match self.rx.recv().await {
                Ok(frame) if frame.origin == self.origin => continue,
                Ok(frame) => match SyncEnvelope::from_json(&frame.payload) {
                    Ok(envelope) => return Some(envelope),
                    Err(e) => {
                        warn!(channel = %self.name, origin = frame.origin, error = %e, "dropping malformed sync frame");
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.name, skipped, "sync subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use starly_shared::{Chat, ChatId, ChatKind, UserId};

    use super::*;

    fn envelope(user: &str) -> SyncEnvelope {
        SyncEnvelope::sync_all(
            UserId::new(user),
            vec![Chat::new(ChatId::saved(), ChatKind::Saved, vec![])],
        )
    }

    async fn recv_soon(sub: &mut SyncSubscription) -> Option<SyncEnvelope> {
        tokio::time::timeout(Duration::from_millis(200), sub.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn frames_reach_other_contexts_only() {
        let hub = SyncHub::new();
        let a = hub.channel("starly_sync").unwrap();
        let b = hub.channel("starly_sync").unwrap();
        let mut a_sub = a.subscribe().unwrap();
        let mut b_sub = b.subscribe().unwrap();

        a.publish(&envelope("u1")).unwrap();

        assert_eq!(recv_soon(&mut b_sub).await, Some(envelope("u1")));
        assert_eq!(recv_soon(&mut a_sub).await, None);
    }

    #[tokio::test]
    async fn publish_after_close_reopens() {
        let hub = SyncHub::new();
        let a = hub.channel("starly_sync").unwrap();
        let b = hub.channel("starly_sync").unwrap();
        let mut b_sub = b.subscribe().unwrap();

        a.close();
        assert!(!a.is_open());

        let reached = a.publish(&envelope("u1")).unwrap();
        assert_eq!(reached, 1);
        assert!(a.is_open());
        assert_eq!(recv_soon(&mut b_sub).await, Some(envelope("u1")));
    }

    #[tokio::test]
    async fn publish_without_listeners_is_ok() {
        let hub = SyncHub::new();
        let a = hub.channel("lonely").unwrap();
        assert_eq!(a.publish(&envelope("u1")).unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let hub = SyncHub::new();
        let b = hub.channel("starly_sync").unwrap();
        let mut b_sub = b.subscribe().unwrap();

        hub.sender("starly_sync")
            .unwrap()
            .send(Frame {
                origin: 999,
                payload: "{\"type\":\"SYNC_ALL\"".to_string(),
            })
            .unwrap();
        let a = hub.channel("starly_sync").unwrap();
        a.publish(&envelope("u2")).unwrap();

        assert_eq!(recv_soon(&mut b_sub).await, Some(envelope("u2")));
    }

    #[tokio::test]
    async fn channels_are_isolated_by_name() {
        let hub = SyncHub::new();
        let a = hub.channel("one").unwrap();
        let b = hub.channel("two").unwrap();
        let mut b_sub = b.subscribe().unwrap();

        a.publish(&envelope("u1")).unwrap();
        assert_eq!(recv_soon(&mut b_sub).await, None);
    }
}
