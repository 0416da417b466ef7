// SPDX-License-Identifier: MIT

//! One browser tab's live-event connection. Delivery is by bounded channel
//! so a slow consumer can never block a producer: on overflow the session
//! is dropped rather than the send blocking or silently discarding newer
//! events out of order.

use ao_core::{define_id, LiveEvent};
use std::collections::HashSet;
use tokio::sync::mpsc;

define_id! {
    pub struct SessionId("ss-");
}

/// Outgoing queue depth before a session is considered slow and dropped.
pub const OUTGOING_QUEUE_CAPACITY: usize = 256;

pub struct SseSession {
    pub id: SessionId,
    pub user_id: String,
    pub is_admin: bool,
    subscribed: parking_lot::RwLock<HashSet<String>>,
    sender: mpsc::Sender<LiveEvent>,
}

impl SseSession {
    /// Returns the session plus the receiver half the HTTP handler streams
    /// to the client.
    pub fn new(user_id: impl Into<String>, is_admin: bool) -> (Self, mpsc::Receiver<LiveEvent>) {
        let (tx, rx) = mpsc::channel(OUTGOING_QUEUE_CAPACITY);
        (Self { id: SessionId::new(), user_id: user_id.into(), is_admin, subscribed: parking_lot::RwLock::new(HashSet::new()), sender: tx }, rx)
    }

    pub fn subscribe(&self, analysis_ids: impl IntoIterator<Item = String>) {
        self.subscribed.write().extend(analysis_ids);
    }

    pub fn unsubscribe(&self, analysis_ids: impl IntoIterator<Item = String>) {
        let mut set = self.subscribed.write();
        for id in analysis_ids {
            set.remove(&id);
        }
    }

    pub fn is_subscribed(&self, analysis_id: &str) -> bool {
        self.subscribed.read().contains(analysis_id)
    }

    /// Best-effort, non-blocking send. Returns `false` (caller should drop
    /// the session) if the queue is full or the receiver is gone.
    pub fn try_send(&self, event: LiveEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => false,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
