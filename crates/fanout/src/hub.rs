// SPDX-License-Identifier: MIT

//! The live-event fan-out: a `sessionId -> SseSession` map
//! guarded by a readers-writer lock, with addressing helpers layered on top.
//! Delivery is always best-effort and never blocks a producer; a session
//! whose queue overflows is removed and the client is expected to reconnect
//! and catch up from the permanent log file.

use crate::session::{SessionId, SseSession};
use ao_core::LiveEvent;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct FanoutHub {
    sessions: RwLock<HashMap<SessionId, Arc<SseSession>>>,
}

impl FanoutHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&self, user_id: impl Into<String>, is_admin: bool) -> (Arc<SseSession>, mpsc::Receiver<LiveEvent>) {
        let (session, rx) = SseSession::new(user_id, is_admin);
        let session = Arc::new(session);
        self.sessions.write().insert(session.id, Arc::clone(&session));
        (session, rx)
    }

    pub fn remove_client(&self, session_id: &SessionId) {
        self.sessions.write().remove(session_id);
    }

    pub fn subscribe(&self, session_id: &SessionId, analysis_ids: impl IntoIterator<Item = String>) {
        if let Some(session) = self.sessions.read().get(session_id) {
            session.subscribe(analysis_ids);
        }
    }

    pub fn unsubscribe(&self, session_id: &SessionId, analysis_ids: impl IntoIterator<Item = String>) {
        if let Some(session) = self.sessions.read().get(session_id) {
            session.unsubscribe(analysis_ids);
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Delivers `event` to every session whose subscription set matches the
    /// event's analysis id (`log`, `analysisUpdate`, and related
    /// per-analysis event kinds). Events with no analysis id (team/user/admin
    /// scoped) are not delivered through this path — use the addressing
    /// helpers below.
    pub fn broadcast_update(&self, event: LiveEvent) {
        let Some(analysis_id) = event.analysis_id().cloned() else {
            return;
        };
        self.deliver_and_reap(|session| session.is_subscribed(analysis_id.as_str()), event);
    }

    /// Lifecycle-state change for one analysis — same matching rule as
    /// `broadcast_update`, kept as a distinct method name for callers that
    /// only ever emit analysis-lifecycle events.
    pub fn broadcast_analysis_update(&self, event: LiveEvent) {
        self.broadcast_update(event);
    }

    /// Delivered to every session regardless of subscription, e.g.
    /// `userRoleUpdated`, `teamDeleted` — matches no single analysis id.
    pub fn broadcast_all(&self, event: LiveEvent) {
        self.deliver_and_reap(|_| true, event);
    }

    pub fn broadcast_to_admin_users(&self, event: LiveEvent) {
        self.deliver_and_reap(|session| session.is_admin, event);
    }

    pub fn send_to_user(&self, user_id: &str, event: LiveEvent) {
        self.deliver_and_reap(|session| session.user_id == user_id, event);
    }

    /// Delivered only to sessions in `user_ids` — used when the caller
    /// (typically the HTTP layer backed by `ao-access`) has already resolved
    /// "who can see this team's analyses".
    pub fn send_to_users(&self, user_ids: &std::collections::HashSet<String>, event: LiveEvent) {
        self.deliver_and_reap(|session| user_ids.contains(&session.user_id), event);
    }

    /// Tells the client to re-fetch its init bundle — modeled as a
    /// zero-payload lifecycle event addressed to one user.
    pub fn refresh_init_data_for_user(&self, user_id: &str) {
        self.send_to_user(user_id, LiveEvent::UserTeamsUpdated { user_id: user_id.to_string() });
    }

    fn deliver_and_reap(&self, matches: impl Fn(&SseSession) -> bool, event: LiveEvent) {
        let mut dead = Vec::new();
        {
            let sessions = self.sessions.read();
            for session in sessions.values() {
                if matches(session) && !session.try_send(event.clone()) {
                    dead.push(session.id);
                }
            }
        }
        if !dead.is_empty() {
            let mut sessions = self.sessions.write();
            for id in dead {
                sessions.remove(&id);
            }
        }
    }
}
