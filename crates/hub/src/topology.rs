// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Topology Registry: process-wide mapping of session id → session, user id →
//! sessions, and channel → sessions.
//!
//! A single `RwLock` protects all three indices together so that `register`/
//! `unregister`/`subscribe`/`unsubscribe` stay atomic with respect to each other and with
//! respect to readers — the bidirectional invariant between `channels` and each session's
//! own `subscriptions` set never observes a half-updated state. Every read method clones
//! out a snapshot (ids, or `Arc<Session>` clones) before returning, so the lock never
//! outlives a single method call and is never held across an outbox enqueue.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexSet;
use tokio::sync::RwLock;

use crate::error::HubError;
use crate::session::Session;

#[derive(Default)]
struct Indices {
    sessions: HashMap<String, Arc<Session>>,
    users: HashMap<String, HashSet<String>>,
    // Insertion-ordered so `active_users_of_channel` can read off true channel-join
    // order directly, rather than approximating it from session creation time.
    channels: HashMap<String, IndexSet<String>>,
}

/// Process-wide session/user/channel registry with a single lifecycle.
pub struct Topology {
    inner: RwLock<Indices>,
    max_connections: usize,
}

impl Topology {
    pub fn new(max_connections: usize) -> Self {
        Self { inner: RwLock::new(Indices::default()), max_connections }
    }

    /// Insert a session into the registry. Refuses admission once the ceiling is met
    /// (§4.2, §4.6) — the caller (the transport's accept path) must not have created any
    /// other per-session state yet, since admission failure invokes neither hook.
    pub async fn register(&self, session: Arc<Session>) -> Result<(), HubError> {
        let mut idx = self.inner.write().await;
        if idx.sessions.len() >= self.max_connections {
            return Err(HubError::AdmissionRefused);
        }
        idx.users.entry(session.user_id.clone()).or_default().insert(session.session_id.clone());
        idx.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    /// Remove a session from `sessions` and from every channel set it appears in.
    /// Idempotent: unregistering an already-absent session id is a no-op.
    pub async fn unregister(&self, session_id: &str) {
        let mut idx = self.inner.write().await;
        let Some(session) = idx.sessions.remove(session_id) else {
            return;
        };
        if let Some(set) = idx.users.get_mut(&session.user_id) {
            set.remove(session_id);
            if set.is_empty() {
                idx.users.remove(&session.user_id);
            }
        }
        for channel in session.subscriptions() {
            if let Some(set) = idx.channels.get_mut(&channel) {
                set.shift_remove(session_id);
                if set.is_empty() {
                    idx.channels.remove(&channel);
                }
            }
        }
    }

    /// Subscribe a session to a channel. No-op if already subscribed (idempotent).
    ///
    /// Holds the single topology write guard for the whole operation — the session's
    /// own subscription set and the `channels` bi-map move together, so a concurrent
    /// `unregister` can never observe (or leave) one side updated without the other.
    pub async fn subscribe(&self, session_id: &str, channel: &str) {
        let mut idx = self.inner.write().await;
        let Some(session) = idx.sessions.get(session_id).cloned() else { return };
        if !session.add_subscription(channel) {
            return;
        }
        idx.channels.entry(channel.to_owned()).or_default().insert(session_id.to_owned());
    }

    /// Unsubscribe a session from a channel. No-op if not currently subscribed. Deletes
    /// the channel entry entirely once its membership set becomes empty. Same single-
    /// write-guard discipline as [`Self::subscribe`].
    pub async fn unsubscribe(&self, session_id: &str, channel: &str) {
        let mut idx = self.inner.write().await;
        let Some(session) = idx.sessions.get(session_id).cloned() else { return };
        if !session.remove_subscription(channel) {
            return;
        }
        if let Some(set) = idx.channels.get_mut(channel) {
            set.shift_remove(session_id);
            if set.is_empty() {
                idx.channels.remove(channel);
            }
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.inner.read().await.sessions.get(session_id).cloned()
    }

    /// Snapshot of every session belonging to `user_id`. Empty if the user holds no
    /// sessions — a valid, harmless routing target (§4.5).
    pub async fn sessions_of_user(&self, user_id: &str) -> Vec<Arc<Session>> {
        let idx = self.inner.read().await;
        idx.users
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| idx.sessions.get(id).cloned())
            .collect()
    }

    /// Snapshot of every session subscribed to `channel`.
    pub async fn sessions_of_channel(&self, channel: &str) -> Vec<Arc<Session>> {
        let idx = self.inner.read().await;
        idx.channels
            .get(channel)
            .into_iter()
            .flatten()
            .filter_map(|id| idx.sessions.get(id).cloned())
            .collect()
    }

    /// Distinct user ids with at least one session in `channel`, in channel-join order
    /// (the order `subscribe` inserted them into the channel's `IndexSet`).
    pub async fn active_users_of_channel(&self, channel: &str) -> Vec<String> {
        let idx = self.inner.read().await;
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        if let Some(session_ids) = idx.channels.get(channel) {
            for id in session_ids {
                if let Some(session) = idx.sessions.get(id) {
                    if seen.insert(session.user_id.clone()) {
                        ordered.push(session.user_id.clone());
                    }
                }
            }
        }
        ordered
    }

    /// Snapshot of every registered session.
    pub async fn snapshot_all(&self) -> Vec<Arc<Session>> {
        self.inner.read().await.sessions.values().cloned().collect()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(id: &str, user: &str) -> Arc<Session> {
        let (session, _rx) = Session::new(id.to_owned(), user.to_owned(), 100);
        Arc::new(session)
    }

    #[tokio::test]
    async fn register_respects_ceiling() {
        let topology = Topology::new(1);
        topology.register(new_session("s1", "alice")).await.unwrap();
        let err = topology.register(new_session("s2", "bob")).await.unwrap_err();
        assert_eq!(err, HubError::AdmissionRefused);
        assert_eq!(topology.session_count().await, 1);
    }

    #[tokio::test]
    async fn dropping_a_session_frees_ceiling_slot() {
        let topology = Topology::new(1);
        topology.register(new_session("s1", "alice")).await.unwrap();
        topology.unregister("s1").await;
        topology.register(new_session("s2", "bob")).await.unwrap();
        assert_eq!(topology.session_count().await, 1);
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_and_bidirectional() {
        let topology = Topology::new(10);
        let session = new_session("s1", "alice");
        topology.register(Arc::clone(&session)).await.unwrap();

        topology.subscribe("s1", "general").await;
        topology.subscribe("s1", "general").await;

        assert_eq!(session.subscriptions(), vec!["general".to_owned()]);
        let members = topology.sessions_of_channel("general").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].session_id, "s1");
    }

    #[tokio::test]
    async fn unsubscribe_not_a_member_is_noop() {
        let topology = Topology::new(10);
        let session = new_session("s1", "alice");
        topology.register(Arc::clone(&session)).await.unwrap();
        topology.unsubscribe("s1", "general").await;
        assert!(session.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn unregister_removes_from_every_channel() {
        let topology = Topology::new(10);
        let session = new_session("s1", "alice");
        topology.register(Arc::clone(&session)).await.unwrap();
        topology.subscribe("s1", "general").await;
        topology.subscribe("s1", "random").await;

        topology.unregister("s1").await;

        assert!(topology.sessions_of_channel("general").await.is_empty());
        assert!(topology.sessions_of_channel("random").await.is_empty());
        assert_eq!(topology.session_count().await, 0);
    }

    #[tokio::test]
    async fn active_users_of_channel_dedupes_and_orders_first_seen() {
        let topology = Topology::new(10);
        let alice1 = new_session("s1", "alice");
        topology.register(Arc::clone(&alice1)).await.unwrap();
        topology.subscribe("s1", "dev").await;

        let bob = new_session("s2", "bob");
        topology.register(Arc::clone(&bob)).await.unwrap();
        topology.subscribe("s2", "dev").await;

        // alice's second device, should not duplicate "alice" in the listing.
        let alice2 = new_session("s3", "alice");
        topology.register(Arc::clone(&alice2)).await.unwrap();
        topology.subscribe("s3", "dev").await;

        let users = topology.active_users_of_channel("dev").await;
        assert_eq!(users, vec!["alice".to_owned(), "bob".to_owned()]);
    }

    #[tokio::test]
    async fn active_users_of_channel_reflects_join_order_not_creation_order() {
        let topology = Topology::new(10);
        // bob is created first but joins the channel after alice does — the listing
        // must follow join order, not `created_at`.
        let bob = new_session("s1", "bob");
        topology.register(Arc::clone(&bob)).await.unwrap();

        let alice = new_session("s2", "alice");
        topology.register(Arc::clone(&alice)).await.unwrap();
        topology.subscribe("s2", "dev").await;
        topology.subscribe("s1", "dev").await;

        let users = topology.active_users_of_channel("dev").await;
        assert_eq!(users, vec!["alice".to_owned(), "bob".to_owned()]);
    }

    #[tokio::test]
    async fn sessions_of_user_spans_devices() {
        let topology = Topology::new(10);
        topology.register(new_session("p", "u")).await.unwrap();
        topology.register(new_session("q", "u")).await.unwrap();
        topology.register(new_session("r", "v")).await.unwrap();

        let sessions = topology.sessions_of_user("u").await;
        let mut ids: Vec<_> = sessions.iter().map(|s| s.session_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["p".to_owned(), "q".to_owned()]);
    }

    #[tokio::test]
    async fn sessions_of_user_with_zero_sessions_is_empty() {
        let topology = Topology::new(10);
        assert!(topology.sessions_of_user("nobody").await.is_empty());
    }
}
