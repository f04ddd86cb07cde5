// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-client session state: outbound queue, liveness bookkeeping, terminal lifecycle.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::envelope::{epoch_millis, Envelope};

/// Outcome of an [`Session::enqueue`] call.
///
/// Enqueue is non-blocking by construction (§4.1): a full or closed outbox never stalls
/// the caller, it just reports why the envelope didn't make it onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Delivered,
    DroppedFull,
    DroppedClosed,
}

/// One accepted client connection.
///
/// `outbox` is a bounded single-consumer multi-producer channel (`tokio::mpsc`, fixed
/// capacity). The writer coroutine is the sole consumer; the dispatcher and handlers are
/// the producers, reached through `enqueue`, never through the channel directly.
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    subscriptions: Mutex<HashSet<String>>,
    pub extra: Mutex<serde_json::Map<String, Value>>,
    pub created_at: i64,
    last_seen: AtomicI64,
    outbox_tx: mpsc::Sender<Envelope>,
    closed: CancellationToken,
}

impl Session {
    /// Construct a new session and its outbox. Returns the session plus the receiving
    /// half the writer coroutine drains.
    pub fn new(
        session_id: String,
        user_id: String,
        outbox_capacity: usize,
    ) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(outbox_capacity.max(1));
        let now = epoch_millis();
        let session = Self {
            session_id,
            user_id,
            subscriptions: Mutex::new(HashSet::new()),
            extra: Mutex::new(serde_json::Map::new()),
            created_at: now,
            last_seen: AtomicI64::new(now),
            outbox_tx: tx,
            closed: CancellationToken::new(),
        };
        (session, rx)
    }

    /// Non-blocking enqueue onto the outbox. Never blocks the caller (§4.1, §5): a full
    /// outbox drops the envelope for this destination only, a closed session drops it too.
    pub fn enqueue(&self, envelope: Envelope) -> EnqueueOutcome {
        if self.closed.is_cancelled() {
            return EnqueueOutcome::DroppedClosed;
        }
        match self.outbox_tx.try_send(envelope) {
            Ok(()) => EnqueueOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => EnqueueOutcome::DroppedFull,
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::DroppedClosed,
        }
    }

    /// Transition to terminal: idempotent, unblocks the writer's `recv` loop by dropping
    /// all senders implicitly once every `Arc<Session>` clone is released, but the
    /// cancellation token is the signal the writer actually selects on so teardown is
    /// immediate rather than waiting on reference counts.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn last_seen(&self) -> i64 {
        self.last_seen.load(Ordering::Relaxed)
    }

    /// Advance `last_seen` to now. Called on every successfully parsed inbound frame and
    /// every successful keepalive response (§3, §4.3).
    pub fn touch(&self) {
        self.last_seen.store(epoch_millis(), Ordering::Relaxed);
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap_or_else(|p| p.into_inner()).iter().cloned().collect()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.lock().unwrap_or_else(|p| p.into_inner()).contains(channel)
    }

    /// Returns `true` if this call actually added the channel (idempotent otherwise).
    pub(crate) fn add_subscription(&self, channel: &str) -> bool {
        self.subscriptions.lock().unwrap_or_else(|p| p.into_inner()).insert(channel.to_owned())
    }

    /// Returns `true` if this call actually removed the channel.
    pub(crate) fn remove_subscription(&self, channel: &str) -> bool {
        self.subscriptions.lock().unwrap_or_else(|p| p.into_inner()).remove(channel)
    }
}
