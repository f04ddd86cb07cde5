// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Dispatcher (C4): drains the shared work queue, invokes the registered handler (or
//! the default route), and runs `after_dispatch`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::envelope::Envelope;
use crate::session::Session;
use crate::HubState;

/// One unit of dispatch work: the originating session and its normalized envelope.
pub type WorkItem = (Arc<Session>, Envelope);

/// Spawn `worker_count` dispatcher coroutines draining a shared bounded work queue.
///
/// `tokio::sync::mpsc::Receiver` has a single logical consumer; workers share one behind
/// a `Mutex` so that whichever worker is free next claims the next item, the same
/// work-stealing shape the teacher's background tasks get "for free" from having only one
/// consumer — generalized here to N, since the dispatcher is explicitly a worker pool
/// (§2, §4.4).
///
/// With `worker_count > 1`, two envelopes from the same originating session can land on
/// two different workers and reach a shared destination's outbox in reversed order —
/// the spec guarantees per-outbox FIFO, not a total order across senders, so this is
/// in-spec, but it means same-sender-to-same-destination ordering is only guaranteed
/// with a single worker.
pub fn spawn_workers(state: Arc<HubState>, rx: mpsc::Receiver<WorkItem>, worker_count: usize) {
    let rx = Arc::new(Mutex::new(rx));
    for _ in 0..worker_count.max(1) {
        let state = Arc::clone(&state);
        let rx = Arc::clone(&rx);
        tokio::spawn(async move {
            loop {
                let item = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                match item {
                    Some((session, envelope)) => dispatch_one(&state, session, envelope).await,
                    None => break,
                }
            }
        });
    }
}

async fn dispatch_one(state: &Arc<HubState>, session: Arc<Session>, envelope: Envelope) {
    let handler = state.handlers.get(envelope.kind.as_str()).cloned();
    match handler {
        Some(handler) => {
            if let Err(e) =
                handler(Arc::clone(state), Arc::clone(&session), envelope.clone()).await
            {
                tracing::warn!(
                    session_id = %session.session_id,
                    envelope_id = %envelope.id,
                    envelope_type = envelope.kind.as_str(),
                    err = %e,
                    "handler error"
                );
            }
        }
        None => default_route(state, &session, envelope.clone()).await,
    }

    state.hooks.run_after_dispatch(state, &session, &envelope).await;
}

/// The default route (§4.4): recipient wins over channel wins over broadcast-to-all.
/// Unlike the named handlers in §4.5, the default route never excludes the sender —
/// each registered handler makes that choice for itself.
async fn default_route(state: &Arc<HubState>, session: &Arc<Session>, envelope: Envelope) {
    if let Some(recipient) = envelope.recipient.clone().filter(|s| !s.is_empty()) {
        let targets = state.topology.sessions_of_user(&recipient).await;
        state.fan_out(&targets, envelope);
    } else if let Some(channel) = envelope.channel.clone().filter(|s| !s.is_empty()) {
        let targets = state.topology.sessions_of_channel(&channel).await;
        state.fan_out(&targets, envelope);
    } else {
        let targets = state.topology.snapshot_all().await;
        state.fan_out(&targets, envelope);
    }
    let _ = session; // the default route has no sender-exclusion rule to apply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeType;
    use crate::test_support::test_state;
    use serde_json::Map;

    fn envelope(recipient: Option<&str>, channel: Option<&str>) -> Envelope {
        Envelope {
            id: "e1".to_owned(),
            kind: EnvelopeType::Other("notification".to_owned()),
            sender: "system".to_owned(),
            recipient: recipient.map(str::to_owned),
            channel: channel.map(str::to_owned),
            payload: Map::new(),
            timestamp: 1,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn default_route_prefers_recipient_over_channel() {
        let state = test_state();
        let (a, mut a_rx) = state.register_test_session("a", "alice").await;
        let (_b, mut b_rx) = state.register_test_session("b", "bob").await;
        state.topology.subscribe("a", "general").await;
        state.topology.subscribe("b", "general").await;

        dispatch_one(&state, Arc::clone(&a), envelope(Some("alice"), Some("general"))).await;

        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn default_route_falls_back_to_broadcast() {
        let state = test_state();
        let (a, mut a_rx) = state.register_test_session("a", "alice").await;
        let (_b, mut b_rx) = state.register_test_session("b", "bob").await;

        dispatch_one(&state, Arc::clone(&a), envelope(None, None)).await;

        // broadcast does not exclude the sender
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn default_route_falls_back_to_channel_when_no_recipient() {
        let state = test_state();
        let (a, mut a_rx) = state.register_test_session("a", "alice").await;
        let (_b, mut b_rx) = state.register_test_session("b", "bob").await;
        state.topology.subscribe("b", "general").await;

        dispatch_one(&state, Arc::clone(&a), envelope(None, Some("general"))).await;

        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());
    }
}
