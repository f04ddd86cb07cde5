// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Lifecycle Supervisor (C6): acceptance gate, bounded admission, graceful
//! teardown, and the guarantee that `on_disconnect` fires exactly once per registered
//! session, happens-before its final removal from the topology (§4.6).

use std::sync::Arc;

use axum::extract::ws::WebSocket;

use crate::session::Session;
use crate::transport::ws;
use crate::HubState;

/// Drive one accepted WebSocket connection through its full lifecycle:
/// accepting → registered → terminating → terminal.
///
/// Admission failure (lost the post-upgrade race against `Topology`'s ceiling) returns
/// immediately without registering the session and without invoking either hook — the
/// accepting stage never transitioned to registered (§4.6).
pub async fn run_session(state: Arc<HubState>, socket: WebSocket, user_id: String) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (session, outbox_rx) = Session::new(session_id, user_id, state.config.outbox_capacity);
    let session = Arc::new(session);

    if let Err(e) = state.topology.register(Arc::clone(&session)).await {
        tracing::debug!(
            session_id = %session.session_id,
            err = %e,
            "admission refused for session created after a passed pre-upgrade check"
        );
        return;
    }

    tracing::info!(
        session_id = %session.session_id,
        user_id = %session.user_id,
        "session registered"
    );
    state.hooks.run_on_connect(&state, &session).await;

    let (ws_tx, ws_rx) = ws::split(socket);
    let reader =
        tokio::spawn(ws::run_reader(Arc::clone(&state), Arc::clone(&session), ws_rx));
    let writer =
        tokio::spawn(ws::run_writer(Arc::clone(&state), Arc::clone(&session), ws_tx, outbox_rx));

    // Either coroutine can exit first (frame error, deadline, peer close, shutdown); once
    // one does, `close()` wakes the other via its cancellation token so teardown doesn't
    // wait on a half of the pair that has no reason left to keep running.
    let _ = reader.await;
    session.close();
    let _ = writer.await;

    state.hooks.run_on_disconnect(&state, &session).await;
    state.topology.unregister(&session.session_id).await;

    tracing::info!(session_id = %session.session_id, "session torn down");
}
