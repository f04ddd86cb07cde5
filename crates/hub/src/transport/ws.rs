// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-session Transport Loop (C3): the `/ws` upgrade, and the reader/writer
//! coroutine pair that carry framed JSON envelopes in both directions.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;

use crate::envelope::Envelope;
use crate::error::HubError;
use crate::session::Session;
use crate::supervisor;
use crate::HubState;

/// Query parameters for the `/ws` upgrade.
#[derive(Debug, Deserialize, Default)]
pub struct WsQuery {
    pub user_id: Option<String>,
}

/// `GET /ws` — WebSocket upgrade for a relay session (§6).
///
/// Admission is checked *before* the upgrade so a refused client never sees the protocol
/// switch (§9, open question resolved: refuse the upgrade, not a post-upgrade close). The
/// check here races benignly against concurrent upgrades that pass it simultaneously; the
/// authoritative, atomic ceiling enforcement is `Topology::register`, which runs once the
/// socket is open. A session that loses that race is closed immediately without having
/// ever been registered, so no hook fires for it (§4.6) — the same outcome the client
/// would see from a hard upgrade refusal, just one round-trip later in the rare case.
pub async fn ws_handler(
    State(state): State<Arc<HubState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if state.shutdown.is_cancelled() {
        let (status, body) = HubError::AdmissionRefused.to_http_response("hub is shutting down");
        return (status, body).into_response();
    }
    if state.topology.session_count().await >= state.config.max_connections {
        let (status, body) =
            HubError::AdmissionRefused.to_http_response("max_connections reached");
        return (status, body).into_response();
    }

    let user_id = query.user_id.filter(|s| !s.is_empty()).unwrap_or_else(default_user_id);
    ws.on_upgrade(move |socket| supervisor::run_session(state, socket, user_id)).into_response()
}

/// Synthesize a user id when the client omits `?user_id=` (§6).
fn default_user_id() -> String {
    format!("user_{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

pub(crate) type WsSink = SplitSink<WebSocket, Message>;
pub(crate) type WsSource = SplitStream<WebSocket>;

/// Split an upgraded socket into sink/stream halves for the reader/writer pair.
pub(crate) fn split(socket: WebSocket) -> (WsSink, WsSource) {
    socket.split()
}

/// Reader coroutine (§4.3): decode one envelope per frame, normalize it, run
/// `before_dispatch`, and hand it to the Dispatcher's shared work queue.
///
/// Terminates on frame error, peer-initiated close, or read-deadline expiry. A malformed
/// JSON frame is *not* terminal — it is logged and dropped, and the loop continues.
pub(crate) async fn run_reader(state: Arc<HubState>, session: Arc<Session>, mut rx: WsSource) {
    let pong_wait = state.config.pong_wait();
    let mut deadline = TokioInstant::now() + pong_wait;
    let cancel = session.cancellation();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            _ = state.shutdown.cancelled() => break,

            () = tokio::time::sleep_until(deadline) => {
                tracing::debug!(session_id = %session.session_id, "read deadline expired");
                break;
            }

            frame = rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Envelope>(&text) {
                            Ok(mut envelope) => {
                                envelope.normalize_ingress(&session.user_id);
                                session.touch();
                                if !state.hooks.run_before_dispatch(&state, &session, &envelope).await {
                                    continue;
                                }
                                if state.work_tx.send((Arc::clone(&session), envelope)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(
                                    session_id = %session.session_id,
                                    err = %e,
                                    "frame-decode error, dropping frame"
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        session.touch();
                        deadline = TokioInstant::now() + pong_wait;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ping/Binary: not part of the envelope protocol.
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session.session_id, err = %e, "read error");
                        break;
                    }
                }
            }
        }
    }
}

/// Writer coroutine (§4.3): drains the outbox and emits keepalive pings on a timer.
/// Writes and probes use a bounded deadline; exceeding it terminates the session.
pub(crate) async fn run_writer(
    state: Arc<HubState>,
    session: Arc<Session>,
    mut tx: WsSink,
    mut outbox_rx: mpsc::Receiver<Envelope>,
) {
    let write_timeout = state.config.write_timeout();
    let mut ticker = tokio::time::interval(state.config.ping_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let cancel = session.cancellation();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            _ = state.shutdown.cancelled() => break,

            _ = ticker.tick() => {
                if send_with_deadline(&mut tx, Message::Ping(Vec::new().into()), write_timeout).await.is_err() {
                    break;
                }
            }

            envelope = outbox_rx.recv() => {
                match envelope {
                    Some(envelope) => {
                        let Ok(json) = serde_json::to_string(&envelope) else { continue };
                        if send_with_deadline(&mut tx, Message::Text(json.into()), write_timeout).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    session.close();
}

async fn send_with_deadline(
    tx: &mut WsSink,
    message: Message,
    deadline: Duration,
) -> Result<(), ()> {
    match tokio::time::timeout(deadline, tx.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) | Err(_) => Err(()),
    }
}
