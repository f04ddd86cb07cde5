// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay hub: a concurrent WebSocket fan-out server (§1, §2).
//!
//! [`HubState`] is the one piece of process-wide shared state. It is built once in
//! [`run`] and handed to every task as an `Arc` clone; nothing about it changes shape
//! after startup — the handler table and hook table are immutable, and the only mutable
//! state it fronts (the [`Topology`] registry) guards its own lock internally.

pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod session;
pub mod supervisor;
pub mod topology;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::dispatcher::WorkItem;
use crate::envelope::Envelope;
use crate::hooks::{HandlerTable, HookTable};
use crate::session::{EnqueueOutcome, Session};
use crate::topology::Topology;

/// Process-wide shared state: configuration, the topology registry, the handler/hook
/// tables, the shutdown signal, and the sending half of the dispatcher's work queue.
pub struct HubState {
    pub config: HubConfig,
    pub topology: Topology,
    pub handlers: HandlerTable,
    pub hooks: HookTable,
    pub shutdown: CancellationToken,
    pub work_tx: mpsc::Sender<WorkItem>,
}

impl HubState {
    pub fn new(
        config: HubConfig,
        handlers: HandlerTable,
        hooks: HookTable,
        shutdown: CancellationToken,
        work_tx: mpsc::Sender<WorkItem>,
    ) -> Self {
        let topology = Topology::new(config.max_connections);
        Self { config, topology, handlers, hooks, shutdown, work_tx }
    }

    /// Enqueue `envelope` onto every session in `targets`, cloning it per destination.
    /// A drop (full or closed outbox) is logged at debug and never surfaced to the
    /// caller — per-destination back-pressure is invisible to the sender (§4.1, §5).
    pub fn fan_out(&self, targets: &[Arc<Session>], envelope: Envelope) {
        for session in targets {
            self.enqueue_one(session, envelope.clone());
        }
    }

    /// Like [`Self::fan_out`], but skips the session whose id matches `exclude_session_id`
    /// — the per-handler sender-exclusion rule used by `chat`/`chat:private` (§4.5).
    pub fn fan_out_excluding(
        &self,
        targets: &[Arc<Session>],
        exclude_session_id: &str,
        envelope: Envelope,
    ) {
        for session in targets {
            if session.session_id == exclude_session_id {
                continue;
            }
            self.enqueue_one(session, envelope.clone());
        }
    }

    fn enqueue_one(&self, session: &Arc<Session>, envelope: Envelope) {
        match session.enqueue(envelope) {
            EnqueueOutcome::Delivered => {}
            EnqueueOutcome::DroppedFull => {
                tracing::debug!(session_id = %session.session_id, "outbox full, dropped envelope");
            }
            EnqueueOutcome::DroppedClosed => {
                tracing::debug!(session_id = %session.session_id, "session closed, dropped envelope");
            }
        }
    }
}

/// Run the relay hub until `shutdown` fires or the listener errors.
pub async fn run(config: HubConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let (work_tx, work_rx) = mpsc::channel(config.work_queue_capacity);
    let dispatch_workers = config.dispatch_workers;
    let handlers = handlers::build_default_handlers();
    let hooks = handlers::build_default_hooks();

    let state = Arc::new(HubState::new(config, handlers, hooks, shutdown.clone(), work_tx));
    dispatcher::spawn_workers(Arc::clone(&state), work_rx, dispatch_workers);

    tracing::info!(addr = %addr, "relay hub listening");
    let router = transport::build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
