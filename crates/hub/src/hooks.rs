// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Handler Table (C5) and the four lifecycle hook points.
//!
//! Both tables are built once at startup (`HubState::new`/`HubStateBuilder`) and never
//! mutated afterward, so the hot dispatch path reads them without any lock — the same
//! discipline the teacher applies to its handler/middleware stack, which is wired once
//! into the axum `Router` and is otherwise read-only.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::envelope::Envelope;
use crate::session::Session;
use crate::HubState;

pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A per-message-type callback: `(state, originating session, envelope) -> Result<()>`.
pub type HandlerFn = Arc<dyn Fn(Arc<HubState>, Arc<Session>, Envelope) -> HandlerFuture + Send + Sync>;

/// `before_dispatch`/`after_dispatch` share this signature.
pub type DispatchHook = Arc<dyn Fn(Arc<HubState>, Arc<Session>, Envelope) -> HandlerFuture + Send + Sync>;

/// `on_connect`/`on_disconnect` share this signature.
pub type ConnHook = Arc<dyn Fn(Arc<HubState>, Arc<Session>) -> HandlerFuture + Send + Sync>;

/// Per-message-type handler callbacks, indexed by `envelope.type`.
#[derive(Default, Clone)]
pub struct HandlerTable {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_str: impl Into<String>, handler: HandlerFn) {
        self.handlers.insert(type_str.into(), handler);
    }

    pub fn get(&self, type_str: &str) -> Option<&HandlerFn> {
        self.handlers.get(type_str)
    }
}

/// The four optional lifecycle hook points (§3, §9). A non-empty error from
/// `before_dispatch` drops the envelope; errors from the others are logged and swallowed.
#[derive(Default, Clone)]
pub struct HookTable {
    pub before_dispatch: Option<DispatchHook>,
    pub after_dispatch: Option<DispatchHook>,
    pub on_connect: Option<ConnHook>,
    pub on_disconnect: Option<ConnHook>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_before_dispatch(mut self, hook: DispatchHook) -> Self {
        self.before_dispatch = Some(hook);
        self
    }

    pub fn with_after_dispatch(mut self, hook: DispatchHook) -> Self {
        self.after_dispatch = Some(hook);
        self
    }

    pub fn with_on_connect(mut self, hook: ConnHook) -> Self {
        self.on_connect = Some(hook);
        self
    }

    pub fn with_on_disconnect(mut self, hook: ConnHook) -> Self {
        self.on_disconnect = Some(hook);
        self
    }

    /// Returns `true` if the envelope should proceed to dispatch.
    pub async fn run_before_dispatch(
        &self,
        state: &Arc<HubState>,
        session: &Arc<Session>,
        envelope: &Envelope,
    ) -> bool {
        let Some(hook) = &self.before_dispatch else { return true };
        match hook(Arc::clone(state), Arc::clone(session), envelope.clone()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    session_id = %session.session_id,
                    envelope_id = %envelope.id,
                    err = %e,
                    "before_dispatch rejected envelope"
                );
                false
            }
        }
    }

    pub async fn run_after_dispatch(
        &self,
        state: &Arc<HubState>,
        session: &Arc<Session>,
        envelope: &Envelope,
    ) {
        let Some(hook) = &self.after_dispatch else { return };
        if let Err(e) = hook(Arc::clone(state), Arc::clone(session), envelope.clone()).await {
            tracing::warn!(
                session_id = %session.session_id,
                envelope_id = %envelope.id,
                err = %e,
                "after_dispatch hook failed"
            );
        }
    }

    pub async fn run_on_connect(&self, state: &Arc<HubState>, session: &Arc<Session>) {
        let Some(hook) = &self.on_connect else { return };
        if let Err(e) = hook(Arc::clone(state), Arc::clone(session)).await {
            tracing::warn!(session_id = %session.session_id, err = %e, "on_connect hook failed");
        }
    }

    pub async fn run_on_disconnect(&self, state: &Arc<HubState>, session: &Arc<Session>) {
        let Some(hook) = &self.on_disconnect else { return };
        if let Err(e) = hook(Arc::clone(state), Arc::clone(session)).await {
            tracing::warn!(session_id = %session.session_id, err = %e, "on_disconnect hook failed");
        }
    }
}

/// Build a [`HandlerFn`] from an async closure without requiring callers to box/pin by
/// hand at every registration site.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Arc<HubState>, Arc<Session>, Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |state, session, envelope| Box::pin(f(state, session, envelope)))
}

/// Build a [`ConnHook`] from an async closure, mirroring [`handler_fn`].
pub fn conn_hook_fn<F, Fut>(f: F) -> ConnHook
where
    F: Fn(Arc<HubState>, Arc<Session>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |state, session| Box::pin(f(state, session)))
}
