// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named message-type handlers (§4.5) and the default hook table (§10.4) the hub
//! wires up at startup.

pub mod ack;
pub mod chat;
pub mod delete;
pub mod presence;
pub mod typing;

use crate::hooks::{conn_hook_fn, handler_fn, HandlerTable, HookTable};

/// Register every named handler from §4.5's dispatch table. Anything not listed here
/// falls through to the dispatcher's default route.
pub fn build_default_handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.register("chat", handler_fn(chat::group));
    table.register("chat:group", handler_fn(chat::group));
    table.register("chat:private", handler_fn(chat::private));
    table.register("system:typing", handler_fn(typing::typing));
    table.register("system:presence", handler_fn(presence::presence));
    table.register("system:user_joined", handler_fn(ack::ignored_inbound));
    table.register("system:user_left", handler_fn(ack::ignored_inbound));
    table.register("message:delete", handler_fn(delete::delete));
    table.register("ack", handler_fn(ack::ack));
    table
}

/// Build the hub's default hook table: a debug-log `after_dispatch` and the
/// `on_disconnect` hook that synthesizes `user_left` + a refreshed presence snapshot
/// for every channel the departing session held (§9, §10.4).
pub fn build_default_hooks() -> HookTable {
    HookTable::new()
        .with_after_dispatch(handler_fn(|_state, session, envelope| async move {
            tracing::debug!(
                session_id = %session.session_id,
                envelope_id = %envelope.id,
                envelope_type = envelope.kind.as_str(),
                "dispatched"
            );
            Ok(())
        }))
        .with_on_disconnect(conn_hook_fn(presence::default_on_disconnect))
}
