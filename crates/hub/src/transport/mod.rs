// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the relay hub.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::HubState;

/// Build the axum `Router`: the `/ws` upgrade and the `/healthz` liveness probe.
/// Cross-origin upgrades are accepted unconditionally (§6) — there is no origin check,
/// since the hub has no notion of a same-origin browser client to defend.
pub fn build_router(state: Arc<HubState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/healthz", get(http::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
