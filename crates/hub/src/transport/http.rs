// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operational HTTP surface (§10.6): just enough to let a load balancer or operator
//! check liveness without opening a WebSocket.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::HubState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
}

/// `GET /healthz` — always `200 OK` once the process is serving; `sessions` reports the
/// current registered-session count.
pub async fn health(State(state): State<Arc<HubState>>) -> Json<HealthResponse> {
    let sessions = state.topology.session_count().await;
    Json(HealthResponse { status: "ok".to_owned(), sessions })
}
