// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log-only inbound handlers (§4.5): `ack`, and the inbound `system:user_joined` /
//! `system:user_left` types a client might mistakenly send upstream. None of these fan
//! out — `user_joined`/`user_left` are hub-synthesized outbound events only, and an
//! `ack` is terminal by definition.

use std::sync::Arc;

use crate::envelope::Envelope;
use crate::session::Session;
use crate::HubState;

pub async fn ack(
    _state: Arc<HubState>,
    session: Arc<Session>,
    envelope: Envelope,
) -> anyhow::Result<()> {
    tracing::debug!(session_id = %session.session_id, envelope_id = %envelope.id, "ack received");
    Ok(())
}

pub async fn ignored_inbound(
    _state: Arc<HubState>,
    session: Arc<Session>,
    envelope: Envelope,
) -> anyhow::Result<()> {
    tracing::debug!(
        session_id = %session.session_id,
        envelope_id = %envelope.id,
        envelope_type = envelope.kind.as_str(),
        "inbound hub-synthesized event type logged, not fanned out"
    );
    Ok(())
}
