// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `system:typing` handler (§4.5).
//!
//! Unified rule (§9 resolved open question): a channel-directed typing indicator always
//! includes the sender. There is no separate "exclude sender" path — the ambiguity in the
//! distilled spec between "including" and "excluding" sources is resolved in favor of
//! "including", since a client's other open tabs legitimately want to see their own
//! typing state echoed back.

use std::sync::Arc;

use crate::envelope::Envelope;
use crate::session::Session;
use crate::HubState;

pub async fn typing(
    state: Arc<HubState>,
    session: Arc<Session>,
    envelope: Envelope,
) -> anyhow::Result<()> {
    if let Some(channel) = envelope.channel.clone() {
        let targets = state.topology.sessions_of_channel(&channel).await;
        state.fan_out(&targets, envelope);
    } else if let Some(recipient) = envelope.recipient.clone() {
        let targets = state.topology.sessions_of_user(&recipient).await;
        state.fan_out(&targets, envelope);
    }
    let _ = session;
    Ok(())
}
