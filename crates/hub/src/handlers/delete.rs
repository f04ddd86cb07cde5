// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `message:delete` handler (§4.5): same audience rule as the default route
//! (channel wins over recipient), but registered explicitly since deletions are never
//! meant to fall back to a full broadcast when both are absent.

use std::sync::Arc;

use crate::envelope::Envelope;
use crate::session::Session;
use crate::HubState;

pub async fn delete(
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
