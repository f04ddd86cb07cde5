// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `system:presence` handler and the default `on_disconnect` hook (§4.5, §10.4).
//!
//! Two distinct flows share this file because they produce the same pair of
//! hub-synthesized envelopes from opposite ends of channel membership: joining fans out
//! `system:user_joined` then a refreshed `system:presence`; leaving (driven by
//! disconnect, not by an inbound envelope) fans out `system:user_left` then the same
//! refreshed presence snapshot.

use std::sync::Arc;

use anyhow::bail;
use serde_json::{Map, Value};

use crate::envelope::{Envelope, EnvelopeType};
use crate::session::Session;
use crate::HubState;

/// `system:presence` (§4.5): `payload.action == "join"` subscribes the session to the
/// channel and announces it; every invocation re-synthesizes a fresh snapshot fan-out
/// afterward, since a client may poll presence without joining anything new.
pub async fn presence(
    state: Arc<HubState>,
    session: Arc<Session>,
    envelope: Envelope,
) -> anyhow::Result<()> {
    let Some(channel) = envelope.channel.clone() else {
        bail!("system:presence requires a channel");
    };

    let action = envelope.payload.get("action").and_then(Value::as_str).unwrap_or("");
    if action == "join" {
        state.topology.subscribe(&session.session_id, &channel).await;
        let joined = Envelope::synthesize(
            EnvelopeType::SystemUserJoined,
            channel.clone(),
            user_payload(&session.user_id),
        );
        let targets = state.topology.sessions_of_channel(&channel).await;
        state.fan_out(&targets, joined);
    }

    announce_presence(&state, &channel).await;
    Ok(())
}

/// Default `on_disconnect` hook (§10.4): for every channel the departing session held,
/// detach it from that channel first so the `user_left`/refreshed-presence fan-out that
/// follows reflects the post-departure membership — the session is still registered in
/// the topology at this point, only unsubscribed, which is exactly the state
/// `active_users_of_channel` needs to exclude it correctly.
pub async fn default_on_disconnect(state: Arc<HubState>, session: Arc<Session>) -> anyhow::Result<()> {
    for channel in session.subscriptions() {
        state.topology.unsubscribe(&session.session_id, &channel).await;

        let left = Envelope::synthesize(
            EnvelopeType::SystemUserLeft,
            channel.clone(),
            user_payload(&session.user_id),
        );
        let targets = state.topology.sessions_of_channel(&channel).await;
        state.fan_out(&targets, left);

        announce_presence(&state, &channel).await;
    }
    Ok(())
}

async fn announce_presence(state: &Arc<HubState>, channel: &str) {
    let users = state.topology.active_users_of_channel(channel).await;
    let presence_env = Envelope::synthesize(
        EnvelopeType::SystemPresence,
        channel.to_owned(),
        users_payload(users),
    );
    let targets = state.topology.sessions_of_channel(channel).await;
    state.fan_out(&targets, presence_env);
}

fn user_payload(user_id: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("user".to_owned(), Value::String(user_id.to_owned()));
    map
}

fn users_payload(users: Vec<String>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("users".to_owned(), Value::Array(users.into_iter().map(Value::String).collect()));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use serde_json::json;

    fn join_envelope(channel: &str) -> Envelope {
        let mut payload = Map::new();
        payload.insert("action".to_owned(), json!("join"));
        Envelope {
            id: "e1".to_owned(),
            kind: EnvelopeType::SystemPresence,
            sender: "alice".to_owned(),
            recipient: None,
            channel: Some(channel.to_owned()),
            payload,
            timestamp: 1,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn join_subscribes_and_announces_to_existing_members() {
        let state = test_state();
        let (a, mut a_rx) = state.register_test_session("a", "alice").await;
        let (b, mut b_rx) = state.register_test_session("b", "bob").await;
        state.topology.subscribe("b", "lobby").await;

        presence(Arc::clone(&state), Arc::clone(&a), join_envelope("lobby")).await.unwrap();

        // b sees user_joined then the refreshed presence snapshot.
        let first: Envelope = b_rx.try_recv().unwrap();
        assert_eq!(first.kind, EnvelopeType::SystemUserJoined);
        let second: Envelope = b_rx.try_recv().unwrap();
        assert_eq!(second.kind, EnvelopeType::SystemPresence);

        // a (the joiner) also receives both, since it's now a channel member.
        assert!(a_rx.try_recv().is_ok());
        assert!(a_rx.try_recv().is_ok());
        let _ = b;
    }

    #[tokio::test]
    async fn presence_without_channel_errors() {
        let state = test_state();
        let (a, _rx) = state.register_test_session("a", "alice").await;
        let mut envelope = join_envelope("lobby");
        envelope.channel = None;
        let err = presence(state, a, envelope).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn disconnect_announces_user_left_excluding_departed_session() {
        let state = test_state();
        let (a, mut a_rx) = state.register_test_session("a", "alice").await;
        let (_b, mut b_rx) = state.register_test_session("b", "bob").await;
        state.topology.subscribe("a", "lobby").await;
        state.topology.subscribe("b", "lobby").await;
        let _ = a_rx.try_recv(); // drain nothing, a never received anything yet

        default_on_disconnect(Arc::clone(&state), Arc::clone(&a)).await.unwrap();

        let left: Envelope = b_rx.try_recv().unwrap();
        assert_eq!(left.kind, EnvelopeType::SystemUserLeft);
        let presence_env: Envelope = b_rx.try_recv().unwrap();
        assert_eq!(presence_env.kind, EnvelopeType::SystemPresence);
        let users = presence_env.payload.get("users").unwrap().as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].as_str().unwrap(), "bob");

        // the departing session's own outbox never gets these (already unsubscribed
        // before the fan-out, and excluded from sessions_of_channel).
        assert!(a_rx.try_recv().is_err());
    }
}
