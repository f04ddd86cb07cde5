// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `chat` / `chat:group` and `chat:private` handlers (§4.5).

use std::sync::Arc;

use anyhow::bail;

use crate::envelope::Envelope;
use crate::session::Session;
use crate::HubState;

/// Fan out to every session subscribed to `envelope.channel`, excluding the originating
/// session — the sender already rendered its own message optimistically.
pub async fn group(state: Arc<HubState>, session: Arc<Session>, envelope: Envelope) -> anyhow::Result<()> {
    let Some(channel) = envelope.channel.clone() else {
        bail!("chat requires a channel");
    };
    let targets = state.topology.sessions_of_channel(&channel).await;
    state.fan_out_excluding(&targets, &session.session_id, envelope);
    Ok(())
}

/// Fan out to every session of `envelope.recipient` (every device that user holds),
/// never echoing back to the originating session.
pub async fn private(state: Arc<HubState>, session: Arc<Session>, envelope: Envelope) -> anyhow::Result<()> {
    let Some(recipient) = envelope.recipient.clone() else {
        bail!("chat:private requires a recipient");
    };
    let targets = state.topology.sessions_of_user(&recipient).await;
    state.fan_out_excluding(&targets, &session.session_id, envelope);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeType;
    use crate::session::EnqueueOutcome;
    use crate::test_support::test_state;
    use serde_json::Map;

    fn chat_envelope(channel: Option<&str>, recipient: Option<&str>) -> Envelope {
        Envelope {
            id: "e1".to_owned(),
            kind: EnvelopeType::Chat,
            sender: "alice".to_owned(),
            recipient: recipient.map(str::to_owned),
            channel: channel.map(str::to_owned),
            payload: Map::new(),
            timestamp: 1,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn group_excludes_sender() {
        let state = test_state();
        let (a, mut a_rx) = state.register_test_session("a", "alice").await;
        let (_b, mut b_rx) = state.register_test_session("b", "bob").await;
        state.topology.subscribe("a", "general").await;
        state.topology.subscribe("b", "general").await;

        group(Arc::clone(&state), a, chat_envelope(Some("general"), None)).await.unwrap();

        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn group_without_channel_errors() {
        let state = test_state();
        let (a, _rx) = state.register_test_session("a", "alice").await;
        let err = group(state, a, chat_envelope(None, None)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn private_reaches_every_device_but_not_sender() {
        let state = test_state();
        let (r, mut r_rx) = state.register_test_session("r", "v").await;
        let (_p, mut p_rx) = state.register_test_session("p", "u").await;
        let (_q, mut q_rx) = state.register_test_session("q", "u").await;

        private(Arc::clone(&state), r, chat_envelope(None, Some("u"))).await.unwrap();

        assert!(r_rx.try_recv().is_err());
        assert!(p_rx.try_recv().is_ok());
        assert!(q_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn private_without_recipient_errors() {
        let state = test_state();
        let (r, _rx) = state.register_test_session("r", "v").await;
        let err = private(state, r, chat_envelope(None, None)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn private_to_user_with_no_sessions_is_a_noop() {
        let state = test_state();
        let (r, mut r_rx) = state.register_test_session("r", "v").await;
        private(Arc::clone(&state), r, chat_envelope(None, Some("ghost"))).await.unwrap();
        assert!(r_rx.try_recv().is_err());
        let _ = EnqueueOutcome::Delivered; // keep import honest if reordered
    }
}
