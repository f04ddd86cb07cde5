// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single wire message shape exchanged in both directions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Enumerated `type` tag for an [`Envelope`].
///
/// `chat` and `chat:group` are treated as synonyms — both route through the group-chat
/// handler. Anything outside the named variants (`notification`, `alert`, `event`,
/// `event:custom`, or genuinely unknown strings) is preserved verbatim in `Other` and
/// falls through to the dispatcher's default route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnvelopeType {
    Chat,
    ChatPrivate,
    SystemTyping,
    SystemPresence,
    SystemUserJoined,
    SystemUserLeft,
    MessageDelete,
    Ack,
    Other(String),
}

impl EnvelopeType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Chat => "chat",
            Self::ChatPrivate => "chat:private",
            Self::SystemTyping => "system:typing",
            Self::SystemPresence => "system:presence",
            Self::SystemUserJoined => "system:user_joined",
            Self::SystemUserLeft => "system:user_left",
            Self::MessageDelete => "message:delete",
            Self::Ack => "ack",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for EnvelopeType {
    fn from(s: &str) -> Self {
        match s {
            "chat" | "chat:group" => Self::Chat,
            "chat:private" => Self::ChatPrivate,
            "system:typing" => Self::SystemTyping,
            "system:presence" => Self::SystemPresence,
            "system:user_joined" => Self::SystemUserJoined,
            "system:user_left" => Self::SystemUserLeft,
            "message:delete" => Self::MessageDelete,
            "ack" => Self::Ack,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl Serialize for EnvelopeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EnvelopeType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EnvelopeType::from(s.as_str()))
    }
}

/// The single JSON shape exchanged on the wire, in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    #[serde(default)]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Envelope {
    /// Normalize an inbound envelope per §4.3: assign `id`/`timestamp` if unset, and
    /// override `sender` with the originating session's user id if the client left it
    /// empty. Called by the reader before handing the envelope to the dispatcher.
    pub fn normalize_ingress(&mut self, session_user_id: &str) {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        if self.timestamp == 0 {
            self.timestamp = epoch_millis();
        }
        if self.sender.is_empty() {
            self.sender = session_user_id.to_owned();
        }
    }

    /// Build a hub-synthesized envelope (presence, user_joined/left). Synthesized
    /// envelopes carry only the defined keys — no passthrough `metadata`.
    pub fn synthesize(kind: EnvelopeType, channel: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            sender: "system".to_owned(),
            recipient: None,
            channel: Some(channel.into()),
            payload,
            timestamp: epoch_millis(),
            metadata: None,
        }
    }
}

/// Current epoch milliseconds, used to stamp envelopes and cache entries.
pub fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_assigns_missing_fields() {
        let mut env = Envelope {
            id: String::new(),
            kind: EnvelopeType::Chat,
            sender: String::new(),
            recipient: None,
            channel: Some("general".to_owned()),
            payload: Map::new(),
            timestamp: 0,
            metadata: None,
        };
        env.normalize_ingress("alice");
        assert!(!env.id.is_empty());
        assert_eq!(env.sender, "alice");
        assert!(env.timestamp > 0);
    }

    #[test]
    fn normalize_preserves_caller_supplied_fields() {
        let mut env = Envelope {
            id: "custom-id".to_owned(),
            kind: EnvelopeType::Chat,
            sender: "explicit-sender".to_owned(),
            recipient: None,
            channel: Some("general".to_owned()),
            payload: Map::new(),
            timestamp: 42,
            metadata: None,
        };
        env.normalize_ingress("alice");
        assert_eq!(env.id, "custom-id");
        assert_eq!(env.sender, "explicit-sender");
        assert_eq!(env.timestamp, 42);
    }

    #[test]
    fn type_synonyms_round_trip() {
        assert_eq!(EnvelopeType::from("chat"), EnvelopeType::Chat);
        assert_eq!(EnvelopeType::from("chat:group"), EnvelopeType::Chat);
        assert_eq!(EnvelopeType::from("notification"), EnvelopeType::Other("notification".to_owned()));
    }

    #[test]
    fn unknown_type_round_trips_through_json() {
        let json = r#"{"id":"1","type":"event:custom","sender":"a","payload":{}}"#;
        let env: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.kind, EnvelopeType::Other("event:custom".to_owned()));
        let out = serde_json::to_string(&env).unwrap();
        assert!(out.contains("\"type\":\"event:custom\""));
    }
}
