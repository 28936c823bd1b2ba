//! The wire envelope and its typed payloads.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::peer::PeerId;
use crate::Result;

/// Discriminator for the envelope's `type` field.
///
/// Unrecognized values decode into [`MessageKind::Unknown`] and re-encode
/// unchanged, so mixed-version peers keep exchanging pings even when one
/// side speaks a newer protocol revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Advertise name, endpoint and models to a peer.
    Register,
    /// A chat-completion request to be served by the receiving agent.
    Chat,
    /// Reply carrying a chat-completion result.
    Complete,
    /// Liveness probe, empty payload.
    Ping,
    /// Liveness (or generic) acknowledgement, empty payload.
    Pong,
    /// Reply carrying a textual error description.
    Error,
    /// Broadcast resource advertisement.
    Announce,
    /// A kind introduced by a newer protocol revision.
    #[serde(untagged)]
    Unknown(String),
}

/// The unit of exchange between peers.
///
/// An envelope is constructed immediately before transmission, never
/// mutated afterwards, and discarded once dispatched or answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind; drives handler dispatch.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Sender identity.
    pub from: PeerId,
    /// Addressed recipient, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PeerId>,
    /// Caller-generated correlation token. Informational for the
    /// receiving handler; the exchange itself correlates by stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Kind-dependent payload, opaque to the protocol layer.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Envelope {
    /// Creates an envelope with an empty payload.
    #[must_use]
    pub fn new(kind: MessageKind, from: PeerId) -> Self {
        Self {
            kind,
            from,
            to: None,
            request_id: None,
            payload: Value::Null,
        }
    }

    /// Sets the addressed recipient.
    #[must_use]
    pub fn with_to(mut self, to: PeerId) -> Self {
        self.to = Some(to);
        self
    }

    /// Sets the correlation token.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attaches a serialized payload.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = serde_json::to_value(payload)?;
        Ok(self)
    }

    /// Deserializes the payload into its typed form.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Encodes the envelope to its wire form.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decodes an envelope from its wire form.
    ///
    /// Fails with [`crate::P2pError::MalformedEnvelope`] on structurally
    /// invalid input; an unrecognized `type` value is not an error.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Registration metadata advertised with [`MessageKind::Register`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPayload {
    /// Display name the agent claims on the network.
    pub agent_name: String,
    /// Endpoint the agent is reachable at.
    pub endpoint: String,
    /// Models the agent can serve.
    #[serde(default)]
    pub models: Vec<String>,
}

/// Resource advertisement carried by [`MessageKind::Announce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncePayload {
    /// Resource kind, e.g. "repo", "tool", "skill".
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// Where to find it.
    pub url: String,
    /// What it does.
    pub description: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role, e.g. "user" or "assistant".
    pub role: String,
    /// The message text.
    pub content: String,
}

/// A chat-completion request carried by [`MessageKind::Chat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model the request is addressed to.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
}

/// One completion choice within a [`ChatResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Position of this choice in the response.
    pub index: u32,
    /// The completion itself.
    pub message: ChatMessage,
}

/// A chat-completion result carried by [`MessageKind::Complete`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Backend-assigned completion ID.
    pub id: String,
    /// Object tag, e.g. "chat.completion".
    pub object: String,
    /// Creation time, seconds since the epoch.
    pub created: i64,
    /// Model that produced the completion.
    pub model: String,
    /// Completion choices.
    pub choices: Vec<ChatChoice>,
}

/// Error description carried by [`MessageKind::Error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable description of why the request was not honored.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::P2pError;

    #[test]
    fn register_envelope_roundtrip() {
        let payload = RegisterPayload {
            agent_name: "alice".to_string(),
            endpoint: "http://localhost:8080".to_string(),
            models: vec!["gpt-4".to_string(), "gpt-3.5-turbo".to_string()],
        };
        let envelope = Envelope::new(MessageKind::Register, PeerId::new("peer-a"))
            .with_payload(&payload)
            .unwrap();

        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.payload_as::<RegisterPayload>().unwrap(), payload);
    }

    #[test]
    fn chat_envelope_roundtrip_keeps_request_id() {
        let request = ChatRequest {
            model: "gpt-4".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hello".to_string(),
            }],
        };
        let envelope = Envelope::new(MessageKind::Chat, PeerId::new("peer-a"))
            .with_to(PeerId::new("peer-b"))
            .with_request_id("req-42")
            .with_payload(&request)
            .unwrap();

        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.request_id.as_deref(), Some("req-42"));
    }

    #[test]
    fn announce_envelope_roundtrip() {
        let payload = AnnouncePayload {
            kind: "repo".to_string(),
            name: "agentnet".to_string(),
            url: "https://example.com/agentnet".to_string(),
            description: "peer mesh for agents".to_string(),
            tags: vec!["p2p".to_string(), "agents".to_string()],
        };
        let envelope = Envelope::new(MessageKind::Announce, PeerId::new("peer-a"))
            .with_payload(&payload)
            .unwrap();

        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.payload_as::<AnnouncePayload>().unwrap(), payload);
    }

    #[test]
    fn ping_omits_empty_fields_on_the_wire() {
        let envelope = Envelope::new(MessageKind::Ping, PeerId::new("peer-a"));
        let wire = String::from_utf8(envelope.encode().unwrap().to_vec()).unwrap();
        assert_eq!(wire, r#"{"type":"ping","from":"peer-a"}"#);

        let decoded = Envelope::decode(wire.as_bytes()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn unknown_kind_decodes_and_reencodes_unchanged() {
        let wire = br#"{"type":"gossip","from":"peer-z","payload":{"hops":3}}"#;
        let decoded = Envelope::decode(wire).unwrap();
        assert_eq!(decoded.kind, MessageKind::Unknown("gossip".to_string()));
        assert_eq!(decoded.payload["hops"], 3);

        let reencoded = Envelope::decode(&decoded.encode().unwrap()).unwrap();
        assert_eq!(reencoded, decoded);
    }

    #[test]
    fn structurally_invalid_input_is_malformed() {
        let err = Envelope::decode(b"not json at all").unwrap_err();
        assert!(matches!(err, P2pError::MalformedEnvelope(_)));

        // A missing `type` field is also malformed: the kind invariant
        // holds for every decoded envelope.
        let err = Envelope::decode(br#"{"from":"peer-a"}"#).unwrap_err();
        assert!(matches!(err, P2pError::MalformedEnvelope(_)));
    }

    #[test]
    fn error_payload_roundtrip() {
        let envelope = Envelope::new(MessageKind::Error, PeerId::new("peer-b"))
            .with_payload(&ErrorPayload {
                error: "agent name 'alice' is already taken by peer peer-a".to_string(),
            })
            .unwrap();

        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }
}
