//! The client/server message envelope and payload classification.
//!
//! Every text frame exchanged with the server is a JSON object of the shape
//! `{"type": <string>, "message": <anything>}`. Two `type` values are
//! reserved for the connection manager itself: `clientid` (the server
//! assigns this session an identifier) and `ping` (the server probes
//! liveness and expects a `pong` echo). Everything else is application
//! data and is forwarded to subscribers untouched. Binary frames carry no
//! envelope at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::{Bytes, Message};

use crate::Result;

/// Reserved envelope type assigning the session identifier.
pub const KIND_CLIENT_ID: &str = "clientid";
/// Reserved envelope type for server liveness probes.
pub const KIND_PING: &str = "ping";
/// Envelope type of the probe reply.
pub const KIND_PONG: &str = "pong";

/// A single text-frame envelope.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type; decides whether the frame is handled by the manager
    /// or forwarded to subscribers.
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque body. Absent bodies decode as `null`.
    #[serde(default)]
    pub message: Value,
}

impl Envelope {
    /// Build the reply to a liveness probe, echoing the probe body.
    #[must_use]
    pub fn pong(message: Value) -> Self {
        Self {
            kind: KIND_PONG.to_owned(),
            message,
        }
    }
}

/// Body of a `clientid` envelope.
#[derive(Debug, Deserialize)]
struct AssignedId {
    id: Value,
}

/// Where an inbound text frame is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// The server assigned a session identifier.
    ClientId(Value),
    /// Liveness probe; the carried body must be echoed back.
    Ping(Value),
    /// Application data; forwarded to subscribers.
    Application(Value),
}

/// Classify an inbound text frame.
///
/// Fails when the frame is not a valid envelope, including a `clientid`
/// envelope whose body lacks the `id` field.
pub(crate) fn classify(text: &str) -> Result<Dispatch> {
    let envelope: Envelope = serde_json::from_str(text)?;
    match envelope.kind.as_str() {
        KIND_CLIENT_ID => {
            let assigned: AssignedId = serde_json::from_value(envelope.message)?;
            Ok(Dispatch::ClientId(assigned.id))
        }
        KIND_PING => Ok(Dispatch::Ping(envelope.message)),
        _ => Ok(Dispatch::Application(envelope.message)),
    }
}

/// An outgoing payload, and the shape of inbound application messages.
///
/// `Text` is JSON-encoded onto the wire; `Binary` passes through as-is.
/// Making the distinction a sum type keeps the branch exhaustive at the
/// call boundary instead of sniffing types at runtime.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Structured data, JSON-encoded into a text frame.
    Text(Value),
    /// Raw bytes, sent as a binary frame.
    Binary(Bytes),
}

impl Payload {
    /// Build a text payload from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Text(serde_json::to_value(value)?))
    }

    /// Whether this payload goes out as a binary frame.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Encode into the transport frame.
    pub(crate) fn into_frame(self) -> Result<Message> {
        match self {
            Self::Text(value) => Ok(Message::Text(serde_json::to_string(&value)?.into())),
            Self::Binary(bytes) => Ok(Message::Binary(bytes)),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Text(value)
    }
}

impl From<Envelope> for Payload {
    fn from(envelope: Envelope) -> Self {
        Self::Text(serde_json::json!({
            "type": envelope.kind,
            "message": envelope.message,
        }))
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(Value::String(text))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(Value::String(text.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn classifies_client_id_assignment() {
        let dispatch = classify(r#"{"type":"clientid","message":{"id":"xyz"}}"#).unwrap();
        assert_eq!(dispatch, Dispatch::ClientId(json!("xyz")));
    }

    #[test]
    fn classifies_ping_with_opaque_body() {
        let dispatch = classify(r#"{"type":"ping","message":"abc"}"#).unwrap();
        assert_eq!(dispatch, Dispatch::Ping(json!("abc")));
    }

    #[test]
    fn unreserved_kind_is_application_data() {
        let dispatch = classify(r#"{"type":"foo","message":42}"#).unwrap();
        assert_eq!(dispatch, Dispatch::Application(json!(42)));
    }

    #[test]
    fn missing_body_decodes_as_null() {
        let dispatch = classify(r#"{"type":"foo"}"#).unwrap();
        assert_eq!(dispatch, Dispatch::Application(Value::Null));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(classify("not json").is_err(), "bare text is not an envelope");
        assert!(
            classify(r#"{"message":42}"#).is_err(),
            "envelope without a type is invalid"
        );
    }

    #[test]
    fn client_id_without_id_field_is_rejected() {
        assert!(
            classify(r#"{"type":"clientid","message":{}}"#).is_err(),
            "assignment must carry an id"
        );
    }

    #[test]
    fn pong_reply_echoes_the_probe_body() {
        let reply = Envelope::pong(json!({"nonce": 7}));
        let wire: Value = serde_json::to_value(&reply).unwrap();
        assert_eq!(wire, json!({"type": "pong", "message": {"nonce": 7}}));
    }

    #[test]
    fn payload_json_accepts_any_serializable_value() {
        #[derive(Serialize)]
        struct Hello {
            n: u32,
        }

        let payload = Payload::json(&Hello { n: 1 }).unwrap();
        assert_eq!(payload, Payload::Text(json!({"n": 1})));
    }

    #[test]
    fn text_payload_encodes_to_json_frame() {
        let frame = Payload::from(json!({"a": 1})).into_frame().unwrap();
        match frame {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"a":1}"#),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn binary_payload_passes_through() {
        let payload = Payload::from(vec![1_u8, 2, 3]);
        assert!(payload.is_binary());
        match payload.into_frame().unwrap() {
            Message::Binary(bytes) => assert_eq!(bytes.as_ref(), [1, 2, 3]),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }
}
