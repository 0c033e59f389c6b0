//! Lifecycle and message notifications.
//!
//! Subscribers receive [`Event`]s through a broadcast channel obtained from
//! [`crate::Client::subscribe`]. Emission never blocks and never fails:
//! events sent while nobody is subscribed are dropped silently.

use serde_json::Value;
use tokio_tungstenite::tungstenite::Bytes;

use crate::envelope::Payload;

/// A notification from the connection manager.
///
/// Message-bearing variants overlap deliberately: an inbound text frame
/// emits both [`Event::Message`] and [`Event::StringMessage`], a binary
/// frame both [`Event::Message`] and [`Event::BinaryMessage`], so
/// subscribers can either handle everything in one place or filter by
/// representation.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The transport finished opening.
    Connected,
    /// The transport closed, for any reason.
    Disconnected,
    /// The transport reopened after an automatic reconnect.
    Reconnected,
    /// A transport-level or decode failure. Non-fatal; the connection may
    /// or may not close afterwards.
    Error(String),
    /// A send was attempted. Fires whether or not the transport accepted
    /// the data; this is telemetry, not a delivery acknowledgement.
    Sent,
    /// An application message, text or binary.
    Message(Payload),
    /// An application message that arrived as a text frame, decoded.
    StringMessage(Value),
    /// An application message that arrived as a binary frame, untouched.
    BinaryMessage(Bytes),
    /// The server assigned this session an identifier.
    ClientId(Value),
    /// The server probed liveness; the reply has already been sent.
    Ping(Value),
}

impl Event {
    /// Whether this event carries application data (as opposed to
    /// lifecycle or control signals).
    #[must_use]
    pub const fn is_message(&self) -> bool {
        matches!(
            self,
            Self::Message(_) | Self::StringMessage(_) | Self::BinaryMessage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_variants_are_messages() {
        assert!(Event::StringMessage(json!(1)).is_message());
        assert!(Event::BinaryMessage(Bytes::from_static(b"x")).is_message());
        assert!(!Event::Connected.is_message());
        assert!(!Event::Ping(json!("abc")).is_message());
    }
}
