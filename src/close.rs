//! Wire-level close codes.
//!
//! The numeric values are part of the protocol with the server and must
//! match exactly.

use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// Normal closure.
pub const NORMAL: u16 = 1000;
/// Endpoint is going away (process teardown).
pub const GOING_AWAY: u16 = 1001;
/// Protocol error.
pub const PROTOCOL_ERROR: u16 = 1002;
/// A mandatory extension was missing.
pub const MANDATORY_EXTENSION: u16 = 1010;

/// Build a close frame with a static reason string.
pub(crate) fn frame(code: u16, reason: &'static str) -> CloseFrame {
    CloseFrame {
        code: CloseCode::from(code),
        reason: Utf8Bytes::from_static(reason),
    }
}
