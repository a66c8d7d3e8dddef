//! WebSocket message types and close codes as defined in RFC 6455.

use crate::error::{Error, Result};
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;

/// Maximum length of a close reason: a control payload minus the 2-byte code.
pub const MAX_CLOSE_REASON: usize = MAX_CONTROL_FRAME_PAYLOAD - 2;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away (e.g., server shutdown, browser navigating away).
    GoingAway,
    /// Protocol error (1002). Endpoint received a malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Endpoint received data type it cannot handle.
    UnsupportedData,
    /// No status received (1005). Reported locally when the peer's close frame carried no code.
    NoStatusReceived,
    /// Abnormal closure (1006). Reported locally when the transport dropped without a close frame.
    Abnormal,
    /// Invalid payload (1007). Endpoint received a message with invalid data (e.g., non-UTF-8 in text).
    InvalidPayload,
    /// Policy violation (1008). Endpoint received a message that violates its policy.
    PolicyViolation,
    /// Message too big (1009). Endpoint received a message too large to process.
    MessageTooBig,
    /// Mandatory extension (1010). Client expected server to negotiate an extension.
    MandatoryExtension,
    /// Internal error (1011). Server encountered an unexpected condition.
    InternalError,
    /// Custom close code (3000-4999 for applications, 1012-1014 for registered codes).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1005 => CloseCode::NoStatusReceived,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatusReceived => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code is valid on the wire per RFC 6455 Section 7.4.1.
    ///
    /// Valid codes:
    /// - 1000-1003
    /// - 1007-1014
    /// - 3000-4999: Reserved for libraries/frameworks and applications
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Check if this close code is reserved and MUST NOT be sent in a Close frame.
    ///
    /// Reserved codes per RFC 6455 Section 7.4.1:
    /// - 1004: Reserved
    /// - 1005: No Status Received (MUST NOT be set by endpoint)
    /// - 1006: Abnormal Closure (MUST NOT be set by endpoint)
    /// - 1015: TLS Handshake (MUST NOT be set by endpoint)
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1004..=1006 | 1015)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Close frame payload: status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing (UTF-8, max 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Check that this frame may be sent by the local endpoint.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` if the code is reserved or out of range
    /// - `Error::ControlFrameTooLarge` if the reason exceeds 123 bytes
    pub fn validate(&self) -> Result<()> {
        if !self.code.is_valid() {
            return Err(Error::InvalidCloseCode(self.code.as_u16()));
        }
        if self.reason.len() > MAX_CLOSE_REASON {
            return Err(Error::ControlFrameTooLarge(self.reason.len() + 2));
        }
        Ok(())
    }

    /// Decode a close frame payload received from the peer.
    ///
    /// An empty payload means the peer sent no status, which yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a 1-byte payload or a code that may not appear on the wire
    /// - `Error::InvalidUtf8` if the reason is not UTF-8
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(Error::ProtocolViolation(
                "Close frame payload of 1 byte".into(),
            )),
            _ => {
                let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
                if !code.is_valid() {
                    return Err(Error::ProtocolViolation(format!(
                        "Close code {code} may not be sent by an endpoint"
                    )));
                }
                let reason = std::str::from_utf8(&payload[2..])?;
                Ok(Some(Self::new(code, reason)))
            }
        }
    }

    /// Encode as a close frame payload.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(2 + self.reason.len());
        data.extend_from_slice(&self.code.as_u16().to_be_bytes());
        data.extend_from_slice(self.reason.as_bytes());
        data
    }
}

/// How a connection ended, delivered exactly once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Status code. 1005 if the peer's close frame had none, 1006 if no close frame was exchanged.
    pub code: CloseCode,
    /// Reason text from the close frame, if any.
    pub reason: Option<String>,
    /// The fatal error that ended the connection, if it did not end cleanly.
    pub error: Option<Error>,
}

impl CloseInfo {
    /// Close info for a completed close handshake.
    #[must_use]
    pub fn clean(code: CloseCode, reason: Option<String>) -> Self {
        Self {
            code,
            reason,
            error: None,
        }
    }

    /// Close info for a connection terminated by `error`.
    #[must_use]
    pub fn failed(error: Error) -> Self {
        Self {
            code: error.close_code(),
            reason: Some(error.to_string()),
            error: Some(error),
        }
    }

    /// Returns `true` if the connection ended without a fatal error.
    #[must_use]
    pub const fn was_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Kind of a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// UTF-8 text.
    Text,
    /// Arbitrary bytes.
    Binary,
}

/// A complete application message (one or more frames reassembled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// The message kind.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Message::Text(_) => MessageType::Text,
            Message::Binary(_) => MessageType::Binary,
        }
    }

    /// Returns `true` if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Returns `true` if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// Borrow the raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload().len()
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    /// Consume and return the text content, if this is a text message.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }

    /// Consume and return the payload bytes.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Message::Text(s) => s.into_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Borrow the text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message::Binary(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::text("hello");
        assert!(matches!(msg, Message::Text(ref s) if s == "hello"));
        assert_eq!(msg.message_type(), MessageType::Text);

        let msg = Message::binary([4, 5, 6]);
        assert!(matches!(msg, Message::Binary(ref d) if d == &[4, 5, 6]));
        assert_eq!(msg.message_type(), MessageType::Binary);
    }

    #[test]
    fn test_message_accessors() {
        let msg = Message::text("hello");
        assert_eq!(msg.payload(), b"hello");
        assert_eq!(msg.len(), 5);
        assert_eq!(msg.as_text(), Some("hello"));
        assert_eq!(msg.clone().into_text(), Some(String::from("hello")));
        assert_eq!(msg.into_payload(), b"hello".to_vec());

        let msg = Message::binary(vec![]);
        assert!(msg.is_empty());
        assert!(msg.is_binary());
        assert_eq!(msg.into_text(), None);
    }

    #[test]
    fn test_message_from() {
        assert!(Message::from("a").is_text());
        assert!(Message::from(String::from("a")).is_text());
        assert!(Message::from(vec![1u8]).is_binary());
    }

    #[test]
    fn test_close_code_roundtrip() {
        for code in [1000u16, 1001, 1002, 1003, 1005, 1006, 1007, 1008, 1009, 1010, 1011, 3000, 4999] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
        assert_eq!(CloseCode::from_u16(1005), CloseCode::NoStatusReceived);
        assert_eq!(CloseCode::from_u16(3000), CloseCode::Other(3000));
    }

    #[test]
    fn test_close_code_validity() {
        assert!(CloseCode::Normal.is_valid());
        assert!(CloseCode::InternalError.is_valid());
        assert!(CloseCode::Other(1012).is_valid());
        assert!(CloseCode::Other(1014).is_valid());
        assert!(CloseCode::Other(3000).is_valid());
        assert!(CloseCode::Other(4999).is_valid());

        assert!(!CloseCode::NoStatusReceived.is_valid());
        assert!(!CloseCode::Abnormal.is_valid());
        assert!(!CloseCode::Other(0).is_valid());
        assert!(!CloseCode::Other(999).is_valid());
        assert!(!CloseCode::Other(1004).is_valid());
        assert!(!CloseCode::Other(1015).is_valid());
        assert!(!CloseCode::Other(2999).is_valid());
        assert!(!CloseCode::Other(5000).is_valid());
    }

    #[test]
    fn test_close_code_reserved() {
        assert!(CloseCode::Other(1004).is_reserved());
        assert!(CloseCode::NoStatusReceived.is_reserved());
        assert!(CloseCode::Abnormal.is_reserved());
        assert!(CloseCode::Other(1015).is_reserved());
        assert!(!CloseCode::Normal.is_reserved());
        assert!(!CloseCode::Other(3000).is_reserved());
    }

    #[test]
    fn test_close_frame_payload() {
        let frame = CloseFrame::new(CloseCode::Normal, "bye");
        assert_eq!(frame.to_payload(), vec![0x03, 0xe8, b'b', b'y', b'e']);

        let parsed = CloseFrame::parse(&frame.to_payload()).unwrap();
        assert_eq!(parsed, Some(frame));
    }

    #[test]
    fn test_close_frame_parse_edge_cases() {
        assert_eq!(CloseFrame::parse(&[]).unwrap(), None);
        assert!(matches!(
            CloseFrame::parse(&[0x03]),
            Err(Error::ProtocolViolation(_))
        ));
        // 1005 must never appear on the wire
        assert!(matches!(
            CloseFrame::parse(&[0x03, 0xed]),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(
            CloseFrame::parse(&[0x03, 0xe8, 0xff, 0xfe]),
            Err(Error::InvalidUtf8)
        ));
    }

    #[test]
    fn test_close_frame_validate() {
        assert!(CloseFrame::new(CloseCode::Normal, "ok").validate().is_ok());
        assert!(matches!(
            CloseFrame::new(CloseCode::Abnormal, "").validate(),
            Err(Error::InvalidCloseCode(1006))
        ));
        assert!(
            CloseFrame::new(CloseCode::Normal, "x".repeat(MAX_CLOSE_REASON))
                .validate()
                .is_ok()
        );
        assert!(matches!(
            CloseFrame::new(CloseCode::Normal, "x".repeat(MAX_CLOSE_REASON + 1)).validate(),
            Err(Error::ControlFrameTooLarge(126))
        ));
    }

    #[test]
    fn test_close_info() {
        let info = CloseInfo::clean(CloseCode::Normal, Some("bye".into()));
        assert!(info.was_clean());

        let info = CloseInfo::failed(Error::ReservedBitsSet);
        assert!(!info.was_clean());
        assert_eq!(info.code, CloseCode::ProtocolError);
        assert_eq!(info.error, Some(Error::ReservedBitsSet));
    }
}
