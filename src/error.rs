//! Error types for the WebSocket client engine.
//!
//! Every failure the engine can produce is a variant of [`Error`]. Variants are
//! fine-grained so callers can match on exact causes, while [`Error::kind`]
//! folds them into the coarse categories the connection lifecycle cares about.

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The connection target was malformed. Surfaced synchronously, never retried.
    Descriptor,
    /// The opening handshake failed (refused, timed out, or invalid response).
    Handshake,
    /// A framing or reassembly rule was violated.
    Protocol,
    /// The operation is not valid in the current connection state. Non-fatal.
    State,
    /// The underlying transport failed.
    Transport,
    /// The operation was cancelled by a local close request.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Descriptor => "descriptor",
            ErrorKind::Handshake => "handshake",
            ErrorKind::Protocol => "protocol",
            ErrorKind::State => "state",
            ErrorKind::Transport => "transport",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The connection target could not be used.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Declared payload length cannot be addressed on this platform.
    #[error("Payload too large for platform: {size} bytes (max: {max})")]
    PayloadTooLargeForPlatform {
        /// Declared payload length.
        size: u64,
        /// Largest addressable length.
        max: u64,
    },

    /// Connection has been closed.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// The transport (TCP or TLS) could not be established.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Handshake response exceeded the configured size limit.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A header value would corrupt the HTTP request.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// Operation not permitted in the current connection state.
    #[error("Cannot {operation} while connection is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the connection was in.
        state: crate::connection::ConnectionState,
    },

    /// The operation was cancelled by a local close.
    #[error("Operation cancelled")]
    Cancelled,

    /// A bounded wait elapsed.
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid close code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidDescriptor(_) | Error::InvalidHeaderValue { .. } => ErrorKind::Descriptor,
            Error::Connect(_)
            | Error::InvalidHandshake(_)
            | Error::HandshakeTooLarge { .. }
            | Error::Timeout(_) => ErrorKind::Handshake,
            Error::InvalidState { .. } | Error::InvalidCloseCode(_) => ErrorKind::State,
            Error::Io(_) | Error::ConnectionClosed(_) => ErrorKind::Transport,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::InvalidFrame(_)
            | Error::ProtocolViolation(_)
            | Error::InvalidUtf8
            | Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. }
            | Error::PayloadTooLargeForPlatform { .. }
            | Error::ReservedOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::MaskedServerFrame
            | Error::ReservedBitsSet
            | Error::IncompleteFrame { .. }
            | Error::InvalidOpcode(_) => ErrorKind::Protocol,
        }
    }

    /// Returns `true` if this error terminates the connection it occurred on.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::State)
    }

    /// Close code reported (and, where the protocol allows, sent) when this
    /// error ends an established connection.
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Error::InvalidUtf8 => CloseCode::InvalidPayload,
            Error::MessageTooLarge { .. }
            | Error::FrameTooLarge { .. }
            | Error::TooManyFragments { .. }
            | Error::PayloadTooLargeForPlatform { .. } => CloseCode::MessageTooBig,
            _ => match self.kind() {
                ErrorKind::Protocol => CloseCode::ProtocolError,
                _ => CloseCode::Abnormal,
            },
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
