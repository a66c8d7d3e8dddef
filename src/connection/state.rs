//! Connection lifecycle states.

/// WebSocket connection state.
///
/// ```text
/// Connecting ──▶ Open ──▶ Closing ──▶ Closed
///      │           │         │
///      └───────────┴─────────┴──────▶ Failed
/// ```
///
/// `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Transport connect and opening handshake in progress.
    #[default]
    Connecting,
    /// Handshake complete; data may flow in both directions.
    Open,
    /// A close frame has been sent or received; waiting for the handshake to finish.
    Closing,
    /// The close handshake completed (or timed out after our close frame was sent).
    Closed,
    /// The connection ended because of a fatal error.
    Failed,
}

impl ConnectionState {
    /// Returns `true` for `Closed` and `Failed`.
    #[must_use]
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Check if sending data is allowed in this state.
    ///
    /// Returns `true` only for `Open` state.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if inbound frames are still processed in this state.
    ///
    /// Returns `true` for `Open` or `Closing` states.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::{Closed, Closing, Connecting, Failed, Open};
        matches!(
            (self, next),
            (Connecting, Open)
                | (Open, Closing)
                | (Closing, Closed)
                | (Connecting | Open | Closing, Failed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}
