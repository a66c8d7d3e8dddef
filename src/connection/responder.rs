//! Automatic handling of inbound control frames.
//!
//! The responder decides what a ping, pong or close frame requires of the
//! client and tracks which side has sent a close frame. It performs no I/O:
//! the engine writes whatever reply it is handed, in the order it is handed.

use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::{Frame, OpCode};

/// What the engine must do for one inbound control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReaction {
    /// Write `reply` (if any) first, then report the ping.
    Ping {
        /// Pong carrying an exact copy of the ping payload.
        reply: Option<Frame>,
        /// The ping payload.
        payload: Vec<u8>,
    },
    /// Report the pong. Nothing is written.
    Pong {
        /// The pong payload.
        payload: Vec<u8>,
    },
    /// The peer started the close handshake: write `reply`, then the connection is closed.
    CloseEcho {
        /// Close frame echoing the peer's code.
        reply: Frame,
        /// Code reported to the consumer (1005 if the peer sent none).
        code: CloseCode,
        /// Reason the peer gave.
        reason: Option<String>,
    },
    /// The peer answered our close frame; the handshake is complete.
    CloseComplete {
        /// Code reported to the consumer (1005 if the peer sent none).
        code: CloseCode,
        /// Reason the peer gave.
        reason: Option<String>,
    },
}

/// Close-handshake bookkeeping and control-frame replies.
#[derive(Debug, Default)]
pub struct ControlResponder {
    close_sent: bool,
    close_received: bool,
}

impl ControlResponder {
    /// Create a responder for a freshly opened connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a close frame has been sent by this side.
    #[must_use]
    pub const fn close_sent(&self) -> bool {
        self.close_sent
    }

    /// Close frame to send for a local close request.
    ///
    /// Returns `None` if a close frame was already sent, which makes local
    /// close idempotent.
    pub fn local_close(&mut self, close: &CloseFrame) -> Option<Frame> {
        if self.close_sent {
            return None;
        }
        self.close_sent = true;
        Some(Frame::from_close(close))
    }

    /// Decide the reaction to an inbound control frame.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a data frame, or a close frame after
    ///   one was already received
    /// - Close payload errors from [`CloseFrame::parse`]
    pub fn handle(&mut self, frame: Frame) -> Result<ControlReaction> {
        match frame.opcode {
            OpCode::Ping => {
                // Nothing may follow our close frame.
                let reply = (!self.close_sent).then(|| Frame::pong(frame.payload().to_vec()));
                Ok(ControlReaction::Ping {
                    reply,
                    payload: frame.into_payload(),
                })
            }
            OpCode::Pong => Ok(ControlReaction::Pong {
                payload: frame.into_payload(),
            }),
            OpCode::Close => self.handle_close(frame.payload()),
            other => Err(Error::ProtocolViolation(format!(
                "{other} frame is not a control frame"
            ))),
        }
    }

    fn handle_close(&mut self, payload: &[u8]) -> Result<ControlReaction> {
        if self.close_received {
            return Err(Error::ProtocolViolation("Second close frame received".into()));
        }
        self.close_received = true;

        let peer = CloseFrame::parse(payload)?;
        let code = peer
            .as_ref()
            .map_or(CloseCode::NoStatusReceived, |close| close.code);
        let reason = peer
            .as_ref()
            .map(|close| close.reason.clone())
            .filter(|r| !r.is_empty());

        if self.close_sent {
            return Ok(ControlReaction::CloseComplete { code, reason });
        }

        self.close_sent = true;
        let echo_code = peer.map_or(CloseCode::Normal, |close| close.code);
        Ok(ControlReaction::CloseEcho {
            reply: Frame::close(Some(echo_code.as_u16()), ""),
            code,
            reason,
        })
    }
}
