//! Reassembly of fragmented data messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

/// Reassembles data frames into complete messages.
///
/// Control frames are not its concern; the caller routes them elsewhere and
/// they may arrive between fragments without disturbing assembly.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    utf8_validator: Option<Utf8Validator>,
    limits: Limits,
}

impl MessageAssembler {
    /// Create an assembler enforcing `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            utf8_validator: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns `Some(message)` once the final fragment arrives.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a control frame, a continuation with no
    ///   message in progress, or a new data frame while one is in progress
    /// - `Error::TooManyFragments` / `Error::MessageTooLarge` when limits are exceeded
    /// - `Error::InvalidUtf8` as soon as text content cannot be valid UTF-8
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        if frame.opcode.is_control() {
            return Err(Error::ProtocolViolation(format!(
                "{} frame passed to message assembler",
                frame.opcode
            )));
        }

        if frame.opcode == OpCode::Continuation {
            if self.opcode.is_none() {
                return Err(Error::ProtocolViolation(
                    "Continuation frame with no message in progress".into(),
                ));
            }
        } else {
            if self.opcode.is_some() {
                return Err(Error::ProtocolViolation(format!(
                    "{} frame while a fragmented message is in progress",
                    frame.opcode
                )));
            }
            self.opcode = Some(frame.opcode);
            if frame.opcode == OpCode::Text {
                self.utf8_validator = Some(Utf8Validator::new());
            }
        }

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if let Some(validator) = self.utf8_validator.as_mut() {
            validator.validate(frame.payload(), frame.fin)?;
        }

        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().to_vec();
        let opcode = self.opcode.take();
        self.fragment_count = 0;
        self.utf8_validator = None;

        match opcode {
            Some(OpCode::Text) => String::from_utf8(payload)
                .map(|text| Some(Message::Text(text)))
                .map_err(|_| Error::InvalidUtf8),
            _ => Ok(Some(Message::Binary(payload))),
        }
    }

    /// Returns `true` while a fragmented message is in progress.
    #[must_use]
    pub const fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }
}
