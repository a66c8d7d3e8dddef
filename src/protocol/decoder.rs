//! Incremental decoding of a server byte stream into frames.
//!
//! TCP delivers bytes in arbitrary chunks: a read may end inside a header,
//! inside a payload, or carry several frames at once. [`FrameDecoder`] buffers
//! whatever it is given and hands out complete frames as they become
//! available. Each header is validated before its payload is buffered, so an
//! oversized frame is rejected without waiting for (or allocating) its bytes.

use bytes::{Buf, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::frame::{Frame, FrameHeader};
use crate::protocol::opcode::OpCode;
use crate::protocol::validation::FrameValidator;

/// Buffering frame decoder for the client side of a connection.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    validator: FrameValidator,
    /// Header of the frame whose payload is still arriving.
    pending: Option<FrameHeader>,
    /// Payload bytes already decoded for an unfinished fragmented message.
    message_bytes: usize,
    /// Set once an error is returned; the stream cannot be resynchronised.
    poisoned: bool,
}

impl FrameDecoder {
    /// Create a decoder enforcing `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self::with_capacity(limits, 8192)
    }

    /// Create a decoder with an initial buffer capacity.
    #[must_use]
    pub fn with_capacity(limits: Limits, capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            validator: FrameValidator::new(limits),
            pending: None,
            message_bytes: 0,
            poisoned: false,
        }
    }

    /// Append bytes received from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as frames.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if a frame has started arriving but is not yet complete.
    #[must_use]
    pub fn is_mid_frame(&self) -> bool {
        self.pending.is_some() || !self.buffer.is_empty()
    }

    /// Decode the next complete frame, if enough bytes are buffered.
    ///
    /// Returns `Ok(None)` when more input is needed. After an error every
    /// subsequent call returns the same class of failure.
    ///
    /// # Errors
    ///
    /// Any header parse or validation error: reserved opcode, reserved bits,
    /// masked server frame, fragmented or oversized control frame, or a
    /// declared length over `max_frame_size`.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.poisoned {
            return Err(Error::ProtocolViolation(
                "Decoder used after a framing error".into(),
            ));
        }

        let header = match self.pending {
            Some(header) => header,
            None => match FrameHeader::parse(&self.buffer) {
                Ok(header) => {
                    if let Err(e) = self.check_header(&header) {
                        self.poisoned = true;
                        return Err(e);
                    }
                    self.pending = Some(header);
                    header
                }
                Err(Error::IncompleteFrame { .. }) => return Ok(None),
                Err(e) => {
                    self.poisoned = true;
                    return Err(e);
                }
            },
        };

        let total = match header.frame_len() {
            Ok(total) => total,
            Err(e) => {
                self.poisoned = true;
                return Err(e);
            }
        };
        if self.buffer.len() < total {
            self.buffer.reserve(total - self.buffer.len());
            return Ok(None);
        }

        self.pending = None;
        let frame = Frame::from_parts(&header, &self.buffer[header.header_len..total]);
        self.buffer.advance(total);
        if frame.opcode.is_data() {
            self.message_bytes = if frame.fin {
                0
            } else {
                self.message_bytes + header.payload_len
            };
        }
        Ok(Some(frame))
    }

    /// Validate a header, including the size of the message it belongs to.
    fn check_header(&self, header: &FrameHeader) -> Result<()> {
        self.validator.validate_header(header)?;
        match header.opcode {
            OpCode::Continuation => self
                .validator
                .validate_message_growth(self.message_bytes, header.payload_len),
            _ => Ok(()),
        }
    }

    /// Iterate over every complete frame currently buffered.
    ///
    /// The iterator ends when more input is needed (or after the first error);
    /// call again after [`extend`](Self::extend) to continue where it left off.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            decoder: self,
            done: false,
        }
    }
}

/// Iterator returned by [`FrameDecoder::frames`].
#[derive(Debug)]
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
