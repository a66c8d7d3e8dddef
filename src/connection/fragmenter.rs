//! Splitting outgoing messages into frames (RFC 6455 Section 5.4).

use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// Iterator that produces the frames of one outgoing message.
///
/// The first frame carries the message opcode, later ones are continuations,
/// and only the last has FIN set. An empty message is a single empty frame.
#[derive(Debug)]
pub struct MessageFragmenter<'a> {
    chunks: std::slice::Chunks<'a, u8>,
    opcode: OpCode,
    started: bool,
}

impl<'a> MessageFragmenter<'a> {
    /// Create a new fragmenter for the given payload.
    #[inline]
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            chunks: payload.chunks(fragment_size.max(1)),
            opcode,
            started: false,
        }
    }

    /// Create a fragmenter for a data message.
    #[must_use]
    pub fn for_message(message: &'a Message, fragment_size: usize) -> Self {
        let opcode = if message.is_text() {
            OpCode::Text
        } else {
            OpCode::Binary
        };
        Self::new(message.payload(), opcode, fragment_size)
    }
}

impl Iterator for MessageFragmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let opcode = if self.started {
            OpCode::Continuation
        } else {
            self.opcode
        };

        match self.chunks.next() {
            Some(chunk) => {
                self.started = true;
                let fin = self.chunks.len() == 0;
                Some(Frame::new(fin, opcode, chunk.to_vec()))
            }
            None if !self.started => {
                self.started = true;
                Some(Frame::new(true, opcode, Vec::new()))
            }
            None => None,
        }
    }
}
