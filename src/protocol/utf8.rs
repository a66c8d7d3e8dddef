//! Incremental UTF-8 validation for fragmented text messages.
//!
//! A code point may be split across fragment boundaries. The validator keeps
//! the unfinished tail of one fragment and completes it with the head of the
//! next, so each byte is checked once and nothing is re-copied.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator for fragmented WebSocket messages.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    /// Bytes of a code point that started in an earlier fragment.
    pending: [u8; 4],
    pending_len: usize,
}

/// Encoded length implied by a UTF-8 lead byte. Only called on leads that
/// `str::from_utf8` reported as an incomplete (not invalid) sequence.
const fn sequence_len(lead: u8) -> usize {
    match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

impl Utf8Validator {
    /// Create a new UTF-8 validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the next fragment of a text message.
    ///
    /// A non-final fragment may end in the middle of a code point; a final
    /// fragment must leave nothing pending.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` as soon as the accumulated bytes cannot be
    /// the prefix of valid UTF-8.
    pub fn validate(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        let mut data = data;

        if self.pending_len > 0 {
            let need = sequence_len(self.pending[0]) - self.pending_len;
            let take = need.min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];

            let sequence = &self.pending[..self.pending_len];
            match std::str::from_utf8(sequence) {
                Ok(_) => self.pending_len = 0,
                Err(e) if e.error_len().is_none() && !is_final => return Ok(()),
                Err(_) => return Err(Error::InvalidUtf8),
            }
        }

        match std::str::from_utf8(data) {
            Ok(_) => Ok(()),
            Err(e) if e.error_len().is_none() && !is_final => {
                let tail = &data[e.valid_up_to()..];
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len();
                Ok(())
            }
            Err(_) => Err(Error::InvalidUtf8),
        }
    }

    /// Reset the validator state, discarding any incomplete sequences.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    /// Check if there are pending incomplete bytes.
    #[must_use]
    pub const fn has_incomplete(&self) -> bool {
        self.pending_len > 0
    }
}

/// Validate that a byte slice is valid UTF-8.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    std::str::from_utf8(data)
        .map(|_| ())
        .map_err(|_| Error::InvalidUtf8)
}
