//! Header validation for frames received from the server (RFC 6455).
//!
//! Checks run on the header alone, before any payload is buffered:
//! - Masking rules per RFC 6455 Section 5.1
//! - RSV bits validation
//! - Control frame rules per Section 5.5
//! - Frame size limits

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Frame validator for incoming WebSocket frames.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    /// Size limits for frames.
    limits: Limits,
}

impl FrameValidator {
    /// Create a new frame validator.
    #[must_use]
    pub const fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Validate the header of a frame sent by the server.
    ///
    /// # Errors
    ///
    /// - `Error::MaskedServerFrame` - the server masked its frame
    /// - `Error::ReservedBitsSet` - RSV bits set without negotiated extension
    /// - `Error::FragmentedControlFrame` - a control frame without FIN
    /// - `Error::ControlFrameTooLarge` - a control payload over 125 bytes
    /// - `Error::FrameTooLarge` - frame exceeds the configured limit
    /// - `Error::MessageTooLarge` - the frame alone is larger than a message may be
    pub fn validate_header(&self, header: &FrameHeader) -> Result<()> {
        Self::validate_masking(header.mask.is_some())?;
        Self::validate_rsv_bits(header.rsv1, header.rsv2, header.rsv3)?;
        if header.opcode.is_control() {
            Self::validate_control(header.fin, header.payload_len)?;
        }
        self.limits.check_frame_size(header.payload_len)?;
        self.limits.check_message_size(header.payload_len)
    }

    /// Check that a data frame declaring `payload_len` bytes keeps its message
    /// within `max_message_size`, given `assembled` bytes already received for
    /// the same message.
    ///
    /// # Errors
    ///
    /// `Error::MessageTooLarge` when the sum is over the limit.
    pub fn validate_message_growth(&self, assembled: usize, payload_len: usize) -> Result<()> {
        self.limits
            .check_message_size(assembled.saturating_add(payload_len))
    }

    /// Clients MUST reject masked server frames (RFC 6455 Section 5.1).
    fn validate_masking(masked: bool) -> Result<()> {
        if masked {
            return Err(Error::MaskedServerFrame);
        }
        Ok(())
    }

    /// RSV bits MUST be 0 unless an extension is negotiated that defines
    /// meanings for non-zero values.
    fn validate_rsv_bits(rsv1: bool, rsv2: bool, rsv3: bool) -> Result<()> {
        if rsv1 || rsv2 || rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        Ok(())
    }

    fn validate_control(fin: bool, payload_len: usize) -> Result<()> {
        if !fin {
            return Err(Error::FragmentedControlFrame);
        }
        if payload_len > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload_len));
        }
        Ok(())
    }
}
