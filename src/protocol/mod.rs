//! WebSocket wire protocol, client side (RFC 6455).
//!
//! Everything here is runtime-agnostic: it works on byte slices and never
//! performs I/O.

pub mod assembler;
pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod utf8;
pub mod validation;

pub use assembler::MessageAssembler;
pub use decoder::{FrameDecoder, Frames};
pub use frame::{Frame, FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};
pub use handshake::{
    HandshakeRequest, HandshakeResponse, WS_GUID, compute_accept_key, find_header_end,
    generate_key,
};
pub use mask::{apply_mask, generate_mask};
pub use opcode::OpCode;
pub use utf8::{Utf8Validator, validate_utf8};
pub use validation::FrameValidator;
