//! WebSocket codec for async I/O.
//!
//! This module provides frame-level encoding/decoding over async streams and
//! the async driver for the opening handshake.

mod framed;
mod handshake;

pub use framed::{FrameReader, FrameWriter, WebSocketCodec};
pub use handshake::{Handshake, client_handshake};
