//! WebSocket connection management and state machine.
//!
//! The pieces here are layered: [`ConnectionState`] is the lifecycle,
//! [`ControlResponder`] decides what inbound control frames require,
//! [`MessageFragmenter`] splits outbound messages, and the engine task (with
//! `async-tokio`) ties them to a transport.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - transport connect and opening handshake
//! 2. **Open** - data flows in both directions
//! 3. **Closing** - a close frame has been sent or received
//! 4. **Closed** / **Failed** - terminal

mod fragmenter;
mod responder;
mod state;

pub use fragmenter::MessageFragmenter;
pub use responder::{ControlReaction, ControlResponder};
pub use state::ConnectionState;

#[cfg(feature = "async-tokio")]
pub(crate) mod engine;
