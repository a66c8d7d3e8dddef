//! # asyncws - Asynchronous WebSocket Client Engine
//!
//! `asyncws` is an event-driven, RFC 6455 compliant WebSocket client for Tokio.
//!
//! ## Features
//!
//! - **Incremental frame decoding** that copes with any TCP chunking
//! - **Runtime-agnostic protocol core** (`protocol` compiles without Tokio)
//! - **Strict validation** of server frames, UTF-8 and close codes
//! - **Automatic control frames**: pongs and the close handshake are handled for you
//! - **Ordered event delivery** through a single queue you consume where you like
//! - **TLS** for `wss://` targets (feature `tls-rustls`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use asyncws::{CloseCode, Config, Event, WebSocket};
//!
//! # async fn demo() -> asyncws::Result<()> {
//! let (ws, mut events) = WebSocket::connect("ws://localhost:9001/", Config::new())?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         Event::Opened { .. } => ws.send_text("hello")?,
//!         Event::Message(_) => ws.close(CloseCode::Normal, "done")?,
//!         Event::ConnectFailed(err) => eprintln!("connect failed: {err}"),
//!         Event::Closed(info) => println!("closed: {}", info.code),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod descriptor;
pub mod error;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
mod client;
#[cfg(feature = "async-tokio")]
pub mod codec;
#[cfg(feature = "async-tokio")]
pub mod event;
#[cfg(feature = "async-tokio")]
pub mod transport;

#[cfg(feature = "tls-rustls")]
pub mod tls;

pub use config::{Config, Limits, Timeouts};
pub use connection::ConnectionState;
pub use descriptor::{ConnectionDescriptor, IntoDescriptor, Scheme};
pub use error::{Error, ErrorKind, Result};
pub use message::{CloseCode, CloseFrame, CloseInfo, Message, MessageType};
pub use protocol::{HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key};

#[cfg(feature = "async-tokio")]
pub use client::{ConnectionId, WebSocket};
#[cfg(feature = "async-tokio")]
pub use codec::WebSocketCodec;
#[cfg(feature = "async-tokio")]
pub use event::{Delegate, Event, EventReceiver};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Limits>();
        assert_send::<Message>();
        assert_send::<CloseCode>();
        assert_send::<CloseFrame>();
        assert_send::<CloseInfo>();
        assert_send::<ConnectionState>();
        assert_send::<ConnectionDescriptor>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Limits>();
        assert_sync::<Message>();
        assert_sync::<CloseCode>();
        assert_sync::<CloseFrame>();
        assert_sync::<CloseInfo>();
        assert_sync::<ConnectionState>();
        assert_sync::<ConnectionDescriptor>();
    }

    #[cfg(feature = "async-tokio")]
    #[test]
    fn test_handles_cross_threads() {
        assert_send::<WebSocket>();
        assert_sync::<WebSocket>();
        assert_send::<EventReceiver>();
        assert_send::<Event>();
    }
}
