//! TLS support for secure WebSocket (`wss://`) connections.
//!
//! Backed by rustls with the webpki root store. Only the client side of the
//! TLS handshake is provided.

mod rustls_impl;

pub use rustls_impl::{TlsConnector, TlsStream};
