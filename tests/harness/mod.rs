//! Test harness utilities for end-to-end client tests.
//!
//! Provides a scripted in-process server: each test decides exactly which
//! bytes the server sends and asserts on what the client wrote.

mod server;

pub use server::{ServerConn, TestServer};
