//! Configuration and limits for WebSocket client connections.
//!
//! [`Limits`] bound what a server may make us buffer, [`Timeouts`] bound how
//! long each phase of a connection may take, and [`Config`] bundles both with
//! the buffer and fragmentation settings used by the engine.

use std::time::Duration;

use crate::error::{Error, Result};

/// Upper bounds on inbound data.
///
/// Every bound is inclusive: a frame of exactly `max_frame_size` bytes is
/// accepted. Frame sizes are checked from the header, before the payload is
/// buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Largest payload a single server frame may declare.
    ///
    /// Default: 16 MiB
    pub max_frame_size: usize,

    /// Largest reassembled message, summed over all of its fragments.
    ///
    /// Default: 64 MiB
    pub max_message_size: usize,

    /// Most frames a fragmented message may span.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Largest handshake response head (status line and headers).
    ///
    /// Default: 8 KiB
    pub max_handshake_size: usize,
}

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

impl Default for Limits {
    fn default() -> Self {
        Self::new(16 * MIB, 64 * MIB, 128, 8 * KIB)
    }
}

impl Limits {
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Tight limits for memory-constrained clients: 64 KiB frames, 256 KiB
    /// messages, 16 fragments and a 4 KiB handshake.
    #[must_use]
    pub const fn embedded() -> Self {
        Self::new(64 * KIB, 256 * KIB, 16, 4 * KIB)
    }

    /// Limits loose enough to never matter in practice. Only for servers you
    /// trust.
    #[must_use]
    pub const fn unrestricted() -> Self {
        #[cfg(target_pointer_width = "64")]
        let (frame, message) = (1024 * MIB, 4 * 1024 * MIB);
        #[cfg(not(target_pointer_width = "64"))]
        let (frame, message) = (usize::MAX, usize::MAX);
        Self::new(frame, message, 1024, 64 * KIB)
    }

    /// # Errors
    ///
    /// [`Error::MessageTooLarge`] when `size` is over `max_message_size`.
    pub fn check_message_size(&self, size: usize) -> Result<()> {
        within(size, self.max_message_size)
            .ok_or(Error::MessageTooLarge { size, max: self.max_message_size })
    }

    /// # Errors
    ///
    /// [`Error::FrameTooLarge`] when `size` is over `max_frame_size`.
    pub fn check_frame_size(&self, size: usize) -> Result<()> {
        within(size, self.max_frame_size)
            .ok_or(Error::FrameTooLarge { size, max: self.max_frame_size })
    }

    /// # Errors
    ///
    /// [`Error::TooManyFragments`] when `count` is over `max_fragment_count`.
    pub fn check_fragment_count(&self, count: usize) -> Result<()> {
        within(count, self.max_fragment_count)
            .ok_or(Error::TooManyFragments { count, max: self.max_fragment_count })
    }

    /// # Errors
    ///
    /// [`Error::HandshakeTooLarge`] when `size` is over `max_handshake_size`.
    pub fn check_handshake_size(&self, size: usize) -> Result<()> {
        within(size, self.max_handshake_size)
            .ok_or(Error::HandshakeTooLarge { size, max: self.max_handshake_size })
    }
}

fn within(value: usize, max: usize) -> Option<()> {
    (value <= max).then_some(())
}

/// Timeouts enforced by the connection engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time to establish the transport (TCP and, for `wss`, TLS).
    ///
    /// Default: 30 seconds
    pub connect: Duration,

    /// Maximum time to wait for the server's handshake response.
    ///
    /// Default: 30 seconds
    pub handshake: Duration,

    /// Maximum time to wait for the peer's close frame after ours was sent.
    ///
    /// When it elapses the transport is torn down without further ceremony.
    /// Default: 5 seconds
    pub close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            handshake: Duration::from_secs(30),
            close: Duration::from_secs(5),
        }
    }
}

impl Timeouts {
    #[must_use]
    pub const fn new(connect: Duration, handshake: Duration, close: Duration) -> Self {
        Self {
            connect,
            handshake,
            close,
        }
    }
}

/// WebSocket client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub limits: Limits,

    /// Outgoing messages longer than this are sent as several frames.
    pub fragment_size: usize,

    /// Bytes requested from the transport per read.
    pub read_buffer_size: usize,

    /// Initial capacity of the frame encoding buffer.
    pub write_buffer_size: usize,

    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            fragment_size: 16 * KIB,
            read_buffer_size: 8 * KIB,
            write_buffer_size: 8 * KIB,
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Default configuration: [`Limits::default`], 16 KiB fragments, 8 KiB
    /// buffers and [`Timeouts::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for [`Config::new`].
    #[must_use]
    pub fn client() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set fragment size for outgoing messages.
    #[must_use]
    pub const fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set timeout configuration.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the close handshake timeout, keeping the other timeouts.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.close = timeout;
        self
    }
}
