//! The public connection handle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::config::Config;
use crate::connection::ConnectionState;
use crate::connection::engine::{self, Command, Shared};
use crate::descriptor::{ConnectionDescriptor, IntoDescriptor};
use crate::error::{Error, Result};
use crate::event::EventReceiver;
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::MAX_CONTROL_FRAME_PAYLOAD;
#[cfg(feature = "tls-rustls")]
use crate::tls::TlsConnector;
use crate::transport::Connector;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connection, used in log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to one WebSocket client connection.
///
/// Cloning is cheap; all clones control the same connection. Methods never
/// wait on the network: they validate, queue the request for the engine and
/// return. Results arrive on the [`EventReceiver`] returned alongside the
/// handle. Dropping every handle closes an open connection with
/// `1001 Going Away` and cancels a pending connect.
///
/// # Example
///
/// ```rust,no_run
/// use asyncws::{Config, Event, Message, WebSocket};
///
/// # async fn demo() -> asyncws::Result<()> {
/// let (ws, mut events) = WebSocket::connect("ws://localhost:9001/chat", Config::new())?;
/// while let Some(event) = events.recv().await {
///     match event {
///         Event::Opened { .. } => ws.send(Message::text("hello"))?,
///         Event::Message(msg) => println!("received {} bytes", msg.len()),
///         Event::Closed(info) => println!("closed with {}", info.code),
///         _ => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WebSocket {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl WebSocket {
    /// Connect to a `ws://` or `wss://` target over TCP.
    ///
    /// Must be called from within a Tokio runtime. The connection starts in
    /// [`ConnectionState::Connecting`]; exactly one of
    /// [`Event::Opened`](crate::Event::Opened) or
    /// [`Event::ConnectFailed`](crate::Event::ConnectFailed) follows.
    ///
    /// # Errors
    ///
    /// Descriptor errors are returned immediately, before any I/O. This
    /// includes `wss://` targets when the `tls-rustls` feature is disabled.
    pub fn connect(target: impl IntoDescriptor, config: Config) -> Result<(Self, EventReceiver)> {
        let descriptor = target.into_descriptor()?;
        Connector::check(&descriptor)?;
        Ok(Self::spawn(descriptor, config, Connector::default()))
    }

    /// Connect using a specific TLS configuration for `wss://` targets.
    ///
    /// # Errors
    ///
    /// See [`WebSocket::connect`].
    #[cfg(feature = "tls-rustls")]
    pub fn connect_with_tls(
        target: impl IntoDescriptor,
        config: Config,
        tls: TlsConnector,
    ) -> Result<(Self, EventReceiver)> {
        let descriptor = target.into_descriptor()?;
        Ok(Self::spawn(descriptor, config, Connector::with_tls(tls)))
    }

    /// Run the WebSocket protocol over an already connected stream.
    ///
    /// The descriptor still supplies the handshake's `Host`, path and
    /// headers. `Timeouts::connect` does not apply.
    ///
    /// # Errors
    ///
    /// Descriptor errors, returned immediately.
    pub fn connect_stream<S>(
        target: impl IntoDescriptor,
        stream: S,
        config: Config,
    ) -> Result<(Self, EventReceiver)>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let descriptor = target.into_descriptor()?;
        let (handle, events, shared, command_rx, event_tx) = Self::channels();
        tokio::spawn(engine::run(
            shared,
            async move { Ok::<_, Error>(stream) },
            descriptor,
            config,
            command_rx,
            event_tx,
        ));
        Ok((handle, events))
    }

    fn spawn(
        descriptor: ConnectionDescriptor,
        config: Config,
        connector: Connector,
    ) -> (Self, EventReceiver) {
        let (handle, events, shared, command_rx, event_tx) = Self::channels();
        let target = descriptor.clone();
        tokio::spawn(engine::run(
            shared,
            async move { connector.connect(&target).await },
            descriptor,
            config,
            command_rx,
            event_tx,
        ));
        (handle, events)
    }

    #[allow(clippy::type_complexity)]
    fn channels() -> (
        Self,
        EventReceiver,
        Arc<Shared>,
        mpsc::UnboundedReceiver<Command>,
        mpsc::UnboundedSender<crate::event::Event>,
    ) {
        let shared = Arc::new(Shared::new(ConnectionId::next()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let events = EventReceiver::new(event_rx, command_tx.downgrade());
        let handle = Self {
            shared: shared.clone(),
            commands: command_tx,
        };
        (handle, events, shared, command_rx, event_tx)
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Subprotocol selected by the server, once open.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        self.shared.negotiated.get()?.protocol.as_deref()
    }

    /// Extensions accepted by the server, once open.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        self.shared
            .negotiated
            .get()
            .map(|n| n.extensions.as_slice())
            .unwrap_or(&[])
    }

    /// Queue a text or binary message.
    ///
    /// Messages are written in call order. Messages larger than
    /// `Config::fragment_size` go out as several frames.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the connection is open and no close has
    /// been requested.
    pub fn send(&self, message: impl Into<Message>) -> Result<()> {
        self.ensure_open("send")?;
        self.submit(Command::Send(message.into()))
    }

    /// Queue a text message.
    ///
    /// # Errors
    ///
    /// See [`WebSocket::send`].
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Message::Text(text.into()))
    }

    /// Queue a binary message.
    ///
    /// # Errors
    ///
    /// See [`WebSocket::send`].
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Message::Binary(data.into()))
    }

    /// Queue a ping.
    ///
    /// # Errors
    ///
    /// `Error::ControlFrameTooLarge` for payloads over 125 bytes, otherwise
    /// see [`WebSocket::send`].
    pub fn ping(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        let payload = control_payload(payload.into())?;
        self.ensure_open("ping")?;
        self.submit(Command::Ping(payload))
    }

    /// Queue an unsolicited pong.
    ///
    /// # Errors
    ///
    /// See [`WebSocket::ping`].
    pub fn pong(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        let payload = control_payload(payload.into())?;
        self.ensure_open("pong")?;
        self.submit(Command::Pong(payload))
    }

    /// Start the closing handshake, or cancel a pending connect.
    ///
    /// Idempotent: only the first call has an effect, and calling it on a
    /// connection that already ended is a no-op. Sends still queued behind
    /// the close are dropped.
    ///
    /// # Errors
    ///
    /// `Error::InvalidCloseCode` for codes that may not be sent (1005, 1006,
    /// 1015, anything below 1000) and `Error::ControlFrameTooLarge` for a
    /// reason longer than 123 bytes.
    pub fn close(&self, code: CloseCode, reason: impl Into<String>) -> Result<()> {
        if self.state().is_terminal() || self.shared.close_requested() {
            return Ok(());
        }
        let close = CloseFrame::new(code, reason);
        close.validate()?;
        if self.shared.close_requested.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(conn = %self.shared.id, %code, "close requested");
        // The engine may already be gone; then the connection has ended on its own.
        let _ = self.commands.send(Command::Close(close));
        Ok(())
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        let state = match self.state() {
            ConnectionState::Open if self.shared.close_requested() => {
                ConnectionState::Closing
            }
            state => state,
        };
        if state.can_send() {
            Ok(())
        } else {
            Err(Error::InvalidState { operation, state })
        }
    }

    fn submit(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::InvalidState {
                operation: "send",
                state: self.state(),
            })
    }
}

fn control_payload(payload: Vec<u8>) -> Result<Vec<u8>> {
    if payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
        return Err(Error::ControlFrameTooLarge(payload.len()));
    }
    Ok(payload)
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
