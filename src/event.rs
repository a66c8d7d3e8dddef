//! Connection events and their delivery to the consumer.
//!
//! The engine pushes [`Event`]s into an unbounded queue in the order they
//! happen on the wire. The consumer owns the receiving end and chooses where
//! events are processed: await them directly, poll them as a
//! [`Stream`](futures_core::Stream), or hand them to a [`Delegate`] with
//! [`EventReceiver::run`]. In every case one consumer sees one event at a
//! time.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use crate::connection::engine::Command;
use crate::error::Error;
use crate::message::{CloseInfo, Message};

/// Something that happened on a connection.
///
/// A connection produces either `ConnectFailed` alone, or `Opened` followed
/// by any number of `Message`/`Ping`/`Pong` events and exactly one `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    /// The opening handshake succeeded.
    Opened {
        /// Subprotocol selected by the server.
        protocol: Option<String>,
        /// Extensions accepted by the server, verbatim.
        extensions: Vec<String>,
    },
    /// The connection never opened.
    ConnectFailed(Error),
    /// A complete text or binary message arrived.
    Message(Message),
    /// A ping arrived. The automatic pong has already been written.
    Ping(Vec<u8>),
    /// A pong arrived.
    Pong(Vec<u8>),
    /// The connection ended. Always the last event.
    Closed(CloseInfo),
}

impl Event {
    /// Returns `true` for the events after which nothing else is delivered.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Event::ConnectFailed(_) | Event::Closed(_))
    }
}

/// Callback-style consumer driven by [`EventReceiver::run`].
///
/// Every method has an empty default, so implementors override only what
/// they need.
pub trait Delegate {
    fn on_open(&mut self, _protocol: Option<&str>, _extensions: &[String]) {}

    fn on_connect_failed(&mut self, _error: Error) {}

    fn on_message(&mut self, _message: Message) {}

    /// Called after the automatic pong was written.
    ///
    /// Returning `Some(payload)` sends one additional pong carrying
    /// `payload`. It does not replace the automatic reply.
    fn on_ping(&mut self, _payload: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn on_pong(&mut self, _payload: &[u8]) {}

    fn on_close(&mut self, _info: CloseInfo) {}
}

/// Receiving end of a connection's event queue.
#[derive(Debug)]
pub struct EventReceiver {
    events: mpsc::UnboundedReceiver<Event>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl EventReceiver {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<Event>,
        commands: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self { events, commands }
    }

    /// Wait for the next event. Returns `None` after the terminal event.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    /// Deliver every event to `delegate`, one at a time, until the
    /// connection ends.
    pub async fn run<D: Delegate + ?Sized>(mut self, delegate: &mut D) {
        while let Some(event) = self.events.recv().await {
            self.dispatch(delegate, event);
        }
    }

    fn dispatch<D: Delegate + ?Sized>(&self, delegate: &mut D, event: Event) {
        match event {
            Event::Opened {
                protocol,
                extensions,
            } => delegate.on_open(protocol.as_deref(), &extensions),
            Event::ConnectFailed(error) => delegate.on_connect_failed(error),
            Event::Message(message) => delegate.on_message(message),
            Event::Ping(payload) => {
                if let Some(reply) = delegate.on_ping(&payload) {
                    // Handles may all be gone; then the connection is closing anyway.
                    if let Some(commands) = self.commands.upgrade() {
                        let _ = commands.send(Command::Pong(reply));
                    }
                }
            }
            Event::Pong(payload) => delegate.on_pong(&payload),
            Event::Closed(info) => delegate.on_close(info),
        }
    }
}

impl futures_core::Stream for EventReceiver {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}
