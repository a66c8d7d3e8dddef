//! The per-connection engine task.
//!
//! One engine owns the transport for the whole life of a connection. It
//! drives the opening handshake, then multiplexes three sources in priority
//! order: inbound frames from the reader task, the close-handshake deadline,
//! and commands from [`WebSocket`](crate::WebSocket) handles. Every state
//! change goes through [`Shared::transition`], and the terminal event is
//! emitted exactly once when the engine returns.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, trace, warn};

use crate::client::ConnectionId;
use crate::codec::{FrameWriter, WebSocketCodec, client_handshake};
use crate::config::Config;
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::responder::{ControlReaction, ControlResponder};
use crate::connection::state::ConnectionState;
use crate::descriptor::ConnectionDescriptor;
use crate::error::{Error, ErrorKind, Result};
use crate::event::Event;
use crate::message::{CloseCode, CloseFrame, CloseInfo, Message};
use crate::protocol::{Frame, HandshakeRequest, MAX_CONTROL_FRAME_PAYLOAD, MessageAssembler};

/// Frames decoded ahead of the engine before the reader task waits.
const INBOUND_QUEUE: usize = 16;

/// Requests from connection handles to the engine.
#[derive(Debug)]
pub(crate) enum Command {
    Send(Message),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(CloseFrame),
}

/// Parameters the server agreed to during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Negotiated {
    pub protocol: Option<String>,
    pub extensions: Vec<String>,
}

/// State visible to both the engine and the handles.
#[derive(Debug)]
pub(crate) struct Shared {
    pub id: ConnectionId,
    pub state: watch::Sender<ConnectionState>,
    pub close_requested: AtomicBool,
    pub negotiated: OnceLock<Negotiated>,
}

impl Shared {
    pub fn new(id: ConnectionId) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            id,
            state,
            close_requested: AtomicBool::new(false),
            negotiated: OnceLock::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Move to `next` if the lifecycle allows it. Returns whether it moved.
    pub fn transition(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if !state.can_transition_to(next) {
                trace!(conn = %self.id, from = %state, to = %next, "transition ignored");
                return false;
            }
            debug!(conn = %self.id, from = %state, to = %next, "state transition");
            *state = next;
            true
        })
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }
}

/// How the open phase ended.
struct Ending {
    state: ConnectionState,
    info: CloseInfo,
}

impl Ending {
    fn closed(code: CloseCode, reason: Option<String>) -> Self {
        Self {
            state: ConnectionState::Closed,
            info: CloseInfo::clean(code, reason),
        }
    }

    fn failed(error: Error) -> Self {
        Self {
            state: ConnectionState::Failed,
            info: CloseInfo::failed(error),
        }
    }
}

/// Run a connection from transport establishment to its terminal event.
pub(crate) async fn run<S, F>(
    shared: Arc<Shared>,
    connect: F,
    descriptor: ConnectionDescriptor,
    config: Config,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<Event>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: Future<Output = Result<S>> + Send,
{
    debug!(conn = %shared.id, target = %descriptor, "connecting");

    let established = tokio::select! {
        biased;
        () = cancelled(&mut commands, &shared) => Err(Error::Cancelled),
        result = establish(connect, &descriptor, &config) => result,
    };

    let (stream, handshake) = match established {
        Ok(established) => established,
        Err(error) => {
            warn!(conn = %shared.id, error = %error, "connect failed");
            shared.transition(ConnectionState::Failed);
            let _ = events.send(Event::ConnectFailed(error));
            return;
        }
    };

    let negotiated = Negotiated {
        protocol: handshake.response.protocol,
        extensions: handshake.response.extensions,
    };
    let _ = shared.negotiated.set(negotiated.clone());
    shared.transition(ConnectionState::Open);
    let _ = events.send(Event::Opened {
        protocol: negotiated.protocol,
        extensions: negotiated.extensions,
    });

    let mut codec = WebSocketCodec::new(stream, config.clone());
    codec.seed(&handshake.leftover);
    let (mut reader, writer) = codec.into_split();

    let (frame_tx, frame_rx) = mpsc::channel(INBOUND_QUEUE);
    let reader_task = tokio::spawn(async move {
        loop {
            let item = reader.read_frame().await;
            let last = !matches!(item, Ok(Some(_)));
            if frame_tx.send(item).await.is_err() || last {
                break;
            }
        }
    });

    let mut open = OpenConnection {
        shared: shared.clone(),
        writer,
        assembler: MessageAssembler::new(config.limits.clone()),
        responder: ControlResponder::new(),
        events,
        close_deadline: None,
        config,
    };
    let ending = open.run(frame_rx, commands).await;

    reader_task.abort();
    if let Err(e) = open.writer.shutdown().await {
        trace!(conn = %shared.id, error = %e, "transport shutdown failed");
    }
    shared.transition(ending.state);
    debug!(conn = %shared.id, code = %ending.info.code, "connection ended");
    let _ = open.events.send(Event::Closed(ending.info));
}

/// Resolves when the handles ask to abandon a pending connect.
async fn cancelled(commands: &mut mpsc::UnboundedReceiver<Command>, shared: &Shared) {
    loop {
        match commands.recv().await {
            Some(Command::Close(_)) | None => return,
            Some(command) => {
                trace!(conn = %shared.id, ?command, "command dropped while connecting");
            }
        }
    }
}

async fn establish<S, F>(
    connect: F,
    descriptor: &ConnectionDescriptor,
    config: &Config,
) -> Result<(S, crate::codec::Handshake)>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Future<Output = Result<S>>,
{
    let mut stream = timeout(config.timeouts.connect, connect)
        .await
        .map_err(|_| Error::Timeout("connect"))??;

    let request = HandshakeRequest::new(descriptor)?;
    let handshake = timeout(
        config.timeouts.handshake,
        client_handshake(&mut stream, &request, &config.limits),
    )
    .await
    .map_err(|_| Error::Timeout("handshake"))??;

    Ok((stream, handshake))
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct OpenConnection<S> {
    shared: Arc<Shared>,
    writer: FrameWriter<WriteHalf<S>>,
    assembler: MessageAssembler,
    responder: ControlResponder,
    events: mpsc::UnboundedSender<Event>,
    close_deadline: Option<Instant>,
    config: Config,
}

impl<S: AsyncRead + AsyncWrite + Unpin> OpenConnection<S> {
    async fn run(
        &mut self,
        mut inbound: mpsc::Receiver<Result<Option<Frame>>>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> Ending {
        let mut handles_alive = true;
        loop {
            let step = tokio::select! {
                biased;
                item = inbound.recv() => match item {
                    Some(Ok(Some(frame))) => self.on_frame(frame).await,
                    Some(Ok(None)) | None => Some(self.on_eof()),
                    Some(Err(error)) => Some(self.fail(error).await),
                },
                () = wait_for(self.close_deadline) => Some(self.on_close_timeout()),
                command = commands.recv(), if handles_alive => match command {
                    Some(command) => self.on_command(command).await,
                    None => {
                        handles_alive = false;
                        debug!(conn = %self.shared.id, "all handles dropped, closing");
                        self.on_command(Command::Close(CloseFrame::new(CloseCode::GoingAway, "")))
                            .await
                    }
                },
            };
            if let Some(ending) = step {
                return ending;
            }
        }
    }

    fn emit(&self, event: Event) {
        // The consumer may have dropped its receiver; the engine runs on regardless.
        let _ = self.events.send(event);
    }

    async fn write(&mut self, frame: &Frame) -> Result<()> {
        trace!(
            conn = %self.shared.id,
            opcode = %frame.opcode,
            fin = frame.fin,
            len = frame.payload().len(),
            "write frame"
        );
        self.writer.write_frame(frame).await?;
        self.writer.flush().await
    }

    async fn on_frame(&mut self, frame: Frame) -> Option<Ending> {
        trace!(
            conn = %self.shared.id,
            opcode = %frame.opcode,
            fin = frame.fin,
            len = frame.payload().len(),
            "read frame"
        );

        if !frame.opcode.is_control() {
            return match self.assembler.push(frame) {
                Ok(Some(message)) => {
                    self.emit(Event::Message(message));
                    None
                }
                Ok(None) => None,
                Err(error) => Some(self.fail(error).await),
            };
        }

        let reaction = match self.responder.handle(frame) {
            Ok(reaction) => reaction,
            Err(error) => return Some(self.fail(error).await),
        };

        match reaction {
            ControlReaction::Ping { reply, payload } => {
                debug!(conn = %self.shared.id, len = payload.len(), "ping received");
                if let Some(reply) = reply {
                    if let Err(error) = self.write(&reply).await {
                        return Some(self.fail(error).await);
                    }
                }
                self.emit(Event::Ping(payload));
                None
            }
            ControlReaction::Pong { payload } => {
                debug!(conn = %self.shared.id, len = payload.len(), "pong received");
                self.emit(Event::Pong(payload));
                None
            }
            ControlReaction::CloseEcho {
                reply,
                code,
                reason,
            } => {
                debug!(conn = %self.shared.id, %code, "peer initiated close");
                self.shared.transition(ConnectionState::Closing);
                if let Err(error) = self.write(&reply).await {
                    debug!(conn = %self.shared.id, %error, "close echo not sent");
                }
                Some(Ending::closed(code, reason))
            }
            ControlReaction::CloseComplete { code, reason } => {
                debug!(conn = %self.shared.id, %code, "close handshake complete");
                Some(Ending::closed(code, reason))
            }
        }
    }

    async fn on_command(&mut self, command: Command) -> Option<Ending> {
        let frames: Vec<Frame> = match command {
            Command::Close(close) => return self.start_close(&close).await,
            _ if self.responder.close_sent() || self.shared.close_requested() => {
                debug!(conn = %self.shared.id, ?command, "dropping queued command after close");
                return None;
            }
            Command::Send(message) => {
                MessageFragmenter::for_message(&message, self.config.fragment_size).collect()
            }
            Command::Ping(payload) => vec![Frame::ping(payload)],
            Command::Pong(payload) if payload.len() > MAX_CONTROL_FRAME_PAYLOAD => {
                warn!(
                    conn = %self.shared.id,
                    len = payload.len(),
                    "pong payload exceeds control frame limit, not sent"
                );
                return None;
            }
            Command::Pong(payload) => vec![Frame::pong(payload)],
        };

        for frame in &frames {
            trace!(conn = %self.shared.id, opcode = %frame.opcode, len = frame.payload().len(), "write frame");
            if let Err(error) = self.writer.write_frame(frame).await {
                return Some(self.fail(error).await);
            }
        }
        if let Err(error) = self.writer.flush().await {
            return Some(self.fail(error).await);
        }
        None
    }

    async fn start_close(&mut self, close: &CloseFrame) -> Option<Ending> {
        let frame = self.responder.local_close(close)?;
        debug!(conn = %self.shared.id, code = %close.code, "starting close handshake");
        self.shared.transition(ConnectionState::Closing);
        if let Err(error) = self.write(&frame).await {
            return Some(self.fail(error).await);
        }
        self.close_deadline = Some(Instant::now() + self.config.timeouts.close);
        None
    }

    fn on_eof(&mut self) -> Ending {
        if self.responder.close_sent() {
            debug!(conn = %self.shared.id, "transport closed during close handshake");
            return Ending::closed(CloseCode::Abnormal, None);
        }
        warn!(
            conn = %self.shared.id,
            mid_message = self.assembler.is_assembling(),
            "transport closed unexpectedly"
        );
        Ending::failed(Error::ConnectionClosed(None))
    }

    fn on_close_timeout(&mut self) -> Ending {
        warn!(
            conn = %self.shared.id,
            timeout = ?self.config.timeouts.close,
            "close handshake timed out"
        );
        Ending::closed(CloseCode::Abnormal, None)
    }

    /// Terminate on a fatal error, telling the peer why when the error is ours to report.
    async fn fail(&mut self, error: Error) -> Ending {
        warn!(conn = %self.shared.id, %error, "connection failed");
        if error.kind() == ErrorKind::Protocol {
            let close = CloseFrame::new(error.close_code(), "");
            if let Some(frame) = self.responder.local_close(&close) {
                let sent = timeout(self.config.timeouts.close, self.write(&frame)).await;
                if !matches!(sent, Ok(Ok(()))) {
                    debug!(conn = %self.shared.id, "close frame not sent after failure");
                }
            }
        }
        Ending::failed(error)
    }
}
