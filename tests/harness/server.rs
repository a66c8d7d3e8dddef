//! Scripted WebSocket test server.
//!
//! Provides a TestServer that accepts one connection on a random port and
//! hands it to a per-test script.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use asyncws::CloseFrame;
use asyncws::protocol::{Frame, OpCode, compute_accept_key, find_header_end};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Upper bound on any single wait, so a broken client fails the test instead of hanging it.
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Bind a random port and run `script` against the first accepted connection.
    pub async fn spawn<F, Fut>(script: F) -> Self
    where
        F: FnOnce(ServerConn) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            script(ServerConn::new(stream)).await;
        });
        Self { addr, task }
    }

    /// Server that completes the handshake and echoes data frames until the
    /// client closes.
    pub async fn echo() -> Self {
        Self::spawn(|mut conn| async move {
            conn.accept("").await;
            while let Some(frame) = conn.read_frame().await {
                match frame.opcode {
                    OpCode::Close => {
                        conn.write_frame(&Frame::new(true, OpCode::Close, frame.into_payload()))
                            .await;
                        break;
                    }
                    OpCode::Ping => conn.write_frame(&Frame::pong(frame.into_payload())).await,
                    OpCode::Pong => {}
                    _ => conn.write_frame(&frame).await,
                }
            }
        })
        .await
    }

    pub fn url(&self) -> String {
        format!("ws://{}/test", self.addr)
    }

    /// Wait for the script to finish, propagating its assertion failures.
    pub async fn join(self) {
        tokio::time::timeout(STEP_TIMEOUT * 2, self.task)
            .await
            .expect("server script timed out")
            .expect("server script panicked");
    }
}

/// The server side of one accepted connection.
pub struct ServerConn {
    stream: TcpStream,
    buf: Vec<u8>,
    /// The client's raw handshake request, once read.
    pub request: String,
}

impl ServerConn {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            request: String::new(),
        }
    }

    /// Read the client's handshake request and return its `Sec-WebSocket-Key`.
    pub async fn read_request(&mut self) -> String {
        let end = loop {
            if let Some(end) = find_header_end(&self.buf) {
                break end;
            }
            assert!(self.fill().await, "client closed during handshake");
        };
        self.request = String::from_utf8(self.buf.drain(..end).collect()).unwrap();
        self.header("sec-websocket-key")
            .expect("request without Sec-WebSocket-Key")
    }

    /// Value of a request header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.request.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    /// Complete a conforming handshake, adding `extra_headers` (CRLF-terminated lines).
    pub async fn accept(&mut self, extra_headers: &str) {
        let key = self.read_request().await;
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n{extra_headers}\r\n",
            compute_accept_key(&key)
        );
        self.write_raw(response.as_bytes()).await;
    }

    /// Read one client frame, asserting it is masked. `None` on EOF.
    pub async fn read_frame(&mut self) -> Option<Frame> {
        loop {
            if self.buf.len() >= 2 {
                assert!(self.buf[1] & 0x80 != 0, "client frame must be masked");
                if let Ok((frame, consumed)) = Frame::parse(&self.buf) {
                    self.buf.drain(..consumed);
                    return Some(frame);
                }
            }
            if !self.fill().await {
                return None;
            }
        }
    }

    /// Read one frame and decode it as a close frame.
    pub async fn read_close(&mut self) -> Option<CloseFrame> {
        let frame = self.read_frame().await.expect("expected a close frame");
        assert_eq!(frame.opcode, OpCode::Close);
        CloseFrame::parse(frame.payload()).unwrap()
    }

    /// Write an unmasked frame.
    pub async fn write_frame(&mut self, frame: &Frame) {
        self.write_raw(&frame.encode(None)).await;
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Drain the connection until the client closes it, answering any close frame.
    pub async fn wait_for_eof(&mut self) {
        while let Some(frame) = self.read_frame().await {
            if frame.opcode == OpCode::Close {
                let echo = Frame::new(true, OpCode::Close, frame.into_payload()).encode(None);
                // The client may already be gone.
                let _ = self.stream.write_all(&echo).await;
            }
        }
    }

    async fn fill(&mut self) -> bool {
        let mut chunk = [0u8; 4096];
        let n = tokio::time::timeout(STEP_TIMEOUT, self.stream.read(&mut chunk))
            .await
            .expect("timed out waiting for the client")
            .unwrap_or(0);
        self.buf.extend_from_slice(&chunk[..n]);
        n > 0
    }
}
