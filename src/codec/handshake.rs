//! Async driver for the client opening handshake.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{HandshakeRequest, HandshakeResponse, find_header_end};

/// Result of a successful opening handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// The verified server response.
    pub response: HandshakeResponse,
    /// Bytes the server sent after the blank line that ends its response.
    /// They belong to the first frame(s) and must reach the frame decoder.
    pub leftover: Vec<u8>,
}

/// Send `request` and read the server's response header block.
///
/// Reads until the header terminator, never more than
/// `limits.max_handshake_size` bytes of header.
///
/// # Errors
///
/// - `Error::InvalidHandshake` if the response is malformed, does not
///   upgrade, fails verification, or the transport closes first
/// - `Error::HandshakeTooLarge` if the header block exceeds the limit
/// - `Error::Io` on transport failure
pub async fn client_handshake<S>(
    stream: &mut S,
    request: &HandshakeRequest,
    limits: &Limits,
) -> Result<Handshake>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&request.to_bytes()?).await?;
    stream.flush().await?;

    let mut buf = BytesMut::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::InvalidHandshake(
                "Connection closed before the handshake response completed".into(),
            ));
        }
        // The terminator may straddle two reads.
        let search_from = buf.len().saturating_sub(3);
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find_header_end(&buf[search_from..]) {
            break search_from + end;
        }
        limits.check_handshake_size(buf.len())?;
    };
    limits.check_handshake_size(header_end)?;

    let response = HandshakeResponse::parse(&buf[..header_end])?;
    request.verify(&response)?;

    buf.advance(header_end);
    Ok(Handshake {
        response,
        leftover: buf.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ConnectionDescriptor;
    use crate::protocol::compute_accept_key;

    const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn request(descriptor: &str) -> HandshakeRequest {
        let descriptor = ConnectionDescriptor::parse(descriptor).unwrap();
        HandshakeRequest::with_key(&descriptor, KEY.to_string())
    }

    fn response(extra: &str) -> String {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n{extra}\r\n",
            compute_accept_key(KEY)
        )
    }

    async fn run(
        request: HandshakeRequest,
        reply: Vec<u8>,
        limits: Limits,
    ) -> (Result<Handshake>, Vec<u8>) {
        let (mut client, mut server) = tokio::io::duplex(16 * 1024);
        let server = tokio::spawn(async move {
            let mut received = Vec::new();
            let mut chunk = [0u8; 512];
            while find_header_end(&received).is_none() {
                let n = server.read(&mut chunk).await.unwrap();
                received.extend_from_slice(&chunk[..n]);
            }
            // Dribble the reply to exercise reassembly across reads.
            for piece in reply.chunks(5) {
                server.write_all(piece).await.unwrap();
                tokio::task::yield_now().await;
            }
            drop(server);
            received
        });
        let result = client_handshake(&mut client, &request, &limits).await;
        (result, server.await.unwrap())
    }

    #[tokio::test]
    async fn test_successful_handshake() {
        let (result, sent) = run(
            request("ws://example.com/chat"),
            response("").into_bytes(),
            Limits::default(),
        )
        .await;

        let handshake = result.unwrap();
        assert_eq!(handshake.response.accept, compute_accept_key(KEY));
        assert!(handshake.leftover.is_empty());

        let sent = String::from_utf8(sent).unwrap();
        assert!(sent.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(sent.contains(&format!("Sec-WebSocket-Key: {KEY}\r\n")));
    }

    #[tokio::test]
    async fn test_leftover_bytes_are_preserved() {
        let mut reply = response("").into_bytes();
        reply.extend_from_slice(&[0x81, 0x02, b'h', b'i']);

        let (result, _) = run(request("ws://example.com/"), reply, Limits::default()).await;
        assert_eq!(result.unwrap().leftover, vec![0x81, 0x02, b'h', b'i']);
    }

    #[tokio::test]
    async fn test_wrong_accept_rejected() {
        let reply = "HTTP/1.1 101 Switching Protocols\r\n\
                     Upgrade: websocket\r\n\
                     Connection: Upgrade\r\n\
                     Sec-WebSocket-Accept: bm90IHRoZSByaWdodCBrZXk=\r\n\r\n";
        let (result, _) = run(
            request("ws://example.com/"),
            reply.as_bytes().to_vec(),
            Limits::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidHandshake(_))));
    }

    #[tokio::test]
    async fn test_non_101_rejected() {
        let reply = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_vec();
        let (result, _) = run(request("ws://example.com/"), reply, Limits::default()).await;
        assert!(matches!(result, Err(Error::InvalidHandshake(_))));
    }

    #[tokio::test]
    async fn test_unoffered_protocol_rejected() {
        let reply = response("Sec-WebSocket-Protocol: chat\r\n").into_bytes();
        let (result, _) = run(request("ws://example.com/"), reply, Limits::default()).await;
        assert!(matches!(result, Err(Error::InvalidHandshake(_))));
    }

    #[tokio::test]
    async fn test_oversized_response_rejected() {
        let padding = format!("X-Padding: {}\r\n", "a".repeat(600));
        let reply = response(&padding).into_bytes();
        let limits = Limits {
            max_handshake_size: 256,
            ..Limits::default()
        };
        let (result, _) = run(request("ws://example.com/"), reply, limits).await;
        assert!(matches!(result, Err(Error::HandshakeTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_eof_before_response() {
        let (result, _) = run(request("ws://example.com/"), Vec::new(), Limits::default()).await;
        assert!(matches!(result, Err(Error::InvalidHandshake(_))));
    }
}
