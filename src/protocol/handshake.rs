//! Client side of the WebSocket opening handshake (RFC 6455 Section 4).
//!
//! [`HandshakeRequest`] renders the HTTP Upgrade request for a
//! [`ConnectionDescriptor`]; [`HandshakeResponse`] parses the server's reply and
//! [`HandshakeRequest::verify`] checks it against what was offered.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::descriptor::{ConnectionDescriptor, check_header_value};
use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Headers that must appear at most once in a response.
const SINGLETON_HEADERS: &[&str] = &[
    "upgrade",
    "connection",
    "sec-websocket-accept",
    "sec-websocket-protocol",
];

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use asyncws::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh `Sec-WebSocket-Key`: 16 random bytes, base64 encoded.
///
/// # Errors
///
/// Returns `Error::Io` if the random source is unavailable.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce).map_err(|e| Error::Io(format!("handshake key: {e}")))?;
    Ok(BASE64.encode(nonce))
}

/// Position just past the `\r\n\r\n` that ends an HTTP header block.
#[must_use]
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Returns `true` if a comma-separated header value contains `token`.
fn header_has_token(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|part| part.trim().eq_ignore_ascii_case(token))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parse header lines into a map keyed by lowercase name.
///
/// Repeated list headers are joined with `", "`; a repeated singleton header
/// is rejected.
fn parse_headers<'a, I>(lines: I) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHandshake(format!("Malformed header line: {line}")))?;
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        match headers.get_mut(&name) {
            Some(_) if SINGLETON_HEADERS.contains(&name.as_str()) => {
                return Err(Error::InvalidHandshake(format!("Duplicate header: {name}")));
            }
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                headers.insert(name, value.to_owned());
            }
        }
    }

    Ok(headers)
}

/// An outgoing opening handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    target: String,
    host: String,
    key: String,
    origin: Option<String>,
    protocols: Vec<String>,
    extensions: Vec<String>,
    headers: Vec<(String, String)>,
}

impl HandshakeRequest {
    /// Build a request for `descriptor` with a freshly generated key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if no random key can be generated.
    pub fn new(descriptor: &ConnectionDescriptor) -> Result<Self> {
        Ok(Self::with_key(descriptor, generate_key()?))
    }

    /// Build a request with a caller-chosen key.
    #[must_use]
    pub fn with_key(descriptor: &ConnectionDescriptor, key: String) -> Self {
        Self {
            target: descriptor.request_target(),
            host: descriptor.host_header(),
            key,
            origin: descriptor.origin().map(str::to_owned),
            protocols: descriptor.protocols().to_vec(),
            extensions: descriptor.extensions().to_vec(),
            headers: descriptor.headers().to_vec(),
        }
    }

    /// The `Sec-WebSocket-Key` sent with this request.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The `Sec-WebSocket-Accept` value a conforming server must answer with.
    #[must_use]
    pub fn expected_accept(&self) -> String {
        compute_accept_key(&self.key)
    }

    /// Write the HTTP request to a buffer.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeaderValue` if any header value contains CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.target).as_bytes());

        let mut line = |name: &str, value: &str| -> Result<()> {
            check_header_value(name, value)?;
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
            Ok(())
        };

        line("Host", &self.host)?;
        line("Upgrade", "websocket")?;
        line("Connection", "Upgrade")?;
        line("Sec-WebSocket-Key", &self.key)?;
        line("Sec-WebSocket-Version", "13")?;
        if let Some(origin) = &self.origin {
            line("Origin", origin)?;
        }
        if !self.protocols.is_empty() {
            line("Sec-WebSocket-Protocol", &self.protocols.join(", "))?;
        }
        if !self.extensions.is_empty() {
            line("Sec-WebSocket-Extensions", &self.extensions.join(", "))?;
        }
        for (name, value) in &self.headers {
            line(name, value)?;
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Render the request into a new buffer.
    ///
    /// # Errors
    ///
    /// See [`HandshakeRequest::write`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        self.write(&mut buf)?;
        Ok(buf)
    }

    /// Check a parsed response against this request.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` if the accept key does not match, or
    /// the server selected a subprotocol or extension that was never offered.
    pub fn verify(&self, response: &HandshakeResponse) -> Result<()> {
        let expected = self.expected_accept();
        if response.accept != expected {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {expected}, got {}",
                response.accept
            )));
        }

        if let Some(protocol) = &response.protocol {
            if !self.protocols.iter().any(|p| p == protocol) {
                return Err(Error::InvalidHandshake(format!(
                    "Server selected subprotocol {protocol:?} that was not offered"
                )));
            }
        }

        for extension in &response.extensions {
            let name = extension_name(extension);
            if !self.extensions.iter().any(|e| extension_name(e) == name) {
                return Err(Error::InvalidHandshake(format!(
                    "Server selected extension {name:?} that was not offered"
                )));
            }
        }

        Ok(())
    }
}

fn extension_name(extension: &str) -> &str {
    extension.split(';').next().unwrap_or(extension).trim()
}

/// WebSocket handshake response from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The selected Sec-WebSocket-Protocol (optional).
    pub protocol: Option<String>,
    /// The negotiated Sec-WebSocket-Extensions, verbatim.
    pub extensions: Vec<String>,
}

impl HandshakeResponse {
    /// Parse a handshake response header block (status line through the blank line).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8 or the status line is malformed.
    /// - The status code is not `101`.
    /// - `Upgrade` is missing or not `websocket`.
    /// - `Connection` is missing or lacks the `upgrade` token.
    /// - `Sec-WebSocket-Accept` is missing, or a singleton header is repeated.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.split("\r\n");

        let status_line = lines
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        let status = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/1.") {
            return Err(Error::InvalidHandshake(format!(
                "Malformed status line: {status_line}"
            )));
        }
        if status != "101" {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {status_line}"
            )));
        }

        let headers = parse_headers(lines)?;

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header in response".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = headers.get("connection").ok_or_else(|| {
            Error::InvalidHandshake("Missing Connection header in response".into())
        })?;
        if !header_has_token(connection, "upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {connection}"
            )));
        }

        let accept = headers
            .get("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?
            .clone();

        let protocol = headers
            .get("sec-websocket-protocol")
            .filter(|p| !p.is_empty())
            .cloned();

        let extensions = headers
            .get("sec-websocket-extensions")
            .map(|e| split_list(e))
            .unwrap_or_default();

        Ok(Self {
            accept,
            protocol,
            extensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
    const RFC_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::parse("ws://server.example.com:8080/chat?x=1").unwrap()
    }

    fn response(extra: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {RFC_ACCEPT}\r\n\
             {extra}\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn test_compute_accept_key_rfc_example() {
        assert_eq!(compute_accept_key(RFC_KEY), RFC_ACCEPT);
    }

    #[test]
    fn test_generate_key_is_16_bytes() {
        let key = generate_key().unwrap();
        assert_eq!(BASE64.decode(&key).unwrap().len(), 16);
        assert_ne!(key, generate_key().unwrap());
    }

    #[test]
    fn test_write_request() {
        let d = descriptor()
            .with_protocol("chat")
            .unwrap()
            .with_protocol("superchat")
            .unwrap()
            .with_origin("http://example.com")
            .unwrap()
            .with_header("X-Token", "abc")
            .unwrap();
        let request = HandshakeRequest::with_key(&d, RFC_KEY.to_string());
        let text = String::from_utf8(request.to_bytes().unwrap()).unwrap();

        assert!(text.starts_with("GET /chat?x=1 HTTP/1.1\r\n"));
        assert!(text.contains("Host: server.example.com:8080\r\n"));
        assert!(text.contains("Upgrade: websocket\r\n"));
        assert!(text.contains("Connection: Upgrade\r\n"));
        assert!(text.contains(&format!("Sec-WebSocket-Key: {RFC_KEY}\r\n")));
        assert!(text.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(text.contains("Origin: http://example.com\r\n"));
        assert!(text.contains("Sec-WebSocket-Protocol: chat, superchat\r\n"));
        assert!(text.contains("X-Token: abc\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_parse_valid_response() {
        let resp = HandshakeResponse::parse(&response("")).unwrap();
        assert_eq!(resp.accept, RFC_ACCEPT);
        assert_eq!(resp.protocol, None);
        assert!(resp.extensions.is_empty());
    }

    #[test]
    fn test_parse_response_case_insensitive() {
        let data = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             upgrade: WebSocket\r\n\
             CONNECTION: keep-alive, upgrade\r\n\
             sec-websocket-accept: {RFC_ACCEPT}\r\n\r\n"
        );
        assert!(HandshakeResponse::parse(data.as_bytes()).is_ok());
    }

    #[test]
    fn test_parse_response_rejections() {
        let cases: [&[u8]; 5] = [
            b"HTTP/1.1 200 OK\r\n\r\n",
            b"HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: x\r\n\r\n",
            b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nSec-WebSocket-Accept: x\r\n\r\n",
            b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: close\r\nSec-WebSocket-Accept: x\r\n\r\n",
            b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n",
        ];
        for data in cases {
            assert!(matches!(
                HandshakeResponse::parse(data),
                Err(Error::InvalidHandshake(_))
            ));
        }
    }

    #[test]
    fn test_parse_response_duplicate_accept() {
        let data = response(&format!("Sec-WebSocket-Accept: {RFC_ACCEPT}\r\n"));
        assert!(matches!(
            HandshakeResponse::parse(&data),
            Err(Error::InvalidHandshake(msg)) if msg.contains("Duplicate")
        ));
    }

    #[test]
    fn test_verify_accept_key() {
        let request = HandshakeRequest::with_key(&descriptor(), RFC_KEY.to_string());
        let resp = HandshakeResponse::parse(&response("")).unwrap();
        assert!(request.verify(&resp).is_ok());

        let other = HandshakeRequest::with_key(&descriptor(), "AAAAAAAAAAAAAAAAAAAAAA==".into());
        assert!(matches!(
            other.verify(&resp),
            Err(Error::InvalidHandshake(msg)) if msg.contains("mismatch")
        ));
    }

    #[test]
    fn test_verify_subprotocol() {
        let d = descriptor().with_protocol("chat").unwrap();
        let request = HandshakeRequest::with_key(&d, RFC_KEY.to_string());

        let ok = HandshakeResponse::parse(&response("Sec-WebSocket-Protocol: chat\r\n")).unwrap();
        assert_eq!(ok.protocol.as_deref(), Some("chat"));
        assert!(request.verify(&ok).is_ok());

        let bad = HandshakeResponse::parse(&response("Sec-WebSocket-Protocol: mqtt\r\n")).unwrap();
        assert!(request.verify(&bad).is_err());
    }

    #[test]
    fn test_verify_extensions() {
        let d = descriptor().with_extension("x-foo; level=2").unwrap();
        let request = HandshakeRequest::with_key(&d, RFC_KEY.to_string());

        let ok = HandshakeResponse::parse(&response("Sec-WebSocket-Extensions: x-foo; level=1\r\n"))
            .unwrap();
        assert_eq!(ok.extensions, vec!["x-foo; level=1"]);
        assert!(request.verify(&ok).is_ok());

        let bad = HandshakeResponse::parse(&response("Sec-WebSocket-Extensions: x-bar\r\n")).unwrap();
        assert!(request.verify(&bad).is_err());
    }

    #[test]
    fn test_find_header_end() {
        let mut data = response("");
        let header_len = data.len();
        data.extend_from_slice(&[0x81, 0x00]);
        assert_eq!(find_header_end(&data), Some(header_len));
        assert_eq!(find_header_end(b"HTTP/1.1 101\r\n"), None);
    }
}
