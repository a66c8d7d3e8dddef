//! Connection targets.
//!
//! A [`ConnectionDescriptor`] names the server (`ws://` or `wss://` URL) and
//! the protocol-level headers sent with the opening handshake. It is validated
//! up front so that a malformed target fails synchronously, before any I/O.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

/// Headers the handshake writes itself. Callers may not supply them.
const RESERVED_HEADERS: &[&str] = &[
    "host",
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
    "sec-websocket-protocol",
    "sec-websocket-extensions",
    "origin",
];

/// URL scheme of a WebSocket target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain TCP.
    Ws,
    /// TLS over TCP.
    Wss,
}

impl Scheme {
    /// Port used when the URL does not name one.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Scheme::Ws => 80,
            Scheme::Wss => 443,
        }
    }

    /// Returns `true` for `wss`.
    #[must_use]
    pub const fn is_secure(self) -> bool {
        matches!(self, Scheme::Wss)
    }

    /// The scheme as written in a URL.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target address and handshake headers for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    scheme: Scheme,
    /// Host as written in the URL (IPv6 literals keep their brackets).
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    protocols: Vec<String>,
    extensions: Vec<String>,
    origin: Option<String>,
}

impl ConnectionDescriptor {
    /// Parse a `ws://` or `wss://` URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDescriptor` if the URL does not parse, uses
    /// another scheme, has no host, or carries a fragment or credentials.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)
            .map_err(|e| Error::InvalidDescriptor(format!("{input}: {e}")))?;
        Self::from_url(&url)
    }

    /// Build a descriptor from an already parsed URL.
    ///
    /// # Errors
    ///
    /// See [`ConnectionDescriptor::parse`].
    pub fn from_url(url: &Url) -> Result<Self> {
        let scheme = match url.scheme() {
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            other => {
                return Err(Error::InvalidDescriptor(format!(
                    "unsupported scheme {other:?}, expected ws or wss"
                )));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidDescriptor("missing host".into()))?
            .to_owned();

        if url.fragment().is_some() {
            return Err(Error::InvalidDescriptor(
                "fragments are not allowed in WebSocket URLs".into(),
            ));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(Error::InvalidDescriptor(
                "credentials are not allowed in WebSocket URLs".into(),
            ));
        }

        let path = match url.path() {
            "" => "/".to_owned(),
            p => p.to_owned(),
        };

        Ok(Self {
            scheme,
            host,
            port: url.port().unwrap_or(scheme.default_port()),
            path,
            query: url.query().map(str::to_owned),
            headers: Vec::new(),
            protocols: Vec::new(),
            extensions: Vec::new(),
            origin: None,
        })
    }

    /// Add a custom handshake header.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidDescriptor` if the name is empty, not an HTTP token,
    ///   or one of the headers the handshake writes itself
    /// - `Error::InvalidHeaderValue` if the value contains CR or LF
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();

        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(Error::InvalidDescriptor(format!(
                "invalid header name {name:?}"
            )));
        }
        if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(Error::InvalidDescriptor(format!(
                "header {name} is managed by the handshake"
            )));
        }
        check_header_value(&name, &value)?;

        self.headers.push((name, value));
        Ok(self)
    }

    /// Offer a subprotocol (`Sec-WebSocket-Protocol`). Order is preference order.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDescriptor` if the name is empty or not an HTTP token.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Result<Self> {
        let protocol = protocol.into();
        if protocol.is_empty() || !protocol.bytes().all(is_token_byte) {
            return Err(Error::InvalidDescriptor(format!(
                "invalid subprotocol {protocol:?}"
            )));
        }
        self.protocols.push(protocol);
        Ok(self)
    }

    /// Offer an extension (`Sec-WebSocket-Extensions`), passed through verbatim.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeaderValue` if the value contains CR or LF.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Result<Self> {
        let extension = extension.into();
        check_header_value("Sec-WebSocket-Extensions", &extension)?;
        self.extensions.push(extension);
        Ok(self)
    }

    /// Set the `Origin` header.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeaderValue` if the value contains CR or LF.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        check_header_value("Origin", &origin)?;
        self.origin = Some(origin);
        Ok(self)
    }

    /// URL scheme.
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host as written in the URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host suitable for name resolution and TLS server names (no IPv6 brackets).
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    /// TCP port, defaulted from the scheme.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Request path, always starting with `/`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Custom headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Offered subprotocols in preference order.
    #[must_use]
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Offered extensions.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// `Origin` header, if set.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Request target for the HTTP request line (`path[?query]`).
    #[must_use]
    pub fn request_target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Value of the `Host` header; the port is included only when non-default.
    #[must_use]
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}{}",
            self.scheme,
            self.host_header(),
            self.request_target()
        )
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Anything that names a connection target.
pub trait IntoDescriptor {
    /// Convert into a validated descriptor.
    ///
    /// # Errors
    ///
    /// Returns a descriptor error if the target is malformed.
    fn into_descriptor(self) -> Result<ConnectionDescriptor>;
}

impl IntoDescriptor for ConnectionDescriptor {
    fn into_descriptor(self) -> Result<ConnectionDescriptor> {
        Ok(self)
    }
}

impl IntoDescriptor for &str {
    fn into_descriptor(self) -> Result<ConnectionDescriptor> {
        ConnectionDescriptor::parse(self)
    }
}

impl IntoDescriptor for String {
    fn into_descriptor(self) -> Result<ConnectionDescriptor> {
        ConnectionDescriptor::parse(&self)
    }
}

impl IntoDescriptor for &String {
    fn into_descriptor(self) -> Result<ConnectionDescriptor> {
        ConnectionDescriptor::parse(self)
    }
}

impl IntoDescriptor for Url {
    fn into_descriptor(self) -> Result<ConnectionDescriptor> {
        ConnectionDescriptor::from_url(&self)
    }
}

/// RFC 7230 `tchar`.
const fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~'
        | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
}

/// Reject values that would split the HTTP request.
pub(crate) fn check_header_value(header: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHeaderValue {
            header: header.to_owned(),
            reason: "contains CR or LF characters".to_owned(),
        });
    }
    Ok(())
}
