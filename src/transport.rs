//! Byte transports for [`WebSocket::connect`](crate::WebSocket::connect).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::trace;

use crate::descriptor::{ConnectionDescriptor, Scheme};
use crate::error::{Error, Result};
#[cfg(feature = "tls-rustls")]
use crate::tls::{TlsConnector, TlsStream};

/// A TCP stream, optionally wrapped in TLS.
#[derive(Debug)]
#[non_exhaustive]
pub enum MaybeTlsStream {
    Plain(TcpStream),
    #[cfg(feature = "tls-rustls")]
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens transports for descriptors.
#[derive(Debug, Clone, Default)]
pub(crate) struct Connector {
    #[cfg(feature = "tls-rustls")]
    tls: Option<TlsConnector>,
}

impl Connector {
    #[cfg(feature = "tls-rustls")]
    pub fn with_tls(tls: TlsConnector) -> Self {
        Self { tls: Some(tls) }
    }

    /// Fail early for targets this build cannot reach.
    pub fn check(descriptor: &ConnectionDescriptor) -> Result<()> {
        if descriptor.scheme().is_secure() && !cfg!(feature = "tls-rustls") {
            return Err(Error::InvalidDescriptor(format!(
                "{descriptor}: wss:// requires the tls-rustls feature"
            )));
        }
        Ok(())
    }

    /// Resolve, connect and (for `wss`) run the TLS handshake.
    ///
    /// # Errors
    ///
    /// `Error::Connect` if the server cannot be reached or TLS fails.
    pub async fn connect(self, descriptor: &ConnectionDescriptor) -> Result<MaybeTlsStream> {
        let addr = (descriptor.hostname(), descriptor.port());
        let tcp = TcpStream::connect(addr).await.map_err(|e| {
            Error::Connect(format!(
                "{}:{}: {e}",
                descriptor.hostname(),
                descriptor.port()
            ))
        })?;
        if let Err(e) = tcp.set_nodelay(true) {
            trace!(error = %e, "TCP_NODELAY not set");
        }

        match descriptor.scheme() {
            Scheme::Ws => Ok(MaybeTlsStream::Plain(tcp)),
            #[cfg(feature = "tls-rustls")]
            Scheme::Wss => {
                let tls = self.tls.unwrap_or_default();
                let stream = tls.connect(descriptor.hostname(), tcp).await?;
                Ok(MaybeTlsStream::Tls(Box::new(stream)))
            }
            #[cfg(not(feature = "tls-rustls"))]
            Scheme::Wss => Self::check(descriptor).map(|()| MaybeTlsStream::Plain(tcp)),
        }
    }
}
