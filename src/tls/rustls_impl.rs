use std::fmt;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::rustls::ClientConfig;

use crate::error::{Error, Result};

/// A client-side TLS stream.
pub type TlsStream<S> = tokio_rustls::client::TlsStream<S>;

/// Performs the client TLS handshake for `wss://` targets.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Connector with a caller-supplied rustls configuration.
    #[must_use]
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            inner: tokio_rustls::TlsConnector::from(config),
        }
    }

    /// Connector trusting the Mozilla root set shipped in `webpki-roots`.
    #[must_use]
    pub fn with_webpki_roots() -> Self {
        let root_store =
            rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self::new(Arc::new(config))
    }

    /// Run the TLS handshake over `stream`, verifying the certificate for `domain`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidDescriptor` if `domain` is not a valid server name
    /// - `Error::Connect` if the TLS handshake fails
    pub async fn connect<S>(&self, domain: &str, stream: S) -> Result<TlsStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|_| Error::InvalidDescriptor(format!("Invalid TLS server name: {domain}")))?;

        self.inner
            .connect(server_name, stream)
            .await
            .map_err(|e| Error::Connect(format!("TLS handshake with {domain} failed: {e}")))
    }
}

impl Default for TlsConnector {
    fn default() -> Self {
        Self::with_webpki_roots()
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector").finish_non_exhaustive()
    }
}
