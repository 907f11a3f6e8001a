//! Transport streams: plaintext TCP and TLS, with in-band upgrade.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Transport};
use crate::{Error, Result};

/// A duplex stream that is either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS stream (boxed to keep the enum small).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Dials the server described by `config`.
    ///
    /// For [`Transport::StartTls`] this returns the plaintext stream; the
    /// connection performs the STARTTLS exchange and calls
    /// [`Self::upgrade_to_tls`] afterwards.
    pub async fn dial(config: &Config) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        tracing::debug!(%addr, transport = ?config.transport, "dialing");

        let tcp = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout(config.connect_timeout))?
            .map_err(|e| Error::ConnectionFailed(format!("connect to {addr}: {e}")))?;

        match config.transport {
            Transport::Tcp | Transport::StartTls => Ok(Self::Plain(tcp)),
            Transport::Tls => {
                let tls = timeout(config.connect_timeout, handshake(&config.host, tcp))
                    .await
                    .map_err(|_| Error::Timeout(config.connect_timeout))??;
                Ok(Self::Tls(Box::new(tls)))
            }
        }
    }

    /// Upgrades a plaintext stream to TLS after a successful STARTTLS.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let tls = handshake(host, tcp).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::Protocol("stream is already TLS".to_string())),
        }
    }

    /// True when the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

/// Runs the client-side TLS handshake against `host`.
async fn handshake(host: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let connector = tls_connector();
    let server_name = ServerName::try_from(host.to_string())?;
    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::ConnectionFailed(format!("TLS handshake with {host}: {e}")))
}

/// TLS connector backed by the webpki root store.
fn tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
