//! Error types for the IMAP engine.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::types::Status;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connecting failed, the greeting was missing, or a TLS negotiation
    /// (implicit or STARTTLS) did not complete.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A read or write exceeded the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The peer closed the stream, or the stream was closed locally.
    #[error("connection closed: {0}")]
    Closed(String),

    /// LOGIN or AUTHENTICATE was rejected or aborted by the server.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server completed a command with NO, BAD, or BYE.
    #[error("server returned {status}: {text}")]
    Server {
        /// Tagged status keyword the server answered with.
        status: Status,
        /// Human-readable text from the status line.
        text: String,
    },

    /// The server sent bytes that do not match the IMAP grammar.
    #[error("malformed response at byte {position}: {message}")]
    BadResponse {
        /// Byte offset into the inbound stream where lexing failed.
        position: u64,
        /// Description of what went wrong.
        message: String,
    },

    /// Protocol violation: a continuation that never arrived, literal
    /// framing mismatch, or a response for an unknown tag.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                Self::Timeout(Duration::ZERO)
            }
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => Self::Closed(e.to_string()),
            _ => Self::ConnectionFailed(e.to_string()),
        }
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Self::ConnectionFailed(format!("TLS error: {e}"))
    }
}

impl From<rustls::pki_types::InvalidDnsNameError> for Error {
    fn from(e: rustls::pki_types::InvalidDnsNameError) -> Self {
        Self::ConnectionFailed(format!("invalid DNS name: {e}"))
    }
}

impl Error {
    /// Returns true if the underlying stream should be considered dead.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::Timeout(_) | Self::Closed(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
