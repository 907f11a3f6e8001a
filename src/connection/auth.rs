//! Connection lifecycle: connect, STARTTLS, authentication, teardown.

#![allow(clippy::missing_errors_doc)]

use tokio::io::{AsyncRead, AsyncWrite};

use super::stream::ImapStream;
use super::{Config, ConnState, Connection, Transport};
use crate::command::Command;
use crate::parser::{Frame, Tokenizer, render};
use crate::{Error, Result, sasl};

impl Connection<ImapStream> {
    /// Connects to the server described by `config` and reads the greeting.
    ///
    /// For [`Transport::StartTls`] the exchange happens on the plaintext
    /// stream and TLS is enabled in-band once the server accepts STARTTLS,
    /// before any further command is written.
    pub async fn connect(config: &Config) -> Result<Self> {
        let stream = ImapStream::dial(config).await?;

        let mut conn = Self::with_parts(
            Tokenizer::new(stream),
            crate::command::TagGenerator::new(),
            ConnState::Greeting,
            Vec::new(),
            std::collections::VecDeque::new(),
            config.read_timeout,
        );
        conn.read_greeting().await?;

        if config.transport == Transport::StartTls {
            conn = conn.upgrade_tls(&config.host).await?;
        }

        Ok(conn)
    }

    /// Runs the STARTTLS exchange and swaps the transport to TLS.
    async fn upgrade_tls(mut self, host: &str) -> Result<Self> {
        self.starttls_exchange().await?;

        let (tok, tags, state, caps, queue, read_timeout) = self.into_tokenizer_parts();
        let stream = tok.into_inner().upgrade_to_tls(host).await?;
        tracing::debug!(%host, "TLS enabled via STARTTLS");

        Ok(Self::with_parts(
            Tokenizer::new(stream),
            tags,
            state,
            caps,
            queue,
            read_timeout,
        ))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends STARTTLS and consumes exactly the tagged OK.
    ///
    /// No bytes beyond the tagged line are read, so the TLS handshake can
    /// take over the stream cleanly.
    pub(crate) async fn starttls_exchange(&mut self) -> Result<()> {
        let reply = self.dispatch(&Command::StartTls).await?;
        if reply.status.is_ok() {
            Ok(())
        } else {
            Err(Error::ConnectionFailed(format!(
                "STARTTLS refused: {}",
                reply.text
            )))
        }
    }

    /// Authenticates with LOGIN.
    ///
    /// A tagged NO or BAD surfaces as [`Error::Auth`] carrying the server's
    /// text.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        if *self.state() != ConnState::NotAuthenticated {
            return Err(Error::Protocol(
                "LOGIN is only valid before authentication".to_string(),
            ));
        }

        let cmd = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        let reply = self.dispatch(&cmd).await?;
        if reply.status.is_ok() {
            self.set_state(ConnState::Authenticated);
            tracing::debug!(user = username, "login accepted");
            Ok(())
        } else {
            Err(Error::Auth(reply.text))
        }
    }

    /// Authenticates with the XOAUTH2 SASL mechanism.
    ///
    /// Loop per the mechanism: a `+` challenge from the server (carrying a
    /// base64 JSON error) is answered with an empty line, after which the
    /// server reports the tagged NO/BAD; a tagged OK completes.
    pub async fn authenticate(&mut self, user: &str, access_token: &str) -> Result<()> {
        if *self.state() != ConnState::NotAuthenticated {
            return Err(Error::Protocol(
                "AUTHENTICATE is only valid before authentication".to_string(),
            ));
        }

        let cmd = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial: Some(sasl::xoauth2_initial(user, access_token)),
        };
        let tag = self.next_tag();
        let segments = cmd.serialize(&tag);
        tracing::debug!(%tag, command = cmd.name(), "dispatch");

        match self.authenticate_exchange(&tag, &segments).await {
            Ok(()) => {
                self.set_state(ConnState::Authenticated);
                tracing::debug!(user, "authentication accepted");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn authenticate_exchange(&mut self, tag: &str, segments: &[Vec<u8>]) -> Result<()> {
        for segment in segments {
            self.tokenizer().send(segment).await?;
        }

        loop {
            match self.read_frame().await? {
                // Server challenge; the empty continuation line carries no
                // new tag and prompts the server to fail the exchange.
                Frame::Continuation(_) => self.tokenizer().send(b"\r\n").await?,
                Frame::Untagged(values) => self.note_capabilities(&values),
                Frame::Tagged {
                    tag: t,
                    status,
                    values,
                } => {
                    if t != tag {
                        return Err(Error::Protocol(format!(
                            "response for unknown tag {t}"
                        )));
                    }
                    return if status.is_ok() {
                        Ok(())
                    } else {
                        Err(Error::Auth(render(values.get(2..).unwrap_or_default())))
                    };
                }
            }
        }
    }

    /// Gracefully ends the session.
    ///
    /// Best-effort: the LOGOUT exchange is attempted only while the stream
    /// is still usable, its errors are swallowed, and repeated calls are
    /// no-ops. An in-progress IDLE is terminated first.
    pub async fn logout(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        if matches!(self.state(), ConnState::Idle { .. })
            && let Err(e) = self.done().await
        {
            tracing::debug!(error = %e, "DONE before logout failed");
        }

        if self.is_open() {
            match self.dispatch(&Command::Logout).await {
                Ok(reply) => tracing::debug!(text = %reply.text, "logged out"),
                Err(e) => tracing::debug!(error = %e, "logout exchange failed"),
            }
        }
        self.set_state(ConnState::LoggedOut);
        Ok(())
    }
}
