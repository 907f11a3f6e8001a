//! IMAP connection state machine.
//!
//! Owns the transport, assigns command tags, performs the synchronizing
//! literal continuation handshake, demultiplexes tagged and untagged
//! responses, and tracks the protocol state across the session lifecycle.

#![allow(clippy::missing_errors_doc)]

mod auth;
mod config;
mod folders;
mod idle;
mod messages;
mod server;
mod stream;

pub use config::{Config, ConfigBuilder, Transport};
pub use folders::{FolderInfo, MailboxSummary};
pub use idle::Notification;
pub use messages::StoreMode;
pub use server::{Quota, QuotaResource};
pub use stream::ImapStream;

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::command::{Command, TagGenerator};
use crate::parser::{self, Frame, Tokenizer, Value, render};
use crate::types::Status;
use crate::{Error, Result};

/// Frame read timeout used until the caller configures one.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Protocol state of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnState {
    /// No usable stream (never connected, or the stream failed).
    Disconnected,
    /// Stream established, greeting not yet read.
    Greeting,
    /// Greeting read; LOGIN/AUTHENTICATE required.
    NotAuthenticated,
    /// Authenticated; no mailbox selected.
    Authenticated,
    /// Mailbox selected.
    Selected(String),
    /// IDLE in progress on the selected mailbox.
    Idle {
        /// Mailbox that stays selected underneath the IDLE.
        mailbox: String,
        /// Tag of the in-flight IDLE command; DONE completes it.
        tag: String,
    },
    /// LOGOUT completed (or attempted); the connection is spent.
    LoggedOut,
}

/// Accumulated result of one dispatched command.
#[derive(Debug, Clone)]
pub struct CommandReply {
    /// Tag the command was dispatched under.
    pub tag: String,
    /// Final tagged status.
    pub status: Status,
    /// Human-readable tail of the status line.
    pub text: String,
    /// Untagged frames observed while the command was in flight, in order.
    pub untagged: Vec<Vec<Value>>,
}

impl CommandReply {
    /// Fails with [`Error::Server`] unless the status is OK.
    pub fn expect_ok(self) -> Result<Self> {
        if self.status.is_ok() {
            Ok(self)
        } else {
            Err(Error::Server {
                status: self.status,
                text: self.text,
            })
        }
    }

    /// Untagged frames whose keyword (second value) matches.
    pub(crate) fn keyword_frames<'a>(
        &'a self,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a [Value]> {
        self.untagged
            .iter()
            .filter(move |values| values.get(1).is_some_and(|v| v.is_atom(keyword)))
            .map(Vec::as_slice)
    }

    /// Numbers from untagged frames of the form `* <n> <KEYWORD>`.
    pub(crate) fn numeric_frames(&self, keyword: &str) -> Vec<u32> {
        self.untagged
            .iter()
            .filter(|values| values.get(2).is_some_and(|v| v.is_atom(keyword)))
            .filter_map(|values| values.get(1).and_then(Value::to_u32))
            .collect()
    }
}

/// An IMAP client connection.
///
/// One command is in flight at a time; every operation takes `&mut self`
/// and runs to completion before the next can start. The connection is not
/// meant to be shared between tasks.
#[derive(Debug)]
pub struct Connection<S> {
    tok: Tokenizer<S>,
    tags: TagGenerator,
    state: ConnState,
    caps: Vec<String>,
    queue: VecDeque<Notification>,
    read_timeout: Duration,
}

impl<S> Connection<S> {
    pub(crate) fn with_parts(
        tok: Tokenizer<S>,
        tags: TagGenerator,
        state: ConnState,
        caps: Vec<String>,
        queue: VecDeque<Notification>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            tok,
            tags,
            state,
            caps,
            queue,
            read_timeout,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> &ConnState {
        &self.state
    }

    /// True while the connection can still carry commands.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.state, ConnState::Disconnected | ConnState::LoggedOut)
    }

    /// Capabilities last announced by the server.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.caps
    }

    /// True if the server announced `cap` (case-insensitive).
    #[must_use]
    pub fn has_capability(&self, cap: &str) -> bool {
        self.caps.iter().any(|c| c.eq_ignore_ascii_case(cap))
    }

    /// Adjusts the per-frame read timeout.
    pub const fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream and consumes the server greeting.
    ///
    /// `* OK` lands in [`ConnState::NotAuthenticated`]; `* PREAUTH` skips
    /// straight to [`ConnState::Authenticated`]; anything else fails with
    /// [`Error::ConnectionFailed`].
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut conn = Self::with_parts(
            Tokenizer::new(stream),
            TagGenerator::new(),
            ConnState::Greeting,
            Vec::new(),
            VecDeque::new(),
            DEFAULT_READ_TIMEOUT,
        );
        conn.read_greeting().await?;
        Ok(conn)
    }

    pub(crate) async fn read_greeting(&mut self) -> Result<()> {
        let frame = self.read_frame().await.map_err(|e| match e {
            e @ (Error::Timeout(_) | Error::Closed(_)) => e,
            e => Error::ConnectionFailed(format!("greeting: {e}")),
        })?;

        let Frame::Untagged(values) = frame else {
            self.state = ConnState::Disconnected;
            return Err(Error::ConnectionFailed(
                "server did not send an untagged greeting".to_string(),
            ));
        };

        let status = values.get(1).and_then(Value::as_bytes).and_then(Status::parse);
        match status {
            Some(Status::Ok) => {
                self.note_capabilities(&values);
                self.state = ConnState::NotAuthenticated;
                tracing::debug!("greeting accepted");
                Ok(())
            }
            Some(Status::PreAuth) => {
                self.note_capabilities(&values);
                self.state = ConnState::Authenticated;
                tracing::debug!("greeting accepted (preauthenticated)");
                Ok(())
            }
            _ => {
                self.state = ConnState::Disconnected;
                Err(Error::ConnectionFailed(format!(
                    "server refused connection: {}",
                    render(values.get(1..).unwrap_or_default())
                )))
            }
        }
    }

    /// Sends one command and reads through its tagged completion.
    pub(crate) async fn dispatch(&mut self, cmd: &Command) -> Result<CommandReply> {
        if !self.is_open() {
            return Err(Error::Closed("connection is not open".to_string()));
        }

        let tag = self.tags.next();
        let segments = cmd.serialize(&tag);
        tracing::debug!(%tag, command = cmd.name(), "dispatch");

        match self.exchange(&tag, &segments).await {
            Ok(reply) => {
                tracing::trace!(%tag, status = %reply.status, "command complete");
                Ok(reply)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Writes the command segments, pausing at each literal marker for the
    /// server's `+` continuation, then accumulates responses up to the
    /// matching tagged status.
    async fn exchange(&mut self, tag: &str, segments: &[Vec<u8>]) -> Result<CommandReply> {
        let mut parts = segments.iter();
        if let Some(first) = parts.next() {
            self.tok.send(first).await?;
        }
        for part in parts {
            // The previous segment ended in `{n}`; the payload may only
            // follow an explicit go-ahead.
            match self.read_frame().await? {
                Frame::Continuation(_) => self.tok.send(part).await?,
                Frame::Tagged {
                    tag: t,
                    status,
                    values,
                } if t == tag => {
                    return Err(Error::Server {
                        status,
                        text: render(values.get(2..).unwrap_or_default()),
                    });
                }
                _ => {
                    return Err(Error::Protocol(
                        "expected continuation before literal payload".to_string(),
                    ));
                }
            }
        }

        let mut untagged = Vec::new();
        loop {
            match self.read_frame().await? {
                Frame::Untagged(values) => {
                    self.note_capabilities(&values);
                    untagged.push(values);
                }
                Frame::Continuation(_) => {
                    return Err(Error::Protocol(
                        "unexpected continuation request".to_string(),
                    ));
                }
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
                    return Ok(CommandReply {
                        tag: t,
                        status,
                        text: render(values.get(2..).unwrap_or_default()),
                        untagged,
                    });
                }
            }
        }
    }

    /// Reads one frame within the configured timeout.
    pub(crate) async fn read_frame(&mut self) -> Result<Frame> {
        match timeout(self.read_timeout, parser::read_frame(&mut self.tok)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.read_timeout)),
        }
    }

    /// Caches capabilities announced in untagged data or status codes.
    pub(crate) fn note_capabilities(&mut self, values: &[Value]) {
        if values.get(1).is_some_and(|v| v.is_atom("CAPABILITY")) {
            self.caps = atom_strings(values.get(2..).unwrap_or_default());
        } else if let Some((keyword, args)) =
            bracket_code(values.get(2..).unwrap_or_default())
            && keyword == "CAPABILITY"
        {
            self.caps = args;
        }
    }

    /// Marks the connection dead on stream-level failures.
    pub(crate) fn fail(&mut self, e: Error) -> Error {
        if e.is_fatal() {
            tracing::warn!(error = %e, "connection failed; marking disconnected");
            self.state = ConnState::Disconnected;
        }
        e
    }

    pub(crate) fn require_authenticated(&self) -> Result<()> {
        match self.state {
            ConnState::Authenticated | ConnState::Selected(_) => Ok(()),
            _ => Err(Error::Protocol(
                "command requires an authenticated connection".to_string(),
            )),
        }
    }

    pub(crate) fn require_selected(&self) -> Result<String> {
        match &self.state {
            ConnState::Selected(mailbox) => Ok(mailbox.clone()),
            _ => Err(Error::Protocol(
                "command requires a selected mailbox".to_string(),
            )),
        }
    }

    pub(crate) fn set_state(&mut self, state: ConnState) {
        self.state = state;
    }

    pub(crate) fn push_notification(&mut self, n: Notification) {
        self.queue.push_back(n);
    }

    pub(crate) fn pop_notification(&mut self) -> Option<Notification> {
        self.queue.pop_front()
    }

    pub(crate) fn drain_notifications(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }

    pub(crate) fn tokenizer(&mut self) -> &mut Tokenizer<S> {
        &mut self.tok
    }

    pub(crate) fn next_tag(&mut self) -> String {
        self.tags.next()
    }

    pub(crate) fn into_tokenizer_parts(
        self,
    ) -> (
        Tokenizer<S>,
        TagGenerator,
        ConnState,
        Vec<String>,
        VecDeque<Notification>,
        Duration,
    ) {
        (
            self.tok,
            self.tags,
            self.state,
            self.caps,
            self.queue,
            self.read_timeout,
        )
    }
}

/// Collects scalar values into strings, skipping lists.
pub(crate) fn atom_strings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_bytes)
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .collect()
}

/// Extracts a `[KEYWORD arg …]` status code from response-text values.
///
/// Status codes ride in atoms: `[UIDVALIDITY` `3857529045]`. The keyword is
/// returned uppercased with brackets stripped; arguments likewise lose the
/// closing bracket.
pub(crate) fn bracket_code(values: &[Value]) -> Option<(String, Vec<String>)> {
    let first = values.first()?.as_str()?;
    let body = first.strip_prefix('[')?;

    if let Some(keyword) = body.strip_suffix(']') {
        return Some((keyword.to_ascii_uppercase(), Vec::new()));
    }

    let keyword = body.to_ascii_uppercase();
    let mut args = Vec::new();
    for value in values.get(1..)? {
        let s = value.as_str()?;
        if let Some(last) = s.strip_suffix(']') {
            args.push(last.to_string());
            return Some((keyword, args));
        }
        args.push(s.to_string());
    }
    None
}
