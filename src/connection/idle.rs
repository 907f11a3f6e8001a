//! IDLE: server-pushed notifications (RFC 2177).

#![allow(clippy::missing_errors_doc)]

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use super::{ConnState, Connection};
use crate::command::Command;
use crate::parser::{self, Frame, Value, render};
use crate::{Error, Result};

/// One untagged update pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// New message count.
    Exists(u32),
    /// Recent message count.
    Recent(u32),
    /// A message was removed; carries its sequence number.
    Expunge(u32),
    /// Unsolicited FETCH data, typically a flag change.
    Fetch {
        /// Sequence number of the affected message.
        seq: u32,
        /// The FETCH item list as parsed values.
        items: Vec<Value>,
    },
    /// Anything else, kept as raw values.
    Other(Vec<Value>),
}

impl Notification {
    /// Classifies an untagged frame.
    #[must_use]
    pub(crate) fn from_values(values: Vec<Value>) -> Self {
        if let (Some(n), Some(keyword)) =
            (values.get(1).and_then(Value::to_u32), values.get(2))
        {
            if keyword.is_atom("EXISTS") {
                return Self::Exists(n);
            }
            if keyword.is_atom("RECENT") {
                return Self::Recent(n);
            }
            if keyword.is_atom("EXPUNGE") {
                return Self::Expunge(n);
            }
            if keyword.is_atom("FETCH") {
                let items = values
                    .get(3)
                    .and_then(Value::as_list)
                    .map(<[Value]>::to_vec)
                    .unwrap_or_default();
                return Self::Fetch { seq: n, items };
            }
        }
        Self::Other(values)
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Enters IDLE.
    ///
    /// Returns once the server grants the `+` continuation; from then on
    /// the server may push untagged updates at any time, drained with
    /// [`Self::poll`] or [`Self::next_notification`] and ended with
    /// [`Self::done`].
    pub async fn idle(&mut self) -> Result<()> {
        let mailbox = self.require_selected()?;
        let tag = self.next_tag();
        let segments = Command::Idle.serialize(&tag);
        tracing::debug!(%tag, "entering IDLE");

        if let Err(e) = self.tokenizer().send(&segments[0]).await {
            return Err(self.fail(e));
        }

        loop {
            match self.read_frame().await {
                Ok(Frame::Continuation(_)) => {
                    self.set_state(ConnState::Idle { mailbox, tag });
                    return Ok(());
                }
                // Updates racing the continuation are kept for the caller.
                Ok(Frame::Untagged(values)) => {
                    self.note_capabilities(&values);
                    self.push_notification(Notification::from_values(values));
                }
                Ok(Frame::Tagged {
                    tag: t,
                    status,
                    values,
                }) => {
                    if t == tag {
                        return Err(Error::Server {
                            status,
                            text: render(values.get(2..).unwrap_or_default()),
                        });
                    }
                    return Err(Error::Protocol(format!("response for unknown tag {t}")));
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Drains one pending notification without blocking.
    ///
    /// Returns `Ok(None)` when nothing is waiting.
    pub async fn poll(&mut self) -> Result<Option<Notification>> {
        self.require_idle()?;
        if let Some(n) = self.pop_notification() {
            return Ok(Some(n));
        }

        match timeout(Duration::ZERO, parser::read_frame(self.tokenizer())).await {
            Err(_) => Ok(None),
            Ok(Ok(frame)) => self.idle_frame(frame),
            Ok(Err(e)) => Err(self.fail(e)),
        }
    }

    /// Blocks until the server pushes a notification.
    ///
    /// A read timeout surfaces as [`Error::Timeout`] without tearing the
    /// connection down; callers that need periodic wakeups set a read
    /// timeout and treat it as a retry signal.
    pub async fn next_notification(&mut self) -> Result<Notification> {
        self.require_idle()?;
        if let Some(n) = self.pop_notification() {
            return Ok(n);
        }

        loop {
            match self.read_frame().await {
                Ok(frame) => {
                    if let Some(n) = self.idle_frame(frame)? {
                        return Ok(n);
                    }
                    if !matches!(self.state(), ConnState::Idle { .. }) {
                        return Err(Error::Protocol(
                            "server terminated IDLE".to_string(),
                        ));
                    }
                }
                Err(e @ Error::Timeout(_)) => return Err(e),
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Ends IDLE: writes `DONE` and reads through the tagged completion.
    ///
    /// Untagged lines interleaved with the termination are preserved and
    /// returned along with anything already queued; servers commonly slip
    /// EXISTS/EXPUNGE between `DONE` and the tagged OK.
    pub async fn done(&mut self) -> Result<Vec<Notification>> {
        let ConnState::Idle { mailbox, tag } = self.state().clone() else {
            return Err(Error::Protocol("DONE is only valid while idling".to_string()));
        };

        let segments = Command::Done.serialize("");
        if let Err(e) = self.tokenizer().send(&segments[0]).await {
            return Err(self.fail(e));
        }

        let mut drained = self.drain_notifications();
        loop {
            match self.read_frame().await {
                Ok(Frame::Untagged(values)) => {
                    drained.push(Notification::from_values(values));
                }
                Ok(Frame::Tagged {
                    tag: t,
                    status,
                    values,
                }) => {
                    if t != tag {
                        return Err(Error::Protocol(format!("response for unknown tag {t}")));
                    }
                    if status.is_ok() {
                        self.set_state(ConnState::Selected(mailbox));
                        tracing::debug!(count = drained.len(), "IDLE terminated");
                        return Ok(drained);
                    }
                    return Err(Error::Server {
                        status,
                        text: render(values.get(2..).unwrap_or_default()),
                    });
                }
                Ok(Frame::Continuation(_)) => {
                    return Err(Error::Protocol(
                        "unexpected continuation after DONE".to_string(),
                    ));
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    fn require_idle(&self) -> Result<()> {
        match self.state() {
            ConnState::Idle { .. } => Ok(()),
            _ => Err(Error::Protocol(
                "notifications are only available while idling".to_string(),
            )),
        }
    }

    /// Handles a frame read while idling.
    ///
    /// A tagged OK for the IDLE tag means the server ended the IDLE on its
    /// own (allowed, if unusual); the connection quietly returns to the
    /// selected state.
    fn idle_frame(&mut self, frame: Frame) -> Result<Option<Notification>> {
        match frame {
            Frame::Untagged(values) => {
                self.note_capabilities(&values);
                Ok(Some(Notification::from_values(values)))
            }
            Frame::Tagged {
                tag: t,
                status,
                values,
            } => {
                let ConnState::Idle { mailbox, tag } = self.state().clone() else {
                    return Err(Error::Protocol("tagged response outside IDLE".to_string()));
                };
                if t != tag {
                    return Err(Error::Protocol(format!("response for unknown tag {t}")));
                }
                if status.is_ok() {
                    self.set_state(ConnState::Selected(mailbox));
                    Ok(None)
                } else {
                    Err(Error::Server {
                        status,
                        text: render(values.get(2..).unwrap_or_default()),
                    })
                }
            }
            Frame::Continuation(_) => Err(Error::Protocol(
                "unexpected continuation during IDLE".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    async fn idling(
        script: impl FnOnce(&mut Builder) -> &mut Builder,
    ) -> Connection<tokio_test::io::Mock> {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"TAG1 LOGIN joe secret\r\n")
            .read(b"TAG1 OK logged in\r\n")
            .write(b"TAG2 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\nTAG2 OK selected\r\n")
            .write(b"TAG3 IDLE\r\n");
        script(&mut builder);
        let mut conn = Connection::from_stream(builder.build()).await.unwrap();
        conn.login("joe", "secret").await.unwrap();
        conn.select_folder("INBOX").await.unwrap();
        conn
    }

    #[tokio::test]
    async fn idle_enters_on_continuation() {
        let mut conn = idling(|b| b.read(b"+ idling\r\n")).await;
        conn.idle().await.unwrap();
        assert!(matches!(conn.state(), ConnState::Idle { .. }));
    }

    #[tokio::test]
    async fn idle_rejection_is_server_error() {
        let mut conn = idling(|b| b.read(b"TAG3 BAD IDLE not supported\r\n")).await;
        let err = conn.idle().await.unwrap_err();
        assert!(matches!(err, Error::Server { .. }));
    }

    #[tokio::test]
    async fn notifications_flow_during_idle() {
        let mut conn = idling(|b| {
            b.read(b"+ idling\r\n")
                .read(b"* 4 EXISTS\r\n")
                .read(b"* 1 EXPUNGE\r\n")
        })
        .await;

        conn.idle().await.unwrap();
        assert_eq!(
            conn.next_notification().await.unwrap(),
            Notification::Exists(4)
        );
        assert_eq!(
            conn.next_notification().await.unwrap(),
            Notification::Expunge(1)
        );
    }

    #[tokio::test]
    async fn updates_racing_the_continuation_are_queued() {
        let mut conn = idling(|b| b.read(b"* 4 EXISTS\r\n+ idling\r\n")).await;
        conn.idle().await.unwrap();
        assert_eq!(conn.poll().await.unwrap(), Some(Notification::Exists(4)));
    }

    #[tokio::test]
    async fn done_preserves_interleaved_untagged_lines() {
        let mut conn = idling(|b| {
            b.read(b"+ idling\r\n")
                .write(b"DONE\r\n")
                .read(b"* 5 EXISTS\r\n* 2 EXPUNGE\r\nTAG3 OK IDLE terminated\r\n")
        })
        .await;

        conn.idle().await.unwrap();
        let drained = conn.done().await.unwrap();
        assert_eq!(
            drained,
            vec![Notification::Exists(5), Notification::Expunge(2)]
        );
        assert_eq!(*conn.state(), ConnState::Selected("INBOX".to_string()));
    }

    #[tokio::test]
    async fn done_outside_idle_is_rejected() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut conn = Connection::from_stream(mock).await.unwrap();
        let err = conn.done().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn next_notification_timeout_does_not_taint() {
        let mut conn = idling(|b| {
            b.read(b"+ idling\r\n")
                .wait(Duration::from_secs(3600))
        })
        .await;

        conn.idle().await.unwrap();
        conn.set_read_timeout(Duration::from_secs(1));
        let err = conn.next_notification().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        // Timeout while idling is a retry signal, not a dead stream.
        assert!(matches!(conn.state(), ConnState::Idle { .. }));
    }

    #[tokio::test]
    async fn fetch_notification_carries_items() {
        let mut conn = idling(|b| {
            b.read(b"+ idling\r\n")
                .read(b"* 2 FETCH (FLAGS (\\Seen))\r\n")
        })
        .await;

        conn.idle().await.unwrap();
        match conn.next_notification().await.unwrap() {
            Notification::Fetch { seq, items } => {
                assert_eq!(seq, 2);
                assert!(items[1].as_list().is_some());
            }
            other => panic!("expected fetch notification, got {other:?}"),
        }
    }
}
