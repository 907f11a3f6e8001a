//! Mailbox operations: select/examine, status, listing, and maintenance.

#![allow(clippy::missing_errors_doc)]

use std::collections::BTreeMap;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{CommandReply, ConnState, Connection, atom_strings, bracket_code};
use crate::command::Command;
use crate::parser::{Value, render};
use crate::types::Status;
use crate::{Error, Result};

/// Accumulated untagged data from a SELECT or EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxSummary {
    /// Flags defined in the mailbox.
    pub flags: Vec<String>,
    /// Number of messages.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// UIDVALIDITY value, when announced.
    pub uid_validity: Option<u32>,
    /// Predicted next UID, when announced.
    pub uid_next: Option<u32>,
    /// First unseen message number, when announced.
    pub unseen: Option<u32>,
}

/// One entry from a LIST response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderInfo {
    /// Name attributes (`\HasChildren`, `\Noselect`, …).
    pub attributes: Vec<String>,
    /// Hierarchy delimiter; `None` when the mailbox is flat (NIL).
    pub delimiter: Option<String>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Selects a mailbox read-write and returns its summary.
    pub async fn select_folder(&mut self, name: &str) -> Result<MailboxSummary> {
        let cmd = Command::Select {
            mailbox: name.to_string(),
        };
        self.open_folder(name, &cmd).await
    }

    /// Opens a mailbox read-only and returns its summary.
    pub async fn examine_folder(&mut self, name: &str) -> Result<MailboxSummary> {
        let cmd = Command::Examine {
            mailbox: name.to_string(),
        };
        self.open_folder(name, &cmd).await
    }

    async fn open_folder(&mut self, name: &str, cmd: &Command) -> Result<MailboxSummary> {
        self.require_authenticated()?;
        let reply = self.dispatch(cmd).await?.expect_ok()?;
        let summary = summarize(&reply)?;
        self.set_state(ConnState::Selected(name.to_string()));
        tracing::debug!(mailbox = name, exists = summary.exists, "mailbox opened");
        Ok(summary)
    }

    /// Closes the selected mailbox, expunging deleted messages.
    pub async fn close_folder(&mut self) -> Result<()> {
        self.require_selected()?;
        self.dispatch(&Command::Close).await?.expect_ok()?;
        self.set_state(ConnState::Authenticated);
        Ok(())
    }

    /// Deselects the mailbox without expunging (RFC 3691).
    pub async fn unselect_folder(&mut self) -> Result<()> {
        self.require_selected()?;
        self.dispatch(&Command::Unselect).await?.expect_ok()?;
        self.set_state(ConnState::Authenticated);
        Ok(())
    }

    /// Queries mailbox status attributes without selecting it.
    ///
    /// Keys are lowercased attribute names; values are the reported
    /// integers.
    pub async fn folder_status(
        &mut self,
        name: &str,
        attrs: &[&str],
    ) -> Result<BTreeMap<String, u64>> {
        self.require_authenticated()?;
        let cmd = Command::Status {
            mailbox: name.to_string(),
            attrs: attrs.iter().map(ToString::to_string).collect(),
        };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;

        let mut out = BTreeMap::new();
        for frame in reply.keyword_frames("STATUS") {
            // * STATUS <mailbox> (KEY1 VAL1 KEY2 VAL2 …)
            let Some(items) = frame.get(3).and_then(Value::as_list) else {
                continue;
            };
            for pair in items.chunks(2) {
                if let [key, value] = pair
                    && let Some(key) = key.as_str()
                    && let Some(n) = value.as_str().and_then(|s| s.parse().ok())
                {
                    out.insert(key.to_ascii_lowercase(), n);
                }
            }
        }
        Ok(out)
    }

    /// Lists mailboxes matching `pattern` under `reference`.
    pub async fn list_folders(
        &mut self,
        reference: &str,
        pattern: &str,
    ) -> Result<BTreeMap<String, FolderInfo>> {
        self.require_authenticated()?;
        let cmd = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;

        let mut out = BTreeMap::new();
        for frame in reply.keyword_frames("LIST") {
            // * LIST (<attributes>) "<delimiter>" <name>
            let attributes = frame
                .get(2)
                .and_then(Value::as_list)
                .map(atom_strings)
                .unwrap_or_default();
            let delimiter = frame.get(3).and_then(|v| match v {
                Value::String(b) => Some(String::from_utf8_lossy(b).into_owned()),
                _ => None, // NIL atom
            });
            let Some(name) = frame
                .get(4)
                .and_then(Value::as_bytes)
                .map(|b| String::from_utf8_lossy(b).into_owned())
            else {
                continue;
            };
            out.insert(
                name,
                FolderInfo {
                    attributes,
                    delimiter,
                },
            );
        }
        Ok(out)
    }

    /// Creates a mailbox.
    pub async fn create_folder(&mut self, name: &str) -> Result<()> {
        self.require_authenticated()?;
        let cmd = Command::Create {
            mailbox: name.to_string(),
        };
        self.dispatch(&cmd).await?.expect_ok().map(drop)
    }

    /// Renames a mailbox.
    pub async fn rename_folder(&mut self, from: &str, to: &str) -> Result<()> {
        self.require_authenticated()?;
        let cmd = Command::Rename {
            from: from.to_string(),
            to: to.to_string(),
        };
        self.dispatch(&cmd).await?.expect_ok().map(drop)
    }

    /// Deletes a mailbox.
    pub async fn delete_folder(&mut self, name: &str) -> Result<()> {
        self.require_authenticated()?;
        let cmd = Command::Delete {
            mailbox: name.to_string(),
        };
        self.dispatch(&cmd).await?.expect_ok().map(drop)
    }

    /// Adds a mailbox to the subscription list.
    pub async fn subscribe_folder(&mut self, name: &str) -> Result<()> {
        self.require_authenticated()?;
        let cmd = Command::Subscribe {
            mailbox: name.to_string(),
        };
        self.dispatch(&cmd).await?.expect_ok().map(drop)
    }

    /// Removes a mailbox from the subscription list.
    pub async fn unsubscribe_folder(&mut self, name: &str) -> Result<()> {
        self.require_authenticated()?;
        let cmd = Command::Unsubscribe {
            mailbox: name.to_string(),
        };
        self.dispatch(&cmd).await?.expect_ok().map(drop)
    }
}

/// Builds the SELECT/EXAMINE summary from the accumulated untagged frames.
///
/// The `* OK [CODE …]` lines are dispatched through a single table keyed on
/// the status-code keyword.
fn summarize(reply: &CommandReply) -> Result<MailboxSummary> {
    let mut summary = MailboxSummary::default();

    for frame in &reply.untagged {
        // * <n> EXISTS / RECENT
        if let (Some(n), Some(keyword)) = (
            frame.get(1).and_then(Value::to_u32),
            frame.get(2),
        ) {
            if keyword.is_atom("EXISTS") {
                summary.exists = n;
                continue;
            }
            if keyword.is_atom("RECENT") {
                summary.recent = n;
                continue;
            }
        }

        // * FLAGS (…)
        if frame.get(1).is_some_and(|v| v.is_atom("FLAGS")) {
            if let Some(flags) = frame.get(2).and_then(Value::as_list) {
                summary.flags = atom_strings(flags);
            }
            continue;
        }

        // * OK [CODE arg] …
        let Some((keyword, args)) = bracket_code(frame.get(2..).unwrap_or_default()) else {
            continue;
        };
        let arg = args.first().and_then(|s| s.parse().ok());
        match keyword.as_str() {
            "UIDVALIDITY" => summary.uid_validity = arg,
            "UIDNEXT" => summary.uid_next = arg,
            "UNSEEN" => summary.unseen = arg,
            "NONEXISTENT" => {
                return Err(Error::Server {
                    status: Status::No,
                    text: render(frame.get(2..).unwrap_or_default()),
                });
            }
            _ => {}
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    async fn authenticated(
        script: impl FnOnce(&mut Builder) -> &mut Builder,
    ) -> Connection<tokio_test::io::Mock> {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"TAG1 LOGIN joe secret\r\n")
            .read(b"TAG1 OK logged in\r\n");
        script(&mut builder);
        let mut conn = Connection::from_stream(builder.build()).await.unwrap();
        conn.login("joe", "secret").await.unwrap();
        conn
    }

    #[tokio::test]
    async fn select_accumulates_summary() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 SELECT INBOX\r\n").read(
                b"* FLAGS (\\Answered \\Seen)\r\n\
                  * 172 EXISTS\r\n\
                  * 1 RECENT\r\n\
                  * OK [UNSEEN 12] Message 12 is first unseen\r\n\
                  * OK [UIDVALIDITY 3857529045] UIDs valid\r\n\
                  * OK [UIDNEXT 4392] Predicted next UID\r\n\
                  TAG2 OK [READ-WRITE] SELECT completed\r\n",
            )
        })
        .await;

        let summary = conn.select_folder("INBOX").await.unwrap();
        assert_eq!(summary.exists, 172);
        assert_eq!(summary.recent, 1);
        assert_eq!(summary.unseen, Some(12));
        assert_eq!(summary.uid_validity, Some(3_857_529_045));
        assert_eq!(summary.uid_next, Some(4392));
        assert_eq!(
            summary.flags,
            vec!["\\Answered".to_string(), "\\Seen".to_string()]
        );
        assert_eq!(*conn.state(), ConnState::Selected("INBOX".to_string()));
    }

    #[tokio::test]
    async fn select_nonexistent_code_is_an_error() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 SELECT Missing\r\n").read(
                b"* OK [NONEXISTENT] No such mailbox\r\nTAG2 OK opened anyway\r\n",
            )
        })
        .await;

        let err = conn.select_folder("Missing").await.unwrap_err();
        assert!(matches!(err, Error::Server { .. }));
    }

    #[tokio::test]
    async fn select_rejection_keeps_authenticated_state() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 SELECT Secret\r\n")
                .read(b"TAG2 NO access denied\r\n")
        })
        .await;

        let err = conn.select_folder("Secret").await.unwrap_err();
        assert!(matches!(err, Error::Server { .. }));
        assert_eq!(*conn.state(), ConnState::Authenticated);
    }

    #[tokio::test]
    async fn close_returns_to_authenticated() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 SELECT INBOX\r\n")
                .read(b"* 1 EXISTS\r\nTAG2 OK selected\r\n")
                .write(b"TAG3 CLOSE\r\n")
                .read(b"TAG3 OK closed\r\n")
        })
        .await;

        conn.select_folder("INBOX").await.unwrap();
        conn.close_folder().await.unwrap();
        assert_eq!(*conn.state(), ConnState::Authenticated);
    }

    #[tokio::test]
    async fn folder_status_lowercases_keys() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 STATUS Archive (MESSAGES UNSEEN UIDNEXT)\r\n")
                .read(b"* STATUS Archive (MESSAGES 231 UNSEEN 3 UIDNEXT 44292)\r\nTAG2 OK done\r\n")
        })
        .await;

        let status = conn
            .folder_status("Archive", &["MESSAGES", "UNSEEN", "UIDNEXT"])
            .await
            .unwrap();
        assert_eq!(status.get("messages"), Some(&231));
        assert_eq!(status.get("unseen"), Some(&3));
        assert_eq!(status.get("uidnext"), Some(&44292));
    }

    #[tokio::test]
    async fn list_folders_maps_names_to_info() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 LIST \"\" \"*\"\r\n").read(
                b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
                  * LIST (\\Noselect \\HasChildren) \"/\" \"[Gmail]\"\r\n\
                  * LIST (\\HasNoChildren) NIL {13}\r\nSpecial\"Chars\r\n\
                  TAG2 OK done\r\n",
            )
        })
        .await;

        let folders = conn.list_folders("", "*").await.unwrap();
        assert_eq!(folders.len(), 3);

        let inbox = &folders["INBOX"];
        assert_eq!(inbox.delimiter.as_deref(), Some("/"));
        assert_eq!(inbox.attributes, vec!["\\HasNoChildren".to_string()]);

        let gmail = &folders["[Gmail]"];
        assert_eq!(
            gmail.attributes,
            vec!["\\Noselect".to_string(), "\\HasChildren".to_string()]
        );

        // Literal-delivered name with an embedded quote, delimiter NIL.
        let odd = &folders["Special\"Chars"];
        assert_eq!(odd.delimiter, None);
    }

    #[tokio::test]
    async fn folder_maintenance_commands() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 CREATE \"Projects 2024\"\r\n")
                .read(b"TAG2 OK created\r\n")
                .write(b"TAG3 RENAME \"Projects 2024\" Archive\r\n")
                .read(b"TAG3 OK renamed\r\n")
                .write(b"TAG4 SUBSCRIBE Archive\r\n")
                .read(b"TAG4 OK subscribed\r\n")
                .write(b"TAG5 UNSUBSCRIBE Archive\r\n")
                .read(b"TAG5 OK unsubscribed\r\n")
                .write(b"TAG6 DELETE Archive\r\n")
                .read(b"TAG6 OK deleted\r\n")
        })
        .await;

        conn.create_folder("Projects 2024").await.unwrap();
        conn.rename_folder("Projects 2024", "Archive").await.unwrap();
        conn.subscribe_folder("Archive").await.unwrap();
        conn.unsubscribe_folder("Archive").await.unwrap();
        conn.delete_folder("Archive").await.unwrap();
    }

    #[tokio::test]
    async fn folder_ops_require_authentication() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut conn = Connection::from_stream(mock).await.unwrap();
        let err = conn.list_folders("", "*").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
