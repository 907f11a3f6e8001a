//! IMAP command types and wire serialization.

mod encode;
mod tag;

pub use tag::TagGenerator;

use encode::WireWriter;

use crate::types::{IdMode, SeqSet};

/// One IMAP command.
///
/// Serialization produces wire segments: a command without literals is a
/// single CRLF-terminated line; arguments that demand a synchronizing
/// literal split the output, and the connection interleaves the segments
/// with server `+` continuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// ID command (RFC 2971); `None` sends `ID NIL`.
    Id {
        /// Client identification field/value pairs.
        params: Option<Vec<(String, String)>>,
    },

    // Not authenticated
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
        /// Optional initial response (already base64-encoded).
        initial: Option<String>,
    },

    // Authenticated
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: String,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: String,
    },
    /// RENAME command.
    Rename {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Mailbox to subscribe to.
        mailbox: String,
    },
    /// UNSUBSCRIBE command.
    Unsubscribe {
        /// Mailbox to unsubscribe from.
        mailbox: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox to query.
        mailbox: String,
        /// Attributes to request (MESSAGES, UIDNEXT, …).
        attrs: Vec<String>,
    },
    /// APPEND command; the message always goes out as a literal.
    Append {
        /// Target mailbox.
        mailbox: String,
        /// Optional flag list.
        flags: Option<Vec<String>>,
        /// Optional internal date (quoted date-time).
        date: Option<String>,
        /// Full message bytes.
        message: Vec<u8>,
    },
    /// GETQUOTA command (RFC 2087).
    GetQuota {
        /// Quota root to query.
        root: String,
    },
    /// GETQUOTAROOT command (RFC 2087).
    GetQuotaRoot {
        /// Mailbox whose quota roots are queried.
        mailbox: String,
    },

    // Selected
    /// CLOSE command.
    Close,
    /// UNSELECT command.
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315 UIDPLUS): expunge specific UIDs.
    UidExpunge {
        /// UIDs to expunge.
        set: SeqSet,
    },
    /// SEARCH command; criteria are passed through verbatim.
    Search {
        /// Raw search criteria, e.g. `UNSEEN SINCE 1-Feb-2024`.
        query: String,
        /// UID or sequence-number addressing.
        mode: IdMode,
    },
    /// FETCH command.
    Fetch {
        /// Messages to fetch.
        set: SeqSet,
        /// Data item names.
        items: Vec<String>,
        /// UID or sequence-number addressing.
        mode: IdMode,
    },
    /// STORE command.
    Store {
        /// Messages to modify.
        set: SeqSet,
        /// Data item, e.g. `+FLAGS` or `FLAGS.SILENT`.
        item: String,
        /// Flags to apply.
        flags: Vec<String>,
        /// UID or sequence-number addressing.
        mode: IdMode,
    },
    /// COPY command.
    Copy {
        /// Messages to copy.
        set: SeqSet,
        /// Destination mailbox.
        mailbox: String,
        /// UID or sequence-number addressing.
        mode: IdMode,
    },
    /// MOVE command (RFC 6851).
    Move {
        /// Messages to move.
        set: SeqSet,
        /// Destination mailbox.
        mailbox: String,
        /// UID or sequence-number addressing.
        mode: IdMode,
    },
    /// IDLE command (RFC 2177).
    Idle,
    /// DONE line ending an IDLE; carries no tag.
    Done,
}

impl Command {
    /// Keyword used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Id { .. } => "ID",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::GetQuota { .. } => "GETQUOTA",
            Self::GetQuotaRoot { .. } => "GETQUOTAROOT",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Move { .. } => "MOVE",
            Self::Idle => "IDLE",
            Self::Done => "DONE",
        }
    }

    /// Serializes the command under the given tag.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn serialize(&self, tag: &str) -> Vec<Vec<u8>> {
        let mut w = WireWriter::new();

        // DONE is the one untagged line the client sends.
        if !matches!(self, Self::Done) {
            w.raw(tag);
            w.space();
        }

        match self {
            Self::Capability => w.raw("CAPABILITY"),
            Self::Noop => w.raw("NOOP"),
            Self::Logout => w.raw("LOGOUT"),
            Self::StartTls => w.raw("STARTTLS"),
            Self::Close => w.raw("CLOSE"),
            Self::Unselect => w.raw("UNSELECT"),
            Self::Expunge => w.raw("EXPUNGE"),
            Self::Idle => w.raw("IDLE"),
            Self::Done => w.raw("DONE"),

            Self::Login { username, password } => {
                w.raw("LOGIN ");
                w.astring(username.as_bytes());
                w.space();
                w.astring(password.as_bytes());
            }

            Self::Authenticate { mechanism, initial } => {
                w.raw("AUTHENTICATE ");
                w.raw(mechanism);
                if let Some(initial) = initial {
                    w.space();
                    w.raw(initial);
                }
            }

            Self::Id { params } => {
                w.raw("ID ");
                match params {
                    Some(params) => {
                        w.raw("(");
                        for (i, (key, value)) in params.iter().enumerate() {
                            if i > 0 {
                                w.space();
                            }
                            w.astring(key.as_bytes());
                            w.space();
                            w.astring(value.as_bytes());
                        }
                        w.raw(")");
                    }
                    None => w.raw("NIL"),
                }
            }

            Self::Select { mailbox } => {
                w.raw("SELECT ");
                w.astring(mailbox.as_bytes());
            }
            Self::Examine { mailbox } => {
                w.raw("EXAMINE ");
                w.astring(mailbox.as_bytes());
            }
            Self::Create { mailbox } => {
                w.raw("CREATE ");
                w.astring(mailbox.as_bytes());
            }
            Self::Delete { mailbox } => {
                w.raw("DELETE ");
                w.astring(mailbox.as_bytes());
            }
            Self::Rename { from, to } => {
                w.raw("RENAME ");
                w.astring(from.as_bytes());
                w.space();
                w.astring(to.as_bytes());
            }
            Self::Subscribe { mailbox } => {
                w.raw("SUBSCRIBE ");
                w.astring(mailbox.as_bytes());
            }
            Self::Unsubscribe { mailbox } => {
                w.raw("UNSUBSCRIBE ");
                w.astring(mailbox.as_bytes());
            }

            Self::List { reference, pattern } => {
                w.raw("LIST ");
                w.astring(reference.as_bytes());
                w.space();
                w.astring(pattern.as_bytes());
            }

            Self::Status { mailbox, attrs } => {
                w.raw("STATUS ");
                w.astring(mailbox.as_bytes());
                w.space();
                w.atom_list(attrs);
            }

            Self::Append {
                mailbox,
                flags,
                date,
                message,
            } => {
                w.raw("APPEND ");
                w.astring(mailbox.as_bytes());
                if let Some(flags) = flags {
                    w.space();
                    w.atom_list(flags);
                }
                if let Some(date) = date {
                    w.space();
                    w.quoted(date.as_bytes());
                }
                w.space();
                w.literal(message);
            }

            Self::UidExpunge { set } => {
                w.raw("UID EXPUNGE ");
                w.seq_set(set);
            }

            Self::GetQuota { root } => {
                w.raw("GETQUOTA ");
                w.astring(root.as_bytes());
            }
            Self::GetQuotaRoot { mailbox } => {
                w.raw("GETQUOTAROOT ");
                w.astring(mailbox.as_bytes());
            }

            Self::Search { query, mode } => {
                w.raw(mode.prefix());
                w.raw("SEARCH ");
                w.raw(query);
            }

            Self::Fetch { set, items, mode } => {
                w.raw(mode.prefix());
                w.raw("FETCH ");
                w.seq_set(set);
                w.space();
                if let [item] = items.as_slice() {
                    w.raw(item);
                } else {
                    w.atom_list(items);
                }
            }

            Self::Store {
                set,
                item,
                flags,
                mode,
            } => {
                w.raw(mode.prefix());
                w.raw("STORE ");
                w.seq_set(set);
                w.space();
                w.raw(item);
                w.space();
                w.atom_list(flags);
            }

            Self::Copy { set, mailbox, mode } => {
                w.raw(mode.prefix());
                w.raw("COPY ");
                w.seq_set(set);
                w.space();
                w.astring(mailbox.as_bytes());
            }

            Self::Move { set, mailbox, mode } => {
                w.raw(mode.prefix());
                w.raw("MOVE ");
                w.seq_set(set);
                w.space();
                w.astring(mailbox.as_bytes());
            }
        }

        w.finish()
    }
}
