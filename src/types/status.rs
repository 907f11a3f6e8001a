//! Status keywords and the id-mode selector.

/// Condition a tagged (or untagged status) response reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed for an operational reason.
    No,
    /// Command was syntactically or semantically invalid.
    Bad,
    /// Server is about to close the connection.
    Bye,
    /// Greeting-only: the connection starts already authenticated.
    PreAuth,
}

impl Status {
    /// Parses a status keyword, case-insensitively.
    #[must_use]
    pub fn parse(atom: &[u8]) -> Option<Self> {
        match atom.to_ascii_uppercase().as_slice() {
            b"OK" => Some(Self::Ok),
            b"NO" => Some(Self::No),
            b"BAD" => Some(Self::Bad),
            b"BYE" => Some(Self::Bye),
            b"PREAUTH" => Some(Self::PreAuth),
            _ => None,
        }
    }

    /// Returns true for statuses that complete a command successfully.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::Bye => "BYE",
            Self::PreAuth => "PREAUTH",
        };
        f.write_str(s)
    }
}

/// Selector for how messages are addressed in id-bearing commands.
///
/// `Uid` (the default) prefixes commands with `UID ` and keys results by the
/// persistent UID, which stays stable across sessions and tolerates server
/// expunges. `Msgn` uses ephemeral 1-based sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdMode {
    /// Address messages by persistent UID.
    #[default]
    Uid,
    /// Address messages by mailbox sequence number.
    Msgn,
}

impl IdMode {
    /// Command prefix for this mode.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Uid => "UID ",
            Self::Msgn => "",
        }
    }
}
