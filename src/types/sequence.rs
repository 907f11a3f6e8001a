//! Message and UID range sets.

/// Upper bound of a range: a concrete id or `*` (highest in the mailbox).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// A concrete message id.
    Num(u32),
    /// The `*` wildcard.
    Star,
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Star => f.write_str("*"),
        }
    }
}

/// A message set in the wire forms `n`, `n:m`, `n:*`, or `a,b,c`.
///
/// The same set type addresses either sequence numbers or UIDs; which one is
/// decided by the [`IdMode`](crate::IdMode) of the command it is used with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeqSet {
    /// A single id.
    Single(u32),
    /// An inclusive range, possibly open-ended (`n:*`).
    Range(u32, Bound),
    /// An explicit enumeration (`a,b,c`).
    List(Vec<u32>),
}

impl SeqSet {
    /// Set containing one id.
    #[must_use]
    pub const fn single(id: u32) -> Self {
        Self::Single(id)
    }

    /// Inclusive range from `from` to `to`.
    #[must_use]
    pub const fn range(from: u32, to: Bound) -> Self {
        Self::Range(from, to)
    }

    /// Open-ended range covering `from` through the end of the mailbox.
    #[must_use]
    pub const fn starting_at(from: u32) -> Self {
        Self::Range(from, Bound::Star)
    }

    /// Enumerated set. A one-element slice collapses to the `n:n` range form.
    #[must_use]
    pub fn list(ids: &[u32]) -> Self {
        match ids {
            [id] => Self::Range(*id, Bound::Num(*id)),
            _ => Self::List(ids.to_vec()),
        }
    }

    /// The single id this set targets, if it targets exactly one.
    #[must_use]
    pub fn single_id(&self) -> Option<u32> {
        match self {
            Self::Single(n) => Some(*n),
            Self::Range(from, Bound::Num(to)) if from == to => Some(*from),
            Self::List(ids) if ids.len() == 1 => ids.first().copied(),
            _ => None,
        }
    }
}

impl std::fmt::Display for SeqSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(from, to) => write!(f, "{from}:{to}"),
            Self::List(ids) => {
                let parts: Vec<_> = ids.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

impl From<u32> for SeqSet {
    fn from(id: u32) -> Self {
        Self::Single(id)
    }
}
