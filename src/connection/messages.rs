//! Message operations: fetch, store, append, copy/move, search, expunge.

#![allow(clippy::missing_errors_doc)]

use std::collections::BTreeMap;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{CommandReply, Connection};
use crate::Result;
use crate::command::Command;
use crate::parser::{Value, render};
use crate::types::{IdMode, SeqSet};

/// How STORE combines the given flags with the existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Replace the flag list (`FLAGS`).
    Replace,
    /// Add to the flag list (`+FLAGS`).
    Add,
    /// Remove from the flag list (`-FLAGS`).
    Remove,
}

impl StoreMode {
    fn item(self, silent: bool) -> String {
        let base = match self {
            Self::Replace => "FLAGS",
            Self::Add => "+FLAGS",
            Self::Remove => "-FLAGS",
        };
        if silent {
            format!("{base}.SILENT")
        } else {
            base.to_string()
        }
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Fetches `items` for the messages in `set`.
    ///
    /// Returns a map keyed by UID ([`IdMode::Uid`]) or sequence number
    /// ([`IdMode::Msgn`]); each entry maps uppercased item names to their
    /// values. Header and body payloads come back as opaque byte strings.
    pub async fn fetch(
        &mut self,
        items: &[&str],
        set: &SeqSet,
        mode: IdMode,
    ) -> Result<BTreeMap<u32, BTreeMap<String, Value>>> {
        self.require_selected()?;
        let cmd = Command::Fetch {
            set: set.clone(),
            items: items.iter().map(ToString::to_string).collect(),
            mode,
        };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;
        Ok(collect_fetch(&reply, set, mode))
    }

    /// Fetches full raw message content (`RFC822`).
    pub async fn content(&mut self, set: &SeqSet, mode: IdMode) -> Result<BTreeMap<u32, Value>> {
        self.fetch_one("RFC822", set, mode).await
    }

    /// Fetches raw message headers (`RFC822.HEADER`).
    pub async fn headers(&mut self, set: &SeqSet, mode: IdMode) -> Result<BTreeMap<u32, Value>> {
        self.fetch_one("RFC822.HEADER", set, mode).await
    }

    /// Fetches message flag lists.
    pub async fn flags(&mut self, set: &SeqSet, mode: IdMode) -> Result<BTreeMap<u32, Value>> {
        self.fetch_one("FLAGS", set, mode).await
    }

    /// Fetches message sizes in bytes (`RFC822.SIZE`).
    pub async fn sizes(&mut self, set: &SeqSet, mode: IdMode) -> Result<BTreeMap<u32, u32>> {
        let map = self.fetch_one("RFC822.SIZE", set, mode).await?;
        Ok(map
            .into_iter()
            .filter_map(|(id, value)| value.to_u32().map(|n| (id, n)))
            .collect())
    }

    async fn fetch_one(
        &mut self,
        item: &str,
        set: &SeqSet,
        mode: IdMode,
    ) -> Result<BTreeMap<u32, Value>> {
        let key = item.to_ascii_uppercase();
        let map = self.fetch(&[item], set, mode).await?;
        Ok(map
            .into_iter()
            .filter_map(|(id, mut items)| items.remove(&key).map(|value| (id, value)))
            .collect())
    }

    /// Applies a flag change to the messages in `set`.
    ///
    /// Unless `silent`, returns the updated flag list per message id.
    pub async fn store(
        &mut self,
        mode: StoreMode,
        flags: &[&str],
        set: &SeqSet,
        id_mode: IdMode,
        silent: bool,
    ) -> Result<BTreeMap<u32, Value>> {
        self.require_selected()?;
        let cmd = Command::Store {
            set: set.clone(),
            item: mode.item(silent),
            flags: flags.iter().map(ToString::to_string).collect(),
            mode: id_mode,
        };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;
        if silent {
            return Ok(BTreeMap::new());
        }
        Ok(collect_fetch(&reply, set, id_mode)
            .into_iter()
            .filter_map(|(id, mut items)| items.remove("FLAGS").map(|value| (id, value)))
            .collect())
    }

    /// Appends a complete message to a mailbox.
    ///
    /// The message always travels as a synchronizing literal: the command
    /// line ends with `{n}`, and the payload is only written after the
    /// server's `+` go-ahead.
    pub async fn append(
        &mut self,
        folder: &str,
        message: &[u8],
        flags: Option<&[&str]>,
        date: Option<&str>,
    ) -> Result<()> {
        self.require_authenticated()?;
        let cmd = Command::Append {
            mailbox: folder.to_string(),
            flags: flags.map(|f| f.iter().map(ToString::to_string).collect()),
            date: date.map(ToString::to_string),
            message: message.to_vec(),
        };
        self.dispatch(&cmd).await?.expect_ok().map(drop)
    }

    /// Copies messages to another mailbox.
    pub async fn copy(&mut self, folder: &str, set: &SeqSet, mode: IdMode) -> Result<()> {
        self.require_selected()?;
        let cmd = Command::Copy {
            set: set.clone(),
            mailbox: folder.to_string(),
            mode,
        };
        self.dispatch(&cmd).await?.expect_ok().map(drop)
    }

    /// Moves messages to another mailbox (RFC 6851).
    pub async fn mv(&mut self, folder: &str, set: &SeqSet, mode: IdMode) -> Result<()> {
        self.require_selected()?;
        let cmd = Command::Move {
            set: set.clone(),
            mailbox: folder.to_string(),
            mode,
        };
        self.dispatch(&cmd).await?.expect_ok().map(drop)
    }

    /// Searches the selected mailbox.
    ///
    /// `query` is raw criteria text (`ALL`, `UNSEEN SINCE 1-Feb-2024`, …).
    /// An empty id list is a valid result, not an error.
    pub async fn search(&mut self, query: &str, mode: IdMode) -> Result<Vec<u32>> {
        self.require_selected()?;
        let cmd = Command::Search {
            query: query.to_string(),
            mode,
        };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;

        let mut ids = Vec::new();
        for frame in reply.keyword_frames("SEARCH") {
            ids.extend(
                frame
                    .get(2..)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::to_u32),
            );
        }
        Ok(ids)
    }

    /// Resolves sequence numbers to UIDs.
    pub async fn uids(&mut self, msgns: &SeqSet) -> Result<BTreeMap<u32, u32>> {
        let map = self.fetch_one("UID", msgns, IdMode::Msgn).await?;
        Ok(map
            .into_iter()
            .filter_map(|(msgn, value)| value.to_u32().map(|uid| (msgn, uid)))
            .collect())
    }

    /// Expunges messages flagged `\Deleted`; returns their sequence numbers.
    pub async fn expunge(&mut self) -> Result<Vec<u32>> {
        self.require_selected()?;
        let reply = self.dispatch(&Command::Expunge).await?.expect_ok()?;
        Ok(reply.numeric_frames("EXPUNGE"))
    }

    /// Expunges only the given UIDs (RFC 4315 UIDPLUS); returns the
    /// sequence numbers the server reported removed.
    pub async fn uid_expunge(&mut self, set: &SeqSet) -> Result<Vec<u32>> {
        self.require_selected()?;
        let cmd = Command::UidExpunge { set: set.clone() };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;
        Ok(reply.numeric_frames("EXPUNGE"))
    }
}

/// Reassembles untagged FETCH frames into a per-message item map.
///
/// Servers disagree about item order, so the UID is located by scanning the
/// key/value pairs, never by position. When the request targeted a single
/// id, frames for other messages (unsolicited flag updates and the like)
/// are skipped.
fn collect_fetch(
    reply: &CommandReply,
    set: &SeqSet,
    mode: IdMode,
) -> BTreeMap<u32, BTreeMap<String, Value>> {
    let only = set.single_id();
    let mut out = BTreeMap::new();

    for frame in &reply.untagged {
        // * <n> FETCH (k1 v1 k2 v2 …)
        let Some(seq) = frame.get(1).and_then(Value::to_u32) else {
            continue;
        };
        if !frame.get(2).is_some_and(|v| v.is_atom("FETCH")) {
            continue;
        }
        let Some(pairs) = frame.get(3).and_then(Value::as_list) else {
            continue;
        };

        let items = pair_map(pairs);
        let id = match mode {
            IdMode::Uid => match items.get("UID").and_then(Value::to_u32) {
                Some(uid) => uid,
                None => continue,
            },
            IdMode::Msgn => seq,
        };
        if only.is_some_and(|target| target != id) {
            continue;
        }
        out.insert(id, items);
    }

    out
}

/// Walks a FETCH item list into key → value form.
///
/// Keys are uppercased atoms. A `BODY[…]` key whose section contains a
/// parenthesized part (`BODY[HEADER.FIELDS (FROM TO)]`) spans several
/// tokens; these are folded back into one key string before the value is
/// taken.
fn pair_map(pairs: &[Value]) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    let mut iter = pairs.iter().peekable();

    while let Some(value) = iter.next() {
        let Value::Atom(bytes) = value else {
            // A value with no preceding key; nothing to anchor it to.
            continue;
        };
        let mut key = String::from_utf8_lossy(bytes).to_ascii_uppercase();

        if key.starts_with("BODY[") && !key.contains(']') {
            while let Some(part) = iter.peek() {
                match part {
                    Value::Atom(b) => {
                        let s = String::from_utf8_lossy(b).to_ascii_uppercase();
                        if s.starts_with(']') {
                            key.push_str(&s);
                        } else {
                            key.push(' ');
                            key.push_str(&s);
                        }
                        let done = s.contains(']');
                        iter.next();
                        if done {
                            break;
                        }
                    }
                    Value::List(items) => {
                        key.push_str(" (");
                        key.push_str(&render(items).to_ascii_uppercase());
                        key.push(')');
                        iter.next();
                    }
                    Value::String(_) => break,
                }
            }
        }

        let Some(item_value) = iter.next() else {
            break;
        };
        map.insert(key, item_value.clone());
    }

    map
}
