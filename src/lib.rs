//! # wavecrest-imap
//!
//! An IMAP4rev1 (RFC 3501) client engine: the wire-level machinery that
//! turns a byte stream with an IMAP server into structured request/response
//! exchanges.
//!
//! ## What's inside
//!
//! - **Streaming tokenizer**: an incremental lexer over the transport that
//!   understands quoted strings with escapes, `{n}` synchronizing literals
//!   (switching to byte-counted reads mid-line), parenthesized lists, and
//!   atoms.
//! - **Response parser**: groups tokens into [`Value`] trees and classifies
//!   each response unit as untagged data, a continuation request, or a
//!   tagged status.
//! - **Command encoder**: serializes commands with automatic quoting and
//!   synchronizing-literal segmentation.
//! - **Connection state machine**: command tagging, the literal
//!   continuation handshake, tagged/untagged demultiplexing, LOGIN and
//!   XOAUTH2 authentication, STARTTLS upgrade, the IDLE push flow, and a
//!   typed failure taxonomy.
//!
//! Supported extensions: IDLE, MOVE, ID, UIDPLUS, QUOTA, STARTTLS, XOAUTH2.
//!
//! ## Quick start
//!
//! ```ignore
//! use wavecrest_imap::{Config, Connection, IdMode, SeqSet};
//!
//! #[tokio::main]
//! async fn main() -> wavecrest_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let mut conn = Connection::connect(&config).await?;
//!     conn.login("user@example.com", "password").await?;
//!
//!     let inbox = conn.select_folder("INBOX").await?;
//!     println!("{} messages", inbox.exists);
//!
//!     let unseen = conn.search("UNSEEN", IdMode::Uid).await?;
//!     if !unseen.is_empty() {
//!         let headers = conn.headers(&SeqSet::list(&unseen), IdMode::Uid).await?;
//!         println!("fetched {} headers", headers.len());
//!     }
//!
//!     // Wait for pushed updates.
//!     conn.idle().await?;
//!     let update = conn.next_notification().await?;
//!     println!("server pushed {update:?}");
//!     conn.done().await?;
//!
//!     conn.logout().await
//! }
//! ```
//!
//! ## Concurrency model
//!
//! One command is in flight per connection at a time: every operation takes
//! `&mut self` and runs to completion before the next starts, mirroring
//! IMAP's stateful nature (selected mailbox, tags, IDLE). Use one
//! connection per task. Dropping a connection closes the socket abortively;
//! [`Connection::logout`] is the graceful, idempotent teardown.
//!
//! ## Out of scope
//!
//! Message/mailbox object models, MIME and address parsing, credential
//! sourcing, and session orchestration live above this crate; header and
//! body payloads are returned as opaque byte strings.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod sasl;
pub mod types;

pub use command::{Command, TagGenerator};
pub use connection::{
    CommandReply, Config, ConfigBuilder, ConnState, Connection, FolderInfo, ImapStream,
    MailboxSummary, Notification, Quota, QuotaResource, StoreMode, Transport,
};
pub use error::{Error, Result};
pub use parser::{Frame, Token, Tokenizer, Value};
pub use types::{Bound, IdMode, SeqSet, Status};

/// Protocol revision this crate targets.
pub const IMAP_VERSION: &str = "IMAP4rev1";
