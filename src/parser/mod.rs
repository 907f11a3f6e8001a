//! Response parsing: token accumulation and frame classification.
//!
//! The parser groups tokens into [`Value`] trees, one response unit at a
//! time, and classifies each unit by its leading token into an untagged
//! data line, a continuation request, or a tagged status line.

#![allow(clippy::missing_errors_doc)]

mod tokenizer;
mod value;

pub use tokenizer::{Token, Tokenizer};
pub use value::{Value, render};

use tokio::io::AsyncRead;

use crate::types::Status;
use crate::{Error, Result};

/// One classified response unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Server data line (`* …`); values include the leading `*`.
    Untagged(Vec<Value>),
    /// Continuation request (`+ …`); values include the leading `+`.
    Continuation(Vec<Value>),
    /// Command completion line.
    Tagged {
        /// Tag of the command this status completes.
        tag: String,
        /// Completion condition.
        status: Status,
        /// Full value sequence, tag and status included.
        values: Vec<Value>,
    },
}

impl Frame {
    /// Human-readable text of a tagged frame (everything past the status).
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Tagged { values, .. } => render(values.get(2..).unwrap_or_default()),
            Self::Untagged(values) | Self::Continuation(values) => {
                render(values.get(1..).unwrap_or_default())
            }
        }
    }
}

/// Reads values up to the next top-level CRLF.
///
/// A CRLF inside an unbalanced list does not terminate the unit; the parser
/// keeps reading until the list closes (servers fold long responses across
/// lines). A `)` with no matching `(` is malformed. A missing `)` at
/// end-of-stream is tolerated by promoting the outstanding stack to the
/// result, which keeps partial frames from buggy servers readable.
pub async fn read_values<S>(tok: &mut Tokenizer<S>) -> Result<Vec<Value>>
where
    S: AsyncRead + Unpin,
{
    let mut stack: Vec<Vec<Value>> = vec![Vec::new()];

    loop {
        let token = match tok.next_token().await {
            Ok(token) => token,
            Err(Error::Closed(_)) if stack.len() > 1 || !stack[0].is_empty() => break,
            Err(e) => return Err(e),
        };

        match token {
            Token::Atom(bytes) => push(&mut stack, Value::Atom(bytes)),
            Token::Quoted(bytes) | Token::Literal(bytes) => {
                push(&mut stack, Value::String(bytes));
            }
            Token::ListOpen => stack.push(Vec::new()),
            Token::ListClose => {
                let Some(items) = stack.pop() else { break };
                if stack.is_empty() {
                    return Err(Error::BadResponse {
                        position: tok.position(),
                        message: "unmatched closing parenthesis".to_string(),
                    });
                }
                push(&mut stack, Value::List(items));
            }
            Token::Crlf => {
                if stack.len() == 1 {
                    break;
                }
            }
        }
    }

    // Promote any unclosed lists.
    while stack.len() > 1 {
        let Some(items) = stack.pop() else { break };
        push(&mut stack, Value::List(items));
    }

    Ok(stack.pop().unwrap_or_default())
}

fn push(stack: &mut Vec<Vec<Value>>, value: Value) {
    if let Some(top) = stack.last_mut() {
        top.push(value);
    }
}

/// Reads and classifies one response unit.
pub async fn read_frame<S>(tok: &mut Tokenizer<S>) -> Result<Frame>
where
    S: AsyncRead + Unpin,
{
    let values = read_values(tok).await?;
    classify(values, tok.position())
}

/// Classifies a value sequence by its leading value.
pub fn classify(values: Vec<Value>, position: u64) -> Result<Frame> {
    let bad = |message: &str| Error::BadResponse {
        position,
        message: message.to_string(),
    };

    let Some(first) = values.first() else {
        return Err(bad("empty response line"));
    };
    if first.is_atom("*") {
        return Ok(Frame::Untagged(values));
    }
    if first.is_atom("+") {
        return Ok(Frame::Continuation(values));
    }
    let Value::Atom(tag_bytes) = first else {
        return Err(bad("response line does not start with an atom"));
    };
    let tag = std::str::from_utf8(tag_bytes)
        .map_err(|_| bad("response tag is not valid UTF-8"))?
        .to_string();
    let status = values
        .get(1)
        .and_then(Value::as_bytes)
        .and_then(Status::parse)
        .ok_or_else(|| bad("missing status after response tag"))?;
    Ok(Frame::Tagged {
        tag,
        status,
        values,
    })
}
