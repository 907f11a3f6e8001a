//! Streaming IMAP tokenizer.
//!
//! Consumes raw bytes from the transport and yields one typed token per
//! call. The tokenizer reads incrementally through a buffered reader and
//! never waits for more bytes than a single token requires, except while
//! consuming the byte-counted body of a `{n}` literal.

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Read buffer size.
const READ_BUFFER_SIZE: usize = 8192;

/// Maximum length of a single atom or quoted string, to bound memory.
const MAX_SCALAR_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size, to bound memory.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// One IMAP syntactic token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Bare atom; bytes preserved as received.
    Atom(Vec<u8>),
    /// Quoted string payload, escapes decoded, surrounding quotes excluded.
    Quoted(Vec<u8>),
    /// Literal payload: the `n` bytes following `{n}\r\n`, verbatim.
    Literal(Vec<u8>),
    /// `(`
    ListOpen,
    /// `)`
    ListClose,
    /// Line terminator.
    Crlf,
}

/// Incremental tokenizer over a duplex stream.
///
/// Owns the buffered reader for the connection; the write path goes through
/// the same object so a single stream serves both directions.
#[derive(Debug)]
pub struct Tokenizer<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    consumed: u64,
}

impl<S> Tokenizer<S>
where
    S: AsyncRead + Unpin,
{
    /// Wraps a stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
            consumed: 0,
        }
    }

    /// Number of inbound bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.consumed
    }

    /// Consumes the tokenizer and returns the inner stream.
    ///
    /// Any unread buffered data is discarded; callers use this at protocol
    /// points where the inbound stream is known to be drained (STARTTLS).
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S> Tokenizer<S>
where
    S: AsyncRead + Unpin,
{
    /// Reads the next token.
    pub async fn next_token(&mut self) -> Result<Token> {
        loop {
            let Some(byte) = self.peek().await? else {
                return Err(Error::Closed("connection closed".to_string()));
            };

            match byte {
                // Token separator, consumed silently.
                b' ' => self.bump(),

                b'\r' => {
                    self.bump();
                    if self.peek().await? == Some(b'\n') {
                        self.bump();
                        return Ok(Token::Crlf);
                    }
                    return Err(self.bad("expected LF after CR"));
                }

                b'(' => {
                    self.bump();
                    return Ok(Token::ListOpen);
                }
                b')' => {
                    self.bump();
                    return Ok(Token::ListClose);
                }

                b'"' => return self.read_quoted().await,
                b'{' => return self.read_literal().await,

                _ if is_atom_byte(byte) => return self.read_atom().await,

                _ => return Err(self.bad(format!("unexpected byte {byte:#04x}"))),
            }
        }
    }

    /// Peeks at the next byte without consuming it. `None` means EOF.
    async fn peek(&mut self) -> Result<Option<u8>> {
        let buf = self.reader.fill_buf().await?;
        Ok(buf.first().copied())
    }

    /// Consumes one previously peeked byte.
    fn bump(&mut self) {
        self.reader.consume(1);
        self.consumed += 1;
    }

    /// Reads a byte, treating EOF as a closed connection.
    async fn next_byte(&mut self, context: &str) -> Result<u8> {
        match self.peek().await? {
            Some(b) => {
                self.bump();
                Ok(b)
            }
            None => Err(Error::Closed(format!("connection closed {context}"))),
        }
    }

    /// Reads a maximal run of atom bytes.
    async fn read_atom(&mut self) -> Result<Token> {
        let mut atom = Vec::new();

        while let Some(b) = self.peek().await? {
            if !is_atom_byte(b) {
                break;
            }
            self.bump();
            atom.push(b);
            if atom.len() > MAX_SCALAR_LENGTH {
                return Err(Error::Protocol("atom too long".to_string()));
            }
        }

        Ok(Token::Atom(atom))
    }

    /// Reads a quoted string, decoding `\"` and `\\` escapes.
    async fn read_quoted(&mut self) -> Result<Token> {
        self.bump(); // opening quote

        let mut payload = Vec::new();

        loop {
            match self.next_byte("inside quoted string").await? {
                b'"' => break,
                b'\\' => match self.next_byte("inside quoted string").await? {
                    b @ (b'"' | b'\\') => payload.push(b),
                    b => return Err(self.bad(format!("invalid escape {b:#04x}"))),
                },
                b'\r' | b'\n' => {
                    return Err(self.bad("newline inside quoted string"));
                }
                b => payload.push(b),
            }
            if payload.len() > MAX_SCALAR_LENGTH {
                return Err(Error::Protocol("quoted string too long".to_string()));
            }
        }

        Ok(Token::Quoted(payload))
    }

    /// Reads `{n}` CRLF followed by exactly `n` bytes of arbitrary content.
    async fn read_literal(&mut self) -> Result<Token> {
        self.bump(); // {

        let mut digits = Vec::new();
        loop {
            match self.next_byte("inside literal size").await? {
                b @ b'0'..=b'9' => digits.push(b),
                b'}' => break,
                b => return Err(self.bad(format!("invalid byte {b:#04x} in literal size"))),
            }
        }
        if digits.is_empty() {
            return Err(self.bad("empty literal size"));
        }

        let size: usize = std::str::from_utf8(&digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.bad("literal size out of range"))?;
        if size > MAX_LITERAL_SIZE {
            return Err(Error::Protocol(format!(
                "literal too large: {size} bytes (max {MAX_LITERAL_SIZE})"
            )));
        }

        if self.next_byte("after literal size").await? != b'\r'
            || self.next_byte("after literal size").await? != b'\n'
        {
            return Err(self.bad("expected CRLF after literal size"));
        }

        // Byte-counted mode: the payload is consumed verbatim, including
        // CR, LF, and NUL. Lexing resumes in line mode afterwards.
        let mut payload = vec![0u8; size];
        self.reader.read_exact(&mut payload).await?;
        self.consumed += size as u64;

        Ok(Token::Literal(payload))
    }

    fn bad(&self, message: impl Into<String>) -> Error {
        Error::BadResponse {
            position: self.consumed,
            message: message.into(),
        }
    }
}

impl<S> Tokenizer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes bytes to the stream and flushes.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }
}

/// True for bytes that may appear in an atom.
///
/// Atoms are maximal runs excluding SP, CTL, `(`, `)`, `{`, `"`, CR, and LF.
const fn is_atom_byte(b: u8) -> bool {
    b > b' ' && b != 0x7F && !matches!(b, b'(' | b')' | b'{' | b'"')
}
