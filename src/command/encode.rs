//! Wire-level argument encoding.
//!
//! Commands serialize to a sequence of wire segments. Every segment except
//! the last ends with a synchronizing-literal marker `{n}` CRLF; the next
//! segment starts with exactly `n` payload bytes. The connection writes one
//! segment, waits for the server's `+` continuation, then writes the next.

use crate::types::SeqSet;

/// Strings at or over this size are sent as literals even when quotable.
pub(crate) const LITERAL_THRESHOLD: usize = 1024;

/// Builder for the wire form of one command.
pub(crate) struct WireWriter {
    segments: Vec<Vec<u8>>,
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            buf: Vec::new(),
        }
    }

    /// Appends raw command text (keywords, already-encoded material).
    pub fn raw(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
    }

    pub fn space(&mut self) {
        self.buf.push(b' ');
    }

    /// Writes a string argument, choosing atom, quoted, or literal form.
    ///
    /// Bytes that survive quoting go out as an atom or a quoted string with
    /// `"` and `\` escaped and CTL bytes stripped. CR or LF anywhere, or
    /// size at the literal threshold, forces a synchronizing literal.
    pub fn astring(&mut self, value: &[u8]) {
        if needs_literal(value) {
            self.literal(value);
        } else if value.is_empty() || value.iter().copied().any(needs_quoting) {
            self.quoted(value);
        } else {
            self.buf.extend_from_slice(value);
        }
    }

    /// Writes a quoted string, escaping and stripping as needed.
    pub fn quoted(&mut self, value: &[u8]) {
        self.buf.push(b'"');
        for &b in value {
            if b < 0x20 || b == 0x7F {
                continue;
            }
            if b == b'"' || b == b'\\' {
                self.buf.push(b'\\');
            }
            self.buf.push(b);
        }
        self.buf.push(b'"');
    }

    /// Ends the current segment with a `{n}` marker; the payload opens the
    /// next segment, to be sent only after the server's `+` continuation.
    pub fn literal(&mut self, payload: &[u8]) {
        self.buf
            .extend_from_slice(format!("{{{}}}", payload.len()).as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self.segments.push(std::mem::take(&mut self.buf));
        self.buf.extend_from_slice(payload);
    }

    /// Writes a parenthesized list of atoms (flags, status attributes).
    pub fn atom_list(&mut self, items: &[String]) {
        self.buf.push(b'(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.buf.push(b' ');
            }
            self.buf.extend_from_slice(item.as_bytes());
        }
        self.buf.push(b')');
    }

    pub fn seq_set(&mut self, set: &SeqSet) {
        self.raw(&set.to_string());
    }

    /// Terminates the command line and returns the wire segments.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(b"\r\n");
        self.segments.push(self.buf);
        self.segments
    }
}

/// True when the string cannot be carried in quoted form at all.
fn needs_literal(value: &[u8]) -> bool {
    value.len() >= LITERAL_THRESHOLD || value.iter().any(|&b| b == b'\r' || b == b'\n')
}

/// True for bytes that disqualify the bare atom form.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}
