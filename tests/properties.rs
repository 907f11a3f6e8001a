//! Property tests for the wire round trips.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use wavecrest_imap::{Command, IdMode, Value, parser, parser::Tokenizer};

fn block_on<F: Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(fut)
}

/// A tree of atoms and lists, mirroring what a server may send.
#[derive(Debug, Clone)]
enum Node {
    Atom(String),
    List(Vec<Node>),
}

impl Node {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Atom(s) => out.extend_from_slice(s.as_bytes()),
            Self::List(items) => {
                out.push(b'(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.encode(out);
                }
                out.push(b')');
            }
        }
    }

    fn expected(&self) -> Value {
        match self {
            Self::Atom(s) => Value::atom(s),
            Self::List(items) => Value::List(items.iter().map(Self::expected).collect()),
        }
    }
}

fn node_strategy() -> impl Strategy<Value = Node> {
    let leaf = "[A-Za-z0-9.\\\\-]{1,8}".prop_map(Node::Atom);
    leaf.prop_recursive(4, 24, 5, |inner| {
        prop::collection::vec(inner, 0..5).prop_map(Node::List)
    })
}

proptest! {
    /// Quoting round trip: anything without CR/LF/CTL survives encode →
    /// tokenize unchanged.
    #[test]
    fn quoted_round_trip(s in "[^\\x00-\\x1F\\x7F]{0,120}") {
        let cmd = Command::Select { mailbox: s.clone() };
        let segments = cmd.serialize("TAG1");
        prop_assert_eq!(segments.len(), 1);

        let values = block_on(async {
            let mut tok = Tokenizer::new(segments[0].as_slice());
            parser::read_values(&mut tok).await
        }).unwrap();

        // TAG1 SELECT <value>
        prop_assert_eq!(values.len(), 3);
        prop_assert_eq!(values[2].as_bytes().unwrap(), s.as_bytes());
    }

    /// Literal fidelity: any byte content of any length crosses the wire
    /// verbatim.
    #[test]
    fn literal_round_trip(bytes in prop::collection::vec(any::<u8>(), 0..1500)) {
        let mut wire = format!("{{{}}}\r\n", bytes.len()).into_bytes();
        wire.extend_from_slice(&bytes);
        wire.extend_from_slice(b"\r\n");

        let values = block_on(async {
            let mut tok = Tokenizer::new(wire.as_slice());
            parser::read_values(&mut tok).await
        }).unwrap();

        prop_assert_eq!(values.len(), 1);
        prop_assert_eq!(values[0].as_bytes().unwrap(), bytes.as_slice());
    }

    /// Nesting: any tree of atoms and lists parses back to the same tree.
    #[test]
    fn nesting_round_trip(node in node_strategy()) {
        let mut wire = Vec::new();
        node.encode(&mut wire);
        wire.extend_from_slice(b"\r\n");

        let values = block_on(async {
            let mut tok = Tokenizer::new(wire.as_slice());
            parser::read_values(&mut tok).await
        }).unwrap();

        prop_assert_eq!(values.len(), 1);
        prop_assert_eq!(&values[0], &node.expected());
    }

    /// APPEND always ships the message as an untouched literal payload.
    #[test]
    fn append_message_travels_verbatim(bytes in prop::collection::vec(any::<u8>(), 0..600)) {
        let cmd = Command::Append {
            mailbox: "INBOX".to_string(),
            flags: None,
            date: None,
            message: bytes.clone(),
        };
        let segments = cmd.serialize("TAG1");
        prop_assert_eq!(segments.len(), 2);

        let marker = format!("{{{}}}\r\n", bytes.len());
        prop_assert!(segments[0].ends_with(marker.as_bytes()));

        let mut expected = bytes.clone();
        expected.extend_from_slice(b"\r\n");
        prop_assert_eq!(&segments[1], &expected);
    }

    /// Sequence-number FETCH serialization never emits a UID prefix, and
    /// UID mode always does.
    #[test]
    fn fetch_mode_prefix(n in 1u32..10_000) {
        let uid = Command::Fetch {
            set: wavecrest_imap::SeqSet::single(n),
            items: vec!["FLAGS".to_string()],
            mode: IdMode::Uid,
        };
        let msgn = Command::Fetch {
            set: wavecrest_imap::SeqSet::single(n),
            items: vec!["FLAGS".to_string()],
            mode: IdMode::Msgn,
        };
        prop_assert!(uid.serialize("T")[0].starts_with(b"T UID FETCH "));
        prop_assert!(msgn.serialize("T")[0].starts_with(b"T FETCH "));
    }
}
