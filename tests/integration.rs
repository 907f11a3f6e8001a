//! End-to-end scenarios driven through scripted mock streams.
//!
//! The mock plays the server side: `read` entries are bytes the server
//! sends, `write` entries are the exact bytes the client must produce.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio_test::io::Builder;

use wavecrest_imap::{
    Config, ConnState, Connection, Error, IdMode, Notification, SeqSet, Transport, Value, parser,
    parser::Tokenizer,
};

async fn parse_values(input: &[u8]) -> Vec<Value> {
    let mut tok = Tokenizer::new(input);
    parser::read_values(&mut tok).await.unwrap()
}

#[tokio::test]
async fn untagged_greeting_parses_to_atoms() {
    let values = parse_values(b"* OK Dovecot ready.\r\n").await;
    assert_eq!(
        values,
        vec![
            Value::atom("*"),
            Value::atom("OK"),
            Value::atom("Dovecot"),
            Value::atom("ready."),
        ]
    );
}

#[tokio::test]
async fn quoted_string_parses_to_payload() {
    let values = parse_values(b"\"Hello, world!\"\r\n").await;
    assert_eq!(values, vec![Value::string(b"Hello, world!")]);
}

#[tokio::test]
async fn synchronizing_literal_parses_to_payload() {
    let values = parse_values(b"{5}\r\nHello").await;
    assert_eq!(values, vec![Value::string(b"Hello")]);
}

#[tokio::test]
async fn nested_list_parses_to_tree() {
    let values = parse_values(b"(A (B C) D)\r\n").await;
    assert_eq!(
        values,
        vec![Value::List(vec![
            Value::atom("A"),
            Value::List(vec![Value::atom("B"), Value::atom("C")]),
            Value::atom("D"),
        ])]
    );
}

async fn selected_connection(
    script: impl FnOnce(&mut Builder) -> &mut Builder,
) -> Connection<tokio_test::io::Mock> {
    let mut builder = Builder::new();
    builder
        .read(b"* OK ready\r\n")
        .write(b"TAG1 LOGIN joe secret\r\n")
        .read(b"TAG1 OK logged in\r\n")
        .write(b"TAG2 SELECT INBOX\r\n")
        .read(b"* 4 EXISTS\r\nTAG2 OK [READ-WRITE] selected\r\n");
    script(&mut builder);
    let mut conn = Connection::from_stream(builder.build()).await.unwrap();
    conn.login("joe", "secret").await.unwrap();
    conn.select_folder("INBOX").await.unwrap();
    conn
}

#[tokio::test]
async fn fetch_sequence_with_literal_headers() {
    // Four FETCH frames: two bare UIDs, two carrying 12-byte header
    // literals; then the tagged completion, then a second command's frame.
    let mut conn = selected_connection(|b| {
        b.write(b"TAG3 UID FETCH 1:* (UID RFC822.HEADER)\r\n")
            .read(
                b"* 1 FETCH (UID 101)\r\n\
                  * 2 FETCH (UID 102)\r\n\
                  * 3 FETCH (UID 103 RFC822.HEADER {12}\r\nFrom: ab\r\n\r\n)\r\n\
                  * 4 FETCH (RFC822.HEADER {12}\r\nFrom: cd\r\n\r\n UID 104)\r\n\
                  TAG3 OK FETCH completed\r\n",
            )
            .write(b"TAG4 NOOP\r\n")
            .read(b"TAG4 OK NOOP completed\r\n")
    })
    .await;

    let result = conn
        .fetch(&["UID", "RFC822.HEADER"], &SeqSet::starting_at(1), IdMode::Uid)
        .await
        .unwrap();

    assert_eq!(result.len(), 4);
    assert!(!result[&101].contains_key("RFC822.HEADER"));
    assert_eq!(
        result[&103]["RFC822.HEADER"].as_bytes().unwrap(),
        b"From: ab\r\n\r\n".as_ref()
    );
    // UID located after the literal, not at a fixed position.
    assert_eq!(
        result[&104]["RFC822.HEADER"].as_bytes().unwrap(),
        b"From: cd\r\n\r\n".as_ref()
    );

    conn.noop().await.unwrap();
}

#[tokio::test]
async fn login_failure_carries_server_text() {
    let mock = Builder::new()
        .read(b"* OK ready\r\n")
        .write(b"TAG1 LOGIN joe wrong\r\n")
        .read(b"TAG1 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .build();
    let mut conn = Connection::from_stream(mock).await.unwrap();
    match conn.login("joe", "wrong").await.unwrap_err() {
        Error::Auth(text) => assert!(text.contains("Invalid credentials")),
        other => panic!("expected auth failure, got {other:?}"),
    }
}

#[tokio::test]
async fn idle_round_trip() {
    let mut conn = selected_connection(|b| {
        b.write(b"TAG3 IDLE\r\n")
            .read(b"+ idling\r\n")
            .read(b"* 4 EXISTS\r\n")
            .write(b"DONE\r\n")
            .read(b"TAG3 OK IDLE terminated\r\n")
    })
    .await;

    conn.idle().await.unwrap();
    assert_eq!(
        conn.next_notification().await.unwrap(),
        Notification::Exists(4)
    );
    let drained = conn.done().await.unwrap();
    assert!(drained.is_empty());
    assert_eq!(*conn.state(), ConnState::Selected("INBOX".to_string()));
}

#[tokio::test]
async fn tags_stay_unique_across_a_session() {
    let count = 50;
    let mut builder = Builder::new();
    builder.read(b"* OK ready\r\n");
    for i in 1..=count {
        builder
            .write(format!("TAG{i} NOOP\r\n").as_bytes())
            .read(format!("TAG{i} OK done\r\n").as_bytes());
    }
    let mut conn = Connection::from_stream(builder.build()).await.unwrap();
    for _ in 0..count {
        conn.noop().await.unwrap();
    }
}

#[tokio::test]
async fn logout_is_idempotent_after_teardown() {
    let mock = Builder::new()
        .read(b"* OK ready\r\n")
        .write(b"TAG1 LOGOUT\r\n")
        .read(b"* BYE closing\r\nTAG1 OK bye\r\n")
        .build();
    let mut conn = Connection::from_stream(mock).await.unwrap();
    conn.logout().await.unwrap();
    conn.logout().await.unwrap();
    conn.logout().await.unwrap();
    assert_eq!(*conn.state(), ConnState::LoggedOut);
}

#[tokio::test]
async fn append_handshake_over_scripted_stream() {
    let mut conn = selected_connection(|b| {
        b.write(b"TAG3 APPEND Sent {14}\r\n")
            .read(b"+ OK\r\n")
            .write(b"Subject: out\r\n\r\n")
            .read(b"TAG3 OK APPEND completed\r\n")
    })
    .await;

    conn.append("Sent", b"Subject: out\r\n", None, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn connect_login_logout_over_real_tcp() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        sock.write_all(b"* OK test server ready\r\n").await.unwrap();

        let mut buf = vec![0u8; 1024];
        let n = sock.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"TAG1 LOGIN joe secret"));
        sock.write_all(b"TAG1 OK logged in\r\n").await.unwrap();

        let n = sock.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"TAG2 LOGOUT"));
        sock.write_all(b"* BYE see you\r\nTAG2 OK bye\r\n")
            .await
            .unwrap();
    });

    let config = Config::builder("127.0.0.1")
        .port(addr.port())
        .transport(Transport::Tcp)
        .connect_timeout(Duration::from_secs(5))
        .read_timeout(Duration::from_secs(5))
        .build();

    let mut conn = Connection::connect(&config).await.unwrap();
    assert_eq!(*conn.state(), ConnState::NotAuthenticated);
    conn.login("joe", "secret").await.unwrap();
    conn.logout().await.unwrap();

    server.await.unwrap();
}
