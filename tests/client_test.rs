//! The server exercised through a real IMAP client library.
//!
//! `async-imap` dials the test server over plain TCP, so every
//! response the server emits has to survive a strict RFC 3501 parser,
//! not just the string assertions of the raw-socket tests.

use futures::StreamExt;
use imapd::{test_connection, Transcript};
use tokio::net::TcpStream;

type ClientSession = async_imap::Session<TcpStream>;

/// Connect and log in with the demo credentials.
async fn connect() -> ClientSession {
    let (_server, stream, session) = test_connection(Transcript::discard())
        .await
        .expect("test connection");
    tokio::spawn(session.run());

    let client = async_imap::Client::new(stream);
    client
        .login("username", "password")
        .await
        .map_err(|(e, _)| e)
        .expect("login with demo credentials")
}

#[tokio::test]
async fn login_select_fetch_logout() {
    let mut session = connect().await;

    let mailbox = session.select("INBOX").await.expect("select INBOX");
    assert_eq!(mailbox.exists, 3);
    assert_eq!(mailbox.uid_validity, Some(1));
    assert_eq!(mailbox.uid_next, Some(4));

    let fetches: Vec<_> = session
        .fetch("1:*", "(UID FLAGS RFC822.SIZE)")
        .await
        .expect("fetch")
        .collect()
        .await;
    let messages: Vec<_> = fetches.into_iter().map(|m| m.expect("fetch item")).collect();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].uid, Some(1));
    assert!(messages[0].size.is_some());

    session.logout().await.expect("logout");
}

#[tokio::test]
async fn list_shows_demo_mailboxes() {
    let mut session = connect().await;

    let names: Vec<_> = session
        .list(Some(""), Some("*"))
        .await
        .expect("list")
        .collect()
        .await;
    let names: Vec<String> = names
        .into_iter()
        .map(|n| n.expect("list item").name().to_string())
        .collect();

    assert!(names.contains(&"INBOX".to_string()));
    assert!(names.contains(&"Trash".to_string()));

    session.logout().await.ok();
}

#[tokio::test]
async fn fetch_full_body_as_literal() {
    let mut session = connect().await;
    session.select("INBOX").await.expect("select INBOX");

    let fetches: Vec<_> = session
        .fetch("1", "(BODY.PEEK[])")
        .await
        .expect("fetch body")
        .collect()
        .await;
    let message = fetches.into_iter().next().expect("one message").expect("fetch item");

    let body = message.body().expect("literal body");
    let text = String::from_utf8_lossy(body);
    assert!(text.starts_with("From: alice@example.org\r\n"));
    assert!(text.contains("\r\n\r\nWelcome to your new mailbox."));

    session.logout().await.ok();
}

#[tokio::test]
async fn search_and_store_round_trip() {
    let mut session = connect().await;
    session.select("INBOX").await.expect("select INBOX");

    let unseen = session.search("UNSEEN").await.expect("search");
    assert_eq!(unseen.len(), 2);

    // Mark everything read, then nothing is unseen.
    let updates: Vec<_> = session
        .store("1:*", "+FLAGS (\\Seen)")
        .await
        .expect("store")
        .collect()
        .await;
    assert_eq!(updates.len(), 3);

    let unseen = session.search("UNSEEN").await.expect("search again");
    assert!(unseen.is_empty());

    session.logout().await.ok();
}

#[tokio::test]
async fn copy_and_create_mailbox() {
    let mut session = connect().await;

    session.create("Archive").await.expect("create mailbox");
    session.select("INBOX").await.expect("select INBOX");
    session.copy("1:2", "Archive").await.expect("copy");

    let mailbox = session.examine("Archive").await.expect("examine Archive");
    assert_eq!(mailbox.exists, 2);

    session.logout().await.ok();
}

#[tokio::test]
async fn bad_credentials_rejected() {
    let (_server, stream, session) = test_connection(Transcript::discard())
        .await
        .expect("test connection");
    tokio::spawn(session.run());

    let client = async_imap::Client::new(stream);
    assert!(client.login("username", "letmein").await.is_err());
}
