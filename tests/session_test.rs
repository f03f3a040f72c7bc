//! End-to-end protocol tests over real TCP sockets.
//!
//! Each test dials a server created by `imapd::test_connection`,
//! spawns the accepted session, and speaks raw IMAP over the client
//! socket, asserting on the exact wire exchange.

use imapd::{test_connection, MailStore, Transcript};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Line-oriented wrapper over the client side of the connection.
struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("send command");
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.expect("read line");
        assert!(line.ends_with("\r\n"), "response not CRLF-terminated: {line:?}");
        line.trim_end().to_string()
    }

    /// Read lines up to and including the tagged response for `tag`.
    async fn until_tagged(&mut self, tag: &str) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            let done = line.starts_with(&format!("{tag} "));
            lines.push(line);
            if done {
                return lines;
            }
        }
    }
}

/// Start a fresh server/session pair and consume the greeting.
async fn start() -> Client {
    let (_server, stream, session) = test_connection(Transcript::discard())
        .await
        .expect("test connection");
    tokio::spawn(session.run());

    let mut client = Client::new(stream);
    assert_eq!(client.line().await, "* OK IMAP4rev1 Service Ready");
    client
}

async fn login(client: &mut Client) {
    client.send("a001 LOGIN username password").await;
    assert_eq!(client.line().await, "a001 OK LOGIN completed");
}

async fn select_inbox(client: &mut Client) {
    client.send("a002 SELECT INBOX").await;
    let lines = client.until_tagged("a002").await;
    assert_eq!(lines.last().unwrap(), "a002 OK [READ-WRITE] SELECT completed");
}

#[tokio::test]
async fn full_session_walkthrough() {
    let mut client = start().await;

    // LOGIN
    login(&mut client).await;

    // SELECT with its status block
    client.send("a002 SELECT INBOX").await;
    let lines = client.until_tagged("a002").await;
    assert!(lines.contains(&"* 3 EXISTS".to_string()));
    assert!(lines.contains(&"* 0 RECENT".to_string()));
    assert!(lines.iter().any(|l| l.starts_with("* OK [UIDVALIDITY ")));
    assert!(lines.iter().any(|l| l.starts_with("* OK [UIDNEXT ")));
    assert!(lines.iter().any(|l| l.starts_with("* FLAGS ")));
    assert_eq!(lines.last().unwrap(), "a002 OK [READ-WRITE] SELECT completed");

    // FETCH over the whole mailbox
    client.send("a003 FETCH 1:* (UID FLAGS)").await;
    let lines = client.until_tagged("a003").await;
    assert!(lines.contains(&"* 1 FETCH (UID 1 FLAGS (\\Seen))".to_string()));
    assert!(lines.contains(&"* 2 FETCH (UID 2 FLAGS ())".to_string()));
    assert!(lines.contains(&"* 3 FETCH (UID 3 FLAGS ())".to_string()));
    assert_eq!(lines.last().unwrap(), "a003 OK FETCH completed");

    // LOGOUT
    client.send("a004 LOGOUT").await;
    assert!(client.line().await.starts_with("* BYE"));
    assert_eq!(client.line().await, "a004 OK LOGOUT completed");

    // Server closes its end after logout.
    let mut rest = String::new();
    client.reader.read_line(&mut rest).await.expect("read eof");
    assert!(rest.is_empty());
}

#[tokio::test]
async fn failed_login_leaves_session_usable() {
    let mut client = start().await;

    client.send("a001 LOGIN username wrongpass").await;
    assert_eq!(client.line().await, "a001 NO authentication failed");

    // Commands requiring auth are still gated.
    client.send("a002 LIST \"\" \"*\"").await;
    assert_eq!(client.line().await, "a002 BAD not authenticated");

    login(&mut client).await;
}

#[tokio::test]
async fn unknown_command_answers_bad() {
    let mut client = start().await;
    client.send("a001 FROBNICATE").await;
    assert_eq!(client.line().await, "a001 BAD Command not understood");
}

#[tokio::test]
async fn capability_before_login() {
    let mut client = start().await;
    client.send("a001 CAPABILITY").await;
    assert_eq!(client.line().await, "* CAPABILITY IMAP4rev1 UNSELECT");
    assert_eq!(client.line().await, "a001 OK CAPABILITY completed");
}

#[tokio::test]
async fn examine_is_read_only() {
    let mut client = start().await;
    login(&mut client).await;

    client.send("a002 EXAMINE INBOX").await;
    let lines = client.until_tagged("a002").await;
    assert_eq!(lines.last().unwrap(), "a002 OK [READ-ONLY] EXAMINE completed");

    client.send("a003 STORE 1 +FLAGS (\\Deleted)").await;
    assert_eq!(client.line().await, "a003 NO Selected mailbox is READONLY");
}

#[tokio::test]
async fn login_with_synchronising_literals() {
    let mut client = start().await;

    client.send("a001 LOGIN {8}").await;
    assert_eq!(client.line().await, "+ Ready for literal data");
    client.writer.write_all(b"username").await.unwrap();
    client.send(" {8}").await;
    assert_eq!(client.line().await, "+ Ready for literal data");
    client.writer.write_all(b"password").await.unwrap();
    client.send("").await;

    assert_eq!(client.line().await, "a001 OK LOGIN completed");
}

#[tokio::test]
async fn store_close_expunge_cycle() {
    let mut client = start().await;
    login(&mut client).await;
    select_inbox(&mut client).await;

    client.send("a003 STORE 2 +FLAGS.SILENT (\\Deleted)").await;
    assert_eq!(client.line().await, "a003 OK STORE completed");

    client.send("a004 CLOSE").await;
    assert_eq!(client.line().await, "a004 OK CLOSE completed");

    // Re-select: the deleted message is gone and the rest renumbered.
    client.send("a005 SELECT INBOX").await;
    let lines = client.until_tagged("a005").await;
    assert!(lines.contains(&"* 2 EXISTS".to_string()));
}

#[tokio::test]
async fn copy_then_inspect_destination() {
    let mut client = start().await;
    login(&mut client).await;
    select_inbox(&mut client).await;

    client.send("a003 COPY 1:2 Trash").await;
    assert_eq!(client.line().await, "a003 OK COPY completed");

    client.send("a004 SELECT Trash").await;
    let lines = client.until_tagged("a004").await;
    assert!(lines.contains(&"* 2 EXISTS".to_string()));
}

#[tokio::test]
async fn uid_fetch_and_uid_search() {
    let mut client = start().await;
    login(&mut client).await;
    select_inbox(&mut client).await;

    client.send("a003 UID SEARCH UNSEEN").await;
    let lines = client.until_tagged("a003").await;
    assert!(lines.contains(&"* SEARCH 2 3".to_string()));
    assert_eq!(lines.last().unwrap(), "a003 OK UID SEARCH completed");

    client.send("a004 UID FETCH 2 (FLAGS)").await;
    let lines = client.until_tagged("a004").await;
    assert!(lines.contains(&"* 2 FETCH (FLAGS () UID 2)".to_string()));
}

#[tokio::test]
async fn invalid_sequence_set_answers_bad_with_input() {
    let mut client = start().await;
    login(&mut client).await;
    select_inbox(&mut client).await;

    client.send("a003 FETCH 1,3,:8 (FLAGS)").await;
    let line = client.line().await;
    assert!(line.starts_with("a003 BAD invalid sequence set string"));
    assert!(line.contains("1,3,:8"));
}

#[tokio::test]
async fn unselect_keeps_messages() {
    let mut client = start().await;
    login(&mut client).await;
    select_inbox(&mut client).await;

    client.send("a003 STORE 1 +FLAGS.SILENT (\\Deleted)").await;
    assert_eq!(client.line().await, "a003 OK STORE completed");

    client.send("a004 UNSELECT").await;
    assert_eq!(client.line().await, "a004 OK UNSELECT completed");

    client.send("a005 SELECT INBOX").await;
    let lines = client.until_tagged("a005").await;
    assert!(lines.contains(&"* 3 EXISTS".to_string()));
}

#[tokio::test]
async fn injected_state_skips_login() {
    // The harness returns the un-started session precisely so state
    // can be planted before the loop runs.
    let (_server, stream, mut session) = test_connection(Transcript::discard())
        .await
        .expect("test connection");

    let user = session
        .store()
        .authenticate("username", "password")
        .expect("store reachable")
        .expect("demo credentials");
    session.set_authenticated(user);
    tokio::spawn(session.run());

    // No greeting: the session starts past the New state.
    let mut client = Client::new(stream);
    client.send("a001 SELECT INBOX").await;
    let lines = client.until_tagged("a001").await;
    assert_eq!(lines.last().unwrap(), "a001 OK [READ-WRITE] SELECT completed");
}

/// `Write` sink shared with the transcript for later inspection.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn transcript_captures_both_directions() {
    let buf = SharedBuf::default();
    let (_server, stream, session) = test_connection(Transcript::to_writer(buf.clone()))
        .await
        .expect("test connection");
    tokio::spawn(session.run());

    let mut client = Client::new(stream);
    assert_eq!(client.line().await, "* OK IMAP4rev1 Service Ready");
    client.send("a001 LOGIN username password").await;
    assert_eq!(client.line().await, "a001 OK LOGIN completed");

    let transcript = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
    assert!(transcript.contains("S: * OK IMAP4rev1 Service Ready"));
    assert!(transcript.contains("C: a001 LOGIN username password"));
    assert!(transcript.contains("S: a001 OK LOGIN completed"));
}
