//! Per-connection IMAP session
//!
//! A [`Session`] exclusively owns one client transport and drives it
//! through the IMAP lifecycle:
//!
//! ```text
//! New -> greeting -> NotAuthenticated -> LOGIN -> Authenticated
//!     -> SELECT/EXAMINE -> Selected -> CLOSE/UNSELECT -> Authenticated
//!     -> LOGOUT (or EOF) -> LoggedOut
//! ```
//!
//! State-dependent data lives inside [`SessionState`] itself: a user
//! handle exists exactly in the Authenticated and Selected states, a
//! mailbox handle and access mode exactly in Selected. Leaving the
//! Selected state therefore cannot retain stale write access.
//!
//! All processing within one session is strictly sequential; the only
//! suspension points are reading from the transport and calls into the
//! mail store.

use crate::command;
use crate::error::{Error, Result};
use crate::mailstore::{MailStore, Mailbox, User};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

const LINE_ENDING: &str = "\r\n";

/// Trailing synchronising-literal announcement, e.g. `{310}` at the
/// end of a command line.
static LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\d+)\}$").expect("literal pattern"));

/// Append-only sink for the human-readable protocol trace.
///
/// Server output is prefixed `S: `, client input `C: `. The sink may
/// be shared between sessions, so every entry is issued as a single
/// write. Write failures are silently dropped -- losing trace lines
/// must never disturb the protocol.
#[derive(Clone)]
pub struct Transcript {
    sink: Option<Arc<Mutex<Box<dyn Write + Send>>>>,
}

impl Transcript {
    /// A transcript that drops everything (the default).
    #[must_use]
    pub fn discard() -> Self {
        Self { sink: None }
    }

    /// A transcript writing to the given sink.
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    fn write(&self, entry: &str) {
        if let Some(sink) = &self.sink {
            if let Ok(mut sink) = sink.lock() {
                let _ = sink.write_all(entry.as_bytes());
                let _ = sink.flush();
            }
        }
    }

    pub(crate) fn client(&self, line: &str) {
        self.write(&format!("C: {line}\n"));
    }

    pub(crate) fn server(&self, bytes: &[u8]) {
        self.write(&format!("S: {}", String::from_utf8_lossy(bytes)));
    }

    pub(crate) fn note(&self, text: &str) {
        self.write(&format!("{text}\n"));
    }
}

/// Access mode of the selected mailbox: EXAMINE selects read-only,
/// SELECT read-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxMode {
    ReadOnly,
    ReadWrite,
}

/// Connection state, carrying the data valid in each state.
pub enum SessionState {
    /// Connected, greeting not yet sent.
    New,
    /// Greeting sent, no credentials presented.
    NotAuthenticated,
    /// Logged in.
    Authenticated { user: Arc<dyn User> },
    /// Logged in with a mailbox open.
    Selected {
        user: Arc<dyn User>,
        mailbox: Arc<dyn Mailbox>,
        mode: MailboxMode,
    },
    /// Terminal: no further commands are dispatched.
    LoggedOut,
}

impl SessionState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::NotAuthenticated => "NotAuthenticated",
            Self::Authenticated { .. } => "Authenticated",
            Self::Selected { .. } => "Selected",
            Self::LoggedOut => "LoggedOut",
        }
    }
}

/// A single client connection to the IMAP server.
pub struct Session<S> {
    stream: BufReader<S>,
    transcript: Transcript,
    store: Arc<dyn MailStore>,
    state: SessionState,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    pub fn new(store: Arc<dyn MailStore>, stream: S, transcript: Transcript) -> Self {
        Self {
            stream: BufReader::new(stream),
            transcript,
            store,
            state: SessionState::New,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn MailStore> {
        self.store.clone()
    }

    /// The authenticated user, present exactly in the Authenticated
    /// and Selected states.
    #[must_use]
    pub fn current_user(&self) -> Option<Arc<dyn User>> {
        match &self.state {
            SessionState::Authenticated { user } | SessionState::Selected { user, .. } => {
                Some(user.clone())
            }
            _ => None,
        }
    }

    /// The open mailbox and its access mode, present exactly in the
    /// Selected state.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<(Arc<dyn Mailbox>, MailboxMode)> {
        match &self.state {
            SessionState::Selected { mailbox, mode, .. } => Some((mailbox.clone(), *mode)),
            _ => None,
        }
    }

    /// Transition past the greeting. Called by [`Session::run`] once
    /// the greeting is on the wire, and by test harnesses injecting
    /// state.
    pub fn set_not_authenticated(&mut self) {
        self.state = SessionState::NotAuthenticated;
    }

    /// Transition to Authenticated after a successful LOGIN.
    pub fn set_authenticated(&mut self, user: Arc<dyn User>) {
        self.state = SessionState::Authenticated { user };
    }

    /// Transition to Selected (also used when re-selecting: the new
    /// mailbox and mode replace the old ones).
    pub fn set_selected(&mut self, mailbox: Arc<dyn Mailbox>, mode: MailboxMode) {
        let Some(user) = self.current_user() else {
            unreachable!("selected state requires an authenticated user");
        };
        self.state = SessionState::Selected {
            user,
            mailbox,
            mode,
        };
    }

    /// Drop back from Selected to Authenticated. No-op in any other
    /// state.
    pub fn deselect(&mut self) {
        if let SessionState::Selected { user, .. } = &self.state {
            self.state = SessionState::Authenticated { user: user.clone() };
        }
    }

    /// Terminal transition; the read loop exits after this.
    pub fn set_logged_out(&mut self) {
        self.state = SessionState::LoggedOut;
    }

    /// Drive the session: greet, then read and dispatch commands until
    /// logout or transport EOF.
    ///
    /// # Errors
    ///
    /// Returns the underlying transport error if reading or writing
    /// fails; a clean client disconnect is not an error.
    pub async fn run(mut self) -> Result<()> {
        if matches!(self.state, SessionState::New) {
            self.write_response("", "OK IMAP4rev1 Service Ready").await?;
            self.set_not_authenticated();
        }

        while !matches!(self.state, SessionState::LoggedOut) {
            let Some(line) = self.read_command().await? else {
                debug!("client closed connection");
                self.transcript.note("Client closed connection");
                self.set_logged_out();
                break;
            };
            if line.is_empty() {
                continue;
            }
            command::dispatch(&mut self, &line).await?;
        }

        Ok(())
    }

    /// Read one full command: a CRLF-terminated line, with any
    /// synchronising literals resolved inline. `None` on EOF.
    pub(crate) async fn read_command(&mut self) -> Result<Option<String>> {
        let Some(mut line) = self.read_line().await? else {
            return Ok(None);
        };

        let mut request = String::new();
        loop {
            let literal = LITERAL
                .captures(&line)
                .and_then(|caps| Some((caps.get(0)?.start(), caps[1].parse::<usize>().ok()?)));

            let Some((at, count)) = literal else {
                request.push_str(&line);
                return Ok(Some(request));
            };

            // The literal announcement is replaced by the announced
            // octets; the command continues on the following line.
            request.push_str(&line[..at]);
            self.write_continuation("Ready for literal data").await?;

            let mut octets = vec![0u8; count];
            self.stream.read_exact(&mut octets).await?;
            request.push_str(&String::from_utf8_lossy(&octets));

            match self.read_line().await? {
                Some(rest) => line = rest,
                None => return Ok(None),
            }
        }
    }

    /// Read one line, without its terminator. `None` on EOF.
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = self.stream.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        self.transcript.client(&line);
        Ok(Some(line))
    }

    /// Write one response line. An empty tag denotes an untagged
    /// response; CRLF is appended iff not already present.
    pub(crate) async fn write_response(&mut self, tag: &str, text: &str) -> Result<()> {
        let tag = if tag.is_empty() { "*" } else { tag };
        let mut line = format!("{tag} {text}");
        if !line.ends_with(LINE_ENDING) {
            line.push_str(LINE_ENDING);
        }
        self.write_raw(line.as_bytes()).await
    }

    /// Write a continuation line inviting the client to send more
    /// data.
    pub(crate) async fn write_continuation(&mut self, text: &str) -> Result<()> {
        let mut line = format!("+ {text}");
        if !line.ends_with(LINE_ENDING) {
            line.push_str(LINE_ENDING);
        }
        self.write_raw(line.as_bytes()).await
    }

    /// Emit bytes exactly as given, in a single transport write, with
    /// a transcript copy. Used directly by responses carrying literal
    /// payloads.
    pub(crate) async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.transcript.server(bytes);
        self.stream.get_mut().write_all(bytes).await?;
        self.stream.get_mut().flush().await?;
        Ok(())
    }

    /// Gate: the command requires an authenticated session. Emits the
    /// rejection itself; callers return early on `false`.
    pub(crate) async fn assert_authenticated(&mut self, tag: &str) -> Result<bool> {
        match &self.state {
            SessionState::Authenticated { .. } | SessionState::Selected { .. } => Ok(true),
            _ => {
                self.write_response(tag, "BAD not authenticated").await?;
                Ok(false)
            }
        }
    }

    /// Gate: the command requires a selected mailbox, writable when
    /// `need_write` is set.
    pub(crate) async fn assert_selected(&mut self, tag: &str, need_write: bool) -> Result<bool> {
        if !self.assert_authenticated(tag).await? {
            return Ok(false);
        }

        match &self.state {
            SessionState::Selected { mode, .. } => {
                if need_write && *mode != MailboxMode::ReadWrite {
                    self.write_response(tag, "NO Selected mailbox is READONLY")
                        .await?;
                    return Ok(false);
                }
                Ok(true)
            }
            _ => {
                self.write_response(tag, "BAD not selected").await?;
                Ok(false)
            }
        }
    }

    /// Report a mail-store failure: trace it, answer a tagged NO.
    pub(crate) async fn reject_store_error(&mut self, tag: &str, err: &Error) -> Result<()> {
        warn!("mail store error: {err}");
        self.transcript.note(&format!("Mail store error: {err}"));
        self.write_response(tag, &format!("NO {err}")).await
    }
}
