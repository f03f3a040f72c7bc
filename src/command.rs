//! Command registry and dispatcher
//!
//! Incoming lines are matched against anchored patterns in
//! registration order; the first match wins and its captures are
//! handed to the handler positionally (capture 0 is always the tag).
//! UID variants are registered ahead of their sequence-number
//! counterparts.

use crate::connection::{MailboxMode, Session};
use crate::error::Result;
use crate::handlers;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Capability,
    Noop,
    Login,
    Logout,
    Select,
    Examine,
    List,
    Lsub,
    UidFetch,
    Fetch,
    UidStore,
    Store,
    UidSearch,
    Search,
    UidCopy,
    Copy,
    Close,
    Unselect,
    Create,
    Delete,
    Rename,
    Subscribe,
    Unsubscribe,
}

struct Command {
    pattern: Regex,
    kind: Kind,
}

static COMMANDS: Lazy<Vec<Command>> = Lazy::new(|| {
    let cmd = |pattern: &str, kind: Kind| Command {
        pattern: Regex::new(pattern).expect("command pattern"),
        kind,
    };

    vec![
        cmd(r"^(\S+) (?i:CAPABILITY)$", Kind::Capability),
        cmd(r"^(\S+) (?i:NOOP)$", Kind::Noop),
        cmd(r"^(\S+) (?i:LOGIN) (\S+) (\S+)$", Kind::Login),
        cmd(r"^(\S+) (?i:LOGOUT)$", Kind::Logout),
        cmd(r"^(\S+) (?i:SELECT) (.+)$", Kind::Select),
        cmd(r"^(\S+) (?i:EXAMINE) (.+)$", Kind::Examine),
        cmd(r#"^(\S+) (?i:LIST) ("[^"]*"|\S+) ("[^"]*"|\S+)$"#, Kind::List),
        cmd(r#"^(\S+) (?i:LSUB) ("[^"]*"|\S+) ("[^"]*"|\S+)$"#, Kind::Lsub),
        cmd(r"^(\S+) (?i:UID FETCH) (\S+) (.+)$", Kind::UidFetch),
        cmd(r"^(\S+) (?i:FETCH) (\S+) (.+)$", Kind::Fetch),
        cmd(r"^(\S+) (?i:UID STORE) (\S+) (\S+) (.+)$", Kind::UidStore),
        cmd(r"^(\S+) (?i:STORE) (\S+) (\S+) (.+)$", Kind::Store),
        cmd(r"^(\S+) (?i:UID SEARCH) (.+)$", Kind::UidSearch),
        cmd(r"^(\S+) (?i:SEARCH) (.+)$", Kind::Search),
        cmd(r#"^(\S+) (?i:UID COPY) (\S+) ("[^"]*"|\S+)$"#, Kind::UidCopy),
        cmd(r#"^(\S+) (?i:COPY) (\S+) ("[^"]*"|\S+)$"#, Kind::Copy),
        cmd(r"^(\S+) (?i:CLOSE)$", Kind::Close),
        cmd(r"^(\S+) (?i:UNSELECT)$", Kind::Unselect),
        cmd(r"^(\S+) (?i:CREATE) (.+)$", Kind::Create),
        cmd(r"^(\S+) (?i:DELETE) (.+)$", Kind::Delete),
        cmd(r#"^(\S+) (?i:RENAME) ("[^"]*"|\S+) ("[^"]*"|\S+)$"#, Kind::Rename),
        cmd(r"^(\S+) (?i:SUBSCRIBE) (.+)$", Kind::Subscribe),
        cmd(r"^(\S+) (?i:UNSUBSCRIBE) (.+)$", Kind::Unsubscribe),
    ]
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\S+)").expect("tag pattern"));

/// Match a request line against the registry and run its handler.
/// Unrecognised lines are answered with a tagged (or, failing tag
/// extraction, untagged) BAD.
pub(crate) async fn dispatch<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    line: &str,
) -> Result<()> {
    for command in COMMANDS.iter() {
        if let Some(caps) = command.pattern.captures(line) {
            let args: Vec<String> = caps
                .iter()
                .skip(1)
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                .collect();
            return run(session, command.kind, &args).await;
        }
    }

    let tag = TAG
        .captures(line)
        .map_or("", |caps| caps.get(1).map_or("", |m| m.as_str()));
    session.write_response(tag, "BAD Command not understood").await
}

async fn run<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    kind: Kind,
    args: &[String],
) -> Result<()> {
    match kind {
        Kind::Capability => handlers::capability(session, args).await,
        Kind::Noop => handlers::noop(session, args).await,
        Kind::Login => handlers::login(session, args).await,
        Kind::Logout => handlers::logout(session, args).await,
        Kind::Select => handlers::select(session, args, MailboxMode::ReadWrite).await,
        Kind::Examine => handlers::select(session, args, MailboxMode::ReadOnly).await,
        Kind::List => handlers::list(session, args).await,
        Kind::Lsub => handlers::lsub(session, args).await,
        Kind::UidFetch => handlers::fetch(session, args, true).await,
        Kind::Fetch => handlers::fetch(session, args, false).await,
        Kind::UidStore => handlers::store(session, args, true).await,
        Kind::Store => handlers::store(session, args, false).await,
        Kind::UidSearch => handlers::search(session, args, true).await,
        Kind::Search => handlers::search(session, args, false).await,
        Kind::UidCopy => handlers::copy(session, args, true).await,
        Kind::Copy => handlers::copy(session, args, false).await,
        Kind::Close => handlers::close(session, args).await,
        Kind::Unselect => handlers::unselect(session, args).await,
        Kind::Create => handlers::create(session, args).await,
        Kind::Delete => handlers::delete(session, args).await,
        Kind::Rename => handlers::rename(session, args).await,
        Kind::Subscribe => handlers::subscribe(session, args).await,
        Kind::Unsubscribe => handlers::unsubscribe(session, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Transcript;
    use crate::memstore::MemStore;
    use std::sync::Arc;
    use tokio::io::BufReader;

    async fn run_line(line: &str) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut session = Session::new(Arc::new(MemStore::demo()), server, Transcript::discard());

        dispatch(&mut session, line).await.unwrap();
        drop(session);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn unknown_command_answers_tagged_bad() {
        let output = run_line("a1 FROBNICATE now").await;
        assert_eq!(output, "a1 BAD Command not understood\r\n");
    }

    #[tokio::test]
    async fn command_word_is_case_insensitive() {
        let output = run_line("a1 capability").await;
        assert!(output.contains("* CAPABILITY IMAP4rev1"));
        assert!(output.contains("a1 OK CAPABILITY completed"));
    }

    #[tokio::test]
    async fn tag_is_preserved_verbatim() {
        let output = run_line("TAG.42 NOOP").await;
        assert!(output.contains("TAG.42 OK NOOP completed"));
    }

    #[tokio::test]
    async fn uid_variant_matches_before_plain() {
        // Not authenticated, so the gate answers -- but through the
        // FETCH handler, proving the line matched a fetch pattern
        // rather than falling through to BAD Command not understood.
        let output = run_line("a1 UID FETCH 1:* (FLAGS)").await;
        assert!(output.contains("a1 BAD not authenticated"));
    }
}
