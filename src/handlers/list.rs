//! LIST and LSUB command handlers.
//!
//! The namespace here is flat (the hierarchy delimiter is `/` but no
//! nesting is created), so `*` and `%` wildcards behave identically.

use crate::connection::Session;
use crate::error::Result;
use crate::format::unquote;
use crate::mailstore::{Mailbox, User};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handle LIST: one `* LIST` line per mailbox matching the pattern.
///
/// An empty pattern is the RFC 3501 delimiter query and answers a
/// single `\Noselect` line naming the hierarchy delimiter.
pub(crate) async fn list<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_authenticated(tag).await? {
        return Ok(());
    }

    let reference = unquote(&args[1]).to_string();
    let pattern = unquote(&args[2]).to_string();

    if pattern.is_empty() {
        session
            .write_response("", "LIST (\\Noselect) \"/\" \"\"")
            .await?;
        return session.write_response(tag, "OK LIST completed").await;
    }

    let matcher = wildcard_regex(&reference, &pattern);
    let Some(user) = session.current_user() else {
        unreachable!("authenticated gate passed without a user");
    };

    for mailbox in user.mailboxes() {
        let name = mailbox.name();
        if matcher.is_match(&name) {
            session
                .write_response("", &format!("LIST (\\HasNoChildren) \"/\" \"{name}\""))
                .await?;
        }
    }

    session.write_response(tag, "OK LIST completed").await
}

/// Handle LSUB: like LIST but over the subscription list.
pub(crate) async fn lsub<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_authenticated(tag).await? {
        return Ok(());
    }

    let reference = unquote(&args[1]).to_string();
    let pattern = unquote(&args[2]).to_string();
    let matcher = wildcard_regex(&reference, &pattern);

    let Some(user) = session.current_user() else {
        unreachable!("authenticated gate passed without a user");
    };

    for name in user.subscriptions() {
        if matcher.is_match(&name) {
            session
                .write_response("", &format!("LSUB () \"/\" \"{name}\""))
                .await?;
        }
    }

    session.write_response(tag, "OK LSUB completed").await
}

/// Compile the reference + pattern pair into an anchored matcher.
/// `*` and `%` both become `.*`; everything else matches literally.
fn wildcard_regex(reference: &str, pattern: &str) -> Regex {
    let mut expr = String::from("^");
    for c in reference.chars().chain(pattern.chars()) {
        match c {
            '*' | '%' => expr.push_str(".*"),
            _ => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).expect("escaped wildcard pattern")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{args, authenticated, not_authenticated};

    #[tokio::test]
    async fn lists_all_mailboxes() {
        let mut h = authenticated();
        list(&mut h.session, &args(&["a1", "\"\"", "\"*\""])).await.unwrap();

        let output = h.output().await;
        assert!(output.contains("* LIST (\\HasNoChildren) \"/\" \"INBOX\""));
        assert!(output.contains("* LIST (\\HasNoChildren) \"/\" \"Trash\""));
        assert!(output.ends_with("a1 OK LIST completed\r\n"));
    }

    #[tokio::test]
    async fn pattern_filters_names() {
        let mut h = authenticated();
        list(&mut h.session, &args(&["a1", "\"\"", "\"IN*\""])).await.unwrap();

        let output = h.output().await;
        assert!(output.contains("\"INBOX\""));
        assert!(!output.contains("\"Trash\""));
    }

    #[tokio::test]
    async fn empty_pattern_answers_delimiter() {
        let mut h = authenticated();
        list(&mut h.session, &args(&["a1", "\"\"", "\"\""])).await.unwrap();

        let output = h.output().await;
        assert!(output.contains("* LIST (\\Noselect) \"/\" \"\""));
    }

    #[tokio::test]
    async fn lsub_lists_only_subscriptions() {
        let mut h = authenticated();
        let user = h.session.current_user().unwrap();
        user.subscribe("INBOX").unwrap();

        lsub(&mut h.session, &args(&["a1", "\"\"", "\"*\""])).await.unwrap();

        let output = h.output().await;
        assert!(output.contains("* LSUB () \"/\" \"INBOX\""));
        assert!(!output.contains("Trash"));
    }

    #[tokio::test]
    async fn requires_authentication() {
        let mut h = not_authenticated();
        list(&mut h.session, &args(&["a1", "\"\"", "\"*\""])).await.unwrap();
        assert_eq!(h.output().await, "a1 BAD not authenticated\r\n");
    }
}
