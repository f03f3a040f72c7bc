//! STORE and UID STORE command handlers.
//!
//! `STORE <set> <action> <flags>` where the action is `FLAGS`,
//! `+FLAGS`, or `-FLAGS`, optionally suffixed `.SILENT` to suppress
//! the untagged FETCH echoes. Requires a read-write selection.

use crate::connection::Session;
use crate::error::Result;
use crate::mailstore::{Flag, Mailbox, Message, StoreAction};
use crate::sequence::SequenceSet;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handle STORE (`by_uid = false`) or UID STORE (`by_uid = true`).
pub(crate) async fn store<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
    by_uid: bool,
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_selected(tag, true).await? {
        return Ok(());
    }

    let set = match SequenceSet::parse(&args[1]) {
        Ok(set) => set,
        Err(err) => return session.write_response(tag, &format!("BAD {err}")).await,
    };

    let Some((action, silent)) = parse_action(&args[2]) else {
        return session
            .write_response(tag, &format!("BAD invalid STORE action {}", args[2]))
            .await;
    };

    let flags = parse_flags(&args[3]);

    let Some((mailbox, _)) = session.selected_mailbox() else {
        unreachable!("selected gate passed without a mailbox");
    };

    let found = if by_uid {
        mailbox.messages_by_uid(&set)
    } else {
        mailbox.messages_by_seq(&set)
    };
    let messages = match found {
        Ok(messages) => messages,
        Err(err) => return session.reject_store_error(tag, &err).await,
    };

    for message in &messages {
        let new_flags = match mailbox.set_flags(message.uid(), action, &flags) {
            Ok(new_flags) => new_flags,
            Err(err) => return session.reject_store_error(tag, &err).await,
        };

        if !silent {
            let mut echo = format!(
                "{} FETCH (FLAGS {}",
                message.sequence_number(),
                Flag::list(&new_flags)
            );
            if by_uid {
                echo.push_str(&format!(" UID {}", message.uid()));
            }
            echo.push(')');
            session.write_response("", &echo).await?;
        }
    }

    let completion = if by_uid {
        "OK UID STORE completed"
    } else {
        "OK STORE completed"
    };
    session.write_response(tag, completion).await
}

/// Parse the action token into the mutation kind and its silence.
fn parse_action(token: &str) -> Option<(StoreAction, bool)> {
    let upper = token.to_ascii_uppercase();
    let (base, silent) = match upper.strip_suffix(".SILENT") {
        Some(base) => (base, true),
        None => (upper.as_str(), false),
    };
    let action = match base {
        "FLAGS" => StoreAction::Replace,
        "+FLAGS" => StoreAction::Add,
        "-FLAGS" => StoreAction::Remove,
        _ => return None,
    };
    Some((action, silent))
}

/// Parse the flag list, with or without surrounding parentheses.
fn parse_flags(raw: &str) -> Vec<Flag> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    inner.split_whitespace().map(Flag::parse).collect()
}
