//! COPY and UID COPY command handlers.
//!
//! Messages are appended to the destination mailbox with their flags
//! (minus the session-scoped `\Recent`) and internal date preserved.

use crate::connection::Session;
use crate::error::Result;
use crate::format::unquote;
use crate::mailstore::{Flag, Mailbox, Message, User};
use crate::sequence::SequenceSet;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handle COPY (`by_uid = false`) or UID COPY (`by_uid = true`).
pub(crate) async fn copy<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
    by_uid: bool,
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_selected(tag, false).await? {
        return Ok(());
    }

    let set = match SequenceSet::parse(&args[1]) {
        Ok(set) => set,
        Err(err) => return session.write_response(tag, &format!("BAD {err}")).await,
    };

    let dest_name = unquote(&args[2]).to_string();
    let Some(user) = session.current_user() else {
        unreachable!("authenticated gate passed without a user");
    };
    let Some(dest) = user.mailbox_by_name(&dest_name) else {
        return session
            .write_response(tag, &format!("NO [TRYCREATE] no such mailbox {dest_name}"))
            .await;
    };

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
        let mut flags = message.flags();
        flags.retain(|f| *f != Flag::Recent);

        if let Err(err) =
            dest.append(&flags, message.internal_date(), &full_message(message.as_ref()))
        {
            return session.reject_store_error(tag, &err).await;
        }
    }

    let completion = if by_uid {
        "OK UID COPY completed"
    } else {
        "OK COPY completed"
    };
    session.write_response(tag, completion).await
}

/// Reassemble the full RFC 2822 message: header block, separator,
/// body text.
fn full_message(message: &dyn Message) -> Vec<u8> {
    let mut raw = message.header().to_wire();
    raw.extend_from_slice(b"\r\n");
    raw.extend_from_slice(&message.body());
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MailboxMode;
    use crate::handlers::testing::{args, selected};
    use crate::mailstore::MailStore;

    #[tokio::test]
    async fn copies_messages_with_flags_and_date() {
        let mut h = selected("INBOX", MailboxMode::ReadOnly);
        copy(&mut h.session, &args(&["a1", "1:2", "Trash"]), false)
            .await
            .unwrap();

        let store = h.store.clone();
        let output = h.output().await;
        assert!(output.ends_with("a1 OK COPY completed\r\n"));

        let user = store.authenticate("username", "password").unwrap().unwrap();
        let trash = user.mailbox_by_name("Trash").unwrap();
        assert_eq!(trash.message_count(), 2);

        let copied = trash.messages_by_seq(&SequenceSet::parse("1").unwrap()).unwrap();
        assert!(copied[0].flags().contains(&Flag::Seen));
        assert_eq!(copied[0].header().find_key("subject"), Some("welcome"));
        assert_eq!(
            copied[0].internal_date().to_rfc3339(),
            "2024-01-02T09:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn uid_copy_addresses_by_uid() {
        let mut h = selected("INBOX", MailboxMode::ReadOnly);
        copy(&mut h.session, &args(&["a1", "3", "Trash"]), true)
            .await
            .unwrap();

        let store = h.store.clone();
        let output = h.output().await;
        assert!(output.ends_with("a1 OK UID COPY completed\r\n"));

        let user = store.authenticate("username", "password").unwrap().unwrap();
        let trash = user.mailbox_by_name("Trash").unwrap();
        let copied = trash.messages_by_seq(&SequenceSet::parse("1").unwrap()).unwrap();
        assert_eq!(copied[0].header().find_key("subject"), Some("minutes"));
    }

    #[tokio::test]
    async fn missing_destination_answers_trycreate() {
        let mut h = selected("INBOX", MailboxMode::ReadOnly);
        copy(&mut h.session, &args(&["a1", "1", "Nowhere"]), false)
            .await
            .unwrap();

        assert_eq!(
            h.output().await,
            "a1 NO [TRYCREATE] no such mailbox Nowhere\r\n"
        );
    }

    #[tokio::test]
    async fn bad_sequence_set_answers_bad() {
        let mut h = selected("INBOX", MailboxMode::ReadOnly);
        copy(&mut h.session, &args(&["a1", "zero", "Trash"]), false)
            .await
            .unwrap();

        assert!(h.output().await.starts_with("a1 BAD invalid sequence set string"));
    }
}
