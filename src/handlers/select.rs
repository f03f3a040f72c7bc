//! SELECT and EXAMINE command handlers.
//!
//! Both open a mailbox and reply with its status block; they differ
//! only in the access mode granted. The block is emitted in the order
//! clients expect (RFC 3501 Sections 6.3.1 and 7.1):
//!
//! ```text
//! * <n> EXISTS
//! * <r> RECENT
//! * OK [UNSEEN <k>]          (only when an unseen message exists)
//! * OK [UIDVALIDITY <v>]
//! * OK [UIDNEXT <u>]
//! * FLAGS (...)
//! * OK [PERMANENTFLAGS (...)]
//! <tag> OK [READ-WRITE|READ-ONLY] ... completed
//! ```

use crate::connection::{MailboxMode, Session};
use crate::error::Result;
use crate::format::unquote;
use crate::mailstore::{Flag, Mailbox, User};
use tokio::io::{AsyncRead, AsyncWrite};

/// Handle SELECT (`mode = ReadWrite`) or EXAMINE (`mode = ReadOnly`).
///
/// A failed lookup answers NO and, per RFC 3501 Section 6.3.1, leaves
/// no mailbox selected.
pub(crate) async fn select<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
    mode: MailboxMode,
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_authenticated(tag).await? {
        return Ok(());
    }

    let name = unquote(&args[1]).to_string();
    let Some(user) = session.current_user() else {
        unreachable!("authenticated gate passed without a user");
    };

    let Some(mailbox) = user.mailbox_by_name(&name) else {
        session.deselect();
        return session
            .write_response(tag, &format!("NO no such mailbox {name}"))
            .await;
    };

    session
        .write_response("", &format!("{} EXISTS", mailbox.message_count()))
        .await?;
    session
        .write_response("", &format!("{} RECENT", mailbox.recent_count()))
        .await?;
    if let Some(unseen) = mailbox.first_unseen() {
        session
            .write_response("", &format!("OK [UNSEEN {unseen}] Message {unseen} is first unseen"))
            .await?;
    }
    session
        .write_response("", &format!("OK [UIDVALIDITY {}] UIDs valid", mailbox.uid_validity()))
        .await?;
    session
        .write_response("", &format!("OK [UIDNEXT {}] Predicted next UID", mailbox.uid_next()))
        .await?;
    session
        .write_response("", &format!("FLAGS {}", Flag::list(&mailbox.flags())))
        .await?;

    let permanent = match mode {
        MailboxMode::ReadWrite => Flag::list(&mailbox.flags()),
        MailboxMode::ReadOnly => "()".to_string(),
    };
    session
        .write_response("", &format!("OK [PERMANENTFLAGS {permanent}] Flags permitted"))
        .await?;

    session.set_selected(mailbox, mode);

    let completion = match mode {
        MailboxMode::ReadWrite => "OK [READ-WRITE] SELECT completed",
        MailboxMode::ReadOnly => "OK [READ-ONLY] EXAMINE completed",
    };
    session.write_response(tag, completion).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{args, authenticated, not_authenticated, selected};

    #[tokio::test]
    async fn select_opens_read_write() {
        let mut h = authenticated();
        select(&mut h.session, &args(&["a1", "INBOX"]), MailboxMode::ReadWrite)
            .await
            .unwrap();

        assert_eq!(h.session.state().name(), "Selected");
        let (_, mode) = h.session.selected_mailbox().unwrap();
        assert_eq!(mode, MailboxMode::ReadWrite);

        let output = h.output().await;
        assert!(output.contains("* 3 EXISTS"));
        assert!(output.contains("* 0 RECENT"));
        assert!(output.contains("* OK [UNSEEN 2]"));
        assert!(output.contains("* OK [UIDVALIDITY 1]"));
        assert!(output.contains("* OK [UIDNEXT 4]"));
        assert!(output.contains("* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)"));
        assert!(output.contains("* OK [PERMANENTFLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)]"));
        assert!(output.ends_with("a1 OK [READ-WRITE] SELECT completed\r\n"));
    }

    #[tokio::test]
    async fn examine_opens_read_only() {
        let mut h = authenticated();
        select(&mut h.session, &args(&["a1", "INBOX"]), MailboxMode::ReadOnly)
            .await
            .unwrap();

        let (_, mode) = h.session.selected_mailbox().unwrap();
        assert_eq!(mode, MailboxMode::ReadOnly);

        let output = h.output().await;
        assert!(output.contains("* OK [PERMANENTFLAGS ()]"));
        assert!(output.ends_with("a1 OK [READ-ONLY] EXAMINE completed\r\n"));
    }

    #[tokio::test]
    async fn quoted_mailbox_name_accepted() {
        let mut h = authenticated();
        select(&mut h.session, &args(&["a1", "\"INBOX\""]), MailboxMode::ReadWrite)
            .await
            .unwrap();
        assert_eq!(h.session.state().name(), "Selected");
    }

    #[tokio::test]
    async fn missing_mailbox_answers_no_and_deselects() {
        let mut h = selected("INBOX", MailboxMode::ReadWrite);
        select(&mut h.session, &args(&["a2", "Nowhere"]), MailboxMode::ReadWrite)
            .await
            .unwrap();

        assert_eq!(h.session.state().name(), "Authenticated");
        assert!(h.output().await.contains("a2 NO no such mailbox Nowhere"));
    }

    #[tokio::test]
    async fn reselect_swaps_mailbox() {
        let mut h = selected("INBOX", MailboxMode::ReadWrite);
        select(&mut h.session, &args(&["a2", "Trash"]), MailboxMode::ReadWrite)
            .await
            .unwrap();

        let (mailbox, _) = h.session.selected_mailbox().unwrap();
        assert_eq!(mailbox.name(), "Trash");
    }

    #[tokio::test]
    async fn requires_authentication() {
        let mut h = not_authenticated();
        select(&mut h.session, &args(&["a1", "INBOX"]), MailboxMode::ReadWrite)
            .await
            .unwrap();
        assert_eq!(h.output().await, "a1 BAD not authenticated\r\n");
    }
}
