//! CLOSE and UNSELECT command handlers.
//!
//! Both leave the Selected state. CLOSE additionally expunges
//! `\Deleted` messages when the mailbox was selected read-write,
//! without emitting untagged EXPUNGE responses; UNSELECT (RFC 3691)
//! never expunges.

use crate::connection::{MailboxMode, Session};
use crate::error::Result;
use crate::mailstore::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Handle CLOSE: expunge (read-write only), deselect, OK.
pub(crate) async fn close<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_selected(tag, false).await? {
        return Ok(());
    }

    let Some((mailbox, mode)) = session.selected_mailbox() else {
        unreachable!("selected gate passed without a mailbox");
    };

    if mode == MailboxMode::ReadWrite {
        match mailbox.expunge() {
            Ok(expunged) => {
                if !expunged.is_empty() {
                    debug!("expunged {} messages on CLOSE", expunged.len());
                }
            }
            Err(err) => return session.reject_store_error(tag, &err).await,
        }
    }

    session.deselect();
    session.write_response(tag, "OK CLOSE completed").await
}

/// Handle UNSELECT: deselect without expunging.
pub(crate) async fn unselect<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_selected(tag, false).await? {
        return Ok(());
    }

    session.deselect();
    session.write_response(tag, "OK UNSELECT completed").await
}
