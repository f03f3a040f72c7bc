//! NOOP command handler.
//!
//! NOOP does nothing by itself, but it is the polling point where a
//! session surfaces status changes for the selected mailbox.

use crate::connection::Session;
use crate::error::Result;
use crate::mailstore::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handle NOOP: in the Selected state, re-announce the mailbox counts
/// so the client picks up changes made by other sessions; then OK.
pub(crate) async fn noop<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];

    if let Some((mailbox, _)) = session.selected_mailbox() {
        session
            .write_response("", &format!("{} EXISTS", mailbox.message_count()))
            .await?;
        session
            .write_response("", &format!("{} RECENT", mailbox.recent_count()))
            .await?;
    }

    session.write_response(tag, "OK NOOP completed").await
}
