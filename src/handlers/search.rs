//! SEARCH and UID SEARCH command handlers.
//!
//! Criteria interpretation lives in the mail store; the handler
//! forwards the criteria string and formats the hit list. The store
//! answers in sequence numbers; the UID variant maps them to UIDs
//! before responding.

use crate::connection::Session;
use crate::error::Result;
use crate::mailstore::{Mailbox, Message};
use crate::sequence::SequenceSet;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handle SEARCH (`by_uid = false`) or UID SEARCH (`by_uid = true`).
pub(crate) async fn search<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
    by_uid: bool,
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_selected(tag, false).await? {
        return Ok(());
    }

    let Some((mailbox, _)) = session.selected_mailbox() else {
        unreachable!("selected gate passed without a mailbox");
    };

    let seq_hits = match mailbox.search(&args[1]) {
        Ok(hits) => hits,
        Err(err) => return session.reject_store_error(tag, &err).await,
    };

    let ids = if by_uid {
        // Resolve each hit to its UID through one bulk query.
        let all = match mailbox.messages_by_seq(&SequenceSet::parse("1:*").expect("valid set")) {
            Ok(all) => all,
            Err(err) => return session.reject_store_error(tag, &err).await,
        };
        seq_hits
            .iter()
            .filter_map(|seq| all.get(*seq as usize - 1).map(|m| m.uid()))
            .collect()
    } else {
        seq_hits
    };

    let mut line = String::from("SEARCH");
    for id in ids {
        line.push_str(&format!(" {id}"));
    }
    session.write_response("", &line).await?;

    let completion = if by_uid {
        "OK UID SEARCH completed"
    } else {
        "OK SEARCH completed"
    };
    session.write_response(tag, completion).await
}
