//! CAPABILITY command handler.

use crate::connection::Session;
use crate::error::Result;
use tokio::io::{AsyncRead, AsyncWrite};

/// Capabilities advertised to every client. UNSELECT (RFC 3691) is
/// the only extension the core implements.
const CAPABILITIES: &str = "IMAP4rev1 UNSELECT";

/// Handle CAPABILITY: one untagged capability listing, then OK.
/// Permitted in every state from NotAuthenticated on.
pub(crate) async fn capability<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    session
        .write_response("", &format!("CAPABILITY {CAPABILITIES}"))
        .await?;
    session.write_response(tag, "OK CAPABILITY completed").await
}
