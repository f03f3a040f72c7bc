//! LOGOUT command handler.

use crate::connection::Session;
use crate::error::Result;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handle LOGOUT: untagged BYE, tagged OK, then the terminal state.
/// Permitted in every state.
pub(crate) async fn logout<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    session
        .write_response("", "BYE IMAP4rev1 server logging out")
        .await?;
    session.write_response(tag, "OK LOGOUT completed").await?;
    session.set_logged_out();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{args, authenticated, not_authenticated};

    #[tokio::test]
    async fn bye_precedes_tagged_ok() {
        let mut h = not_authenticated();
        logout(&mut h.session, &args(&["a1"])).await.unwrap();

        assert_eq!(h.session.state().name(), "LoggedOut");
        assert_eq!(
            h.output().await,
            "* BYE IMAP4rev1 server logging out\r\na1 OK LOGOUT completed\r\n"
        );
    }

    #[tokio::test]
    async fn works_from_authenticated_state() {
        let mut h = authenticated();
        logout(&mut h.session, &args(&["a9"])).await.unwrap();
        assert_eq!(h.session.state().name(), "LoggedOut");
    }
}
