//! LOGIN command handler.
//!
//! Credentials travel in the clear; transport security is the
//! deployment's concern (a TLS terminator in front of the listener).

use crate::connection::{Session, SessionState};
use crate::error::Result;
use crate::format::unquote;
use crate::mailstore::MailStore;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

/// Handle LOGIN: validate against the store, move to Authenticated on
/// success. Only permitted in the NotAuthenticated state.
pub(crate) async fn login<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];

    if !matches!(session.state(), SessionState::NotAuthenticated) {
        return session.write_response(tag, "BAD LOGIN not permitted now").await;
    }

    let username = unquote(&args[1]).to_string();
    let password = unquote(&args[2]);

    match session.store().authenticate(&username, password) {
        Ok(Some(user)) => {
            info!("user {username} logged in");
            session.set_authenticated(user);
            session.write_response(tag, "OK LOGIN completed").await
        }
        Ok(None) => session.write_response(tag, "NO authentication failed").await,
        Err(err) => session.reject_store_error(tag, &err).await,
    }
}
