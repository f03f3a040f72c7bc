//! Mailbox namespace handlers: CREATE, DELETE, RENAME, SUBSCRIBE,
//! UNSUBSCRIBE.
//!
//! Thin wrappers over the store's namespace operations; the store
//! decides what is legal (e.g. INBOX cannot be deleted).

use crate::connection::Session;
use crate::error::Result;
use crate::format::unquote;
use crate::mailstore::User;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Common gate for all namespace commands: authenticated, user in
/// hand. Emits the rejection and returns `None` otherwise.
async fn gate<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    tag: &str,
) -> Result<Option<Arc<dyn User>>> {
    if !session.assert_authenticated(tag).await? {
        return Ok(None);
    }
    let Some(user) = session.current_user() else {
        unreachable!("authenticated gate passed without a user");
    };
    Ok(Some(user))
}

/// Handle CREATE: add a mailbox to the namespace.
pub(crate) async fn create<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    let Some(user) = gate(session, tag).await? else {
        return Ok(());
    };

    match user.create_mailbox(unquote(&args[1])) {
        Ok(()) => session.write_response(tag, "OK CREATE completed").await,
        Err(err) => session.reject_store_error(tag, &err).await,
    }
}

/// Handle DELETE: remove a mailbox from the namespace.
pub(crate) async fn delete<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    let Some(user) = gate(session, tag).await? else {
        return Ok(());
    };

    match user.delete_mailbox(unquote(&args[1])) {
        Ok(()) => session.write_response(tag, "OK DELETE completed").await,
        Err(err) => session.reject_store_error(tag, &err).await,
    }
}

/// Handle RENAME: move a mailbox to a new name.
pub(crate) async fn rename<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    let Some(user) = gate(session, tag).await? else {
        return Ok(());
    };

    match user.rename_mailbox(unquote(&args[1]), unquote(&args[2])) {
        Ok(()) => session.write_response(tag, "OK RENAME completed").await,
        Err(err) => session.reject_store_error(tag, &err).await,
    }
}

/// Handle SUBSCRIBE: add a mailbox to the subscription list.
pub(crate) async fn subscribe<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    let Some(user) = gate(session, tag).await? else {
        return Ok(());
    };

    match user.subscribe(unquote(&args[1])) {
        Ok(()) => session.write_response(tag, "OK SUBSCRIBE completed").await,
        Err(err) => session.reject_store_error(tag, &err).await,
    }
}

/// Handle UNSUBSCRIBE: drop a mailbox from the subscription list.
pub(crate) async fn unsubscribe<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
) -> Result<()> {
    let tag = &args[0];
    let Some(user) = gate(session, tag).await? else {
        return Ok(());
    };

    match user.unsubscribe(unquote(&args[1])) {
        Ok(()) => session.write_response(tag, "OK UNSUBSCRIBE completed").await,
        Err(err) => session.reject_store_error(tag, &err).await,
    }
}
