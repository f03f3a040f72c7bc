//! IMAP command handlers
//!
//! One module per command family. Every handler receives the session
//! and the dispatcher's positional captures (`args[0]` is the tag),
//! checks the state gates, parses its arguments, queries the mail
//! store, and emits its responses through the session writer.

mod capability;
mod close;
mod copy;
mod fetch;
mod list;
mod login;
mod logout;
mod manage;
mod noop;
mod search;
mod select;
mod store;

pub(crate) use capability::capability;
pub(crate) use close::{close, unselect};
pub(crate) use copy::copy;
pub(crate) use fetch::fetch;
pub(crate) use list::{list, lsub};
pub(crate) use login::login;
pub(crate) use logout::logout;
pub(crate) use manage::{create, delete, rename, subscribe, unsubscribe};
pub(crate) use noop::noop;
pub(crate) use search::search;
pub(crate) use select::select;
pub(crate) use store::store;
