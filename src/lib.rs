//! IMAP4rev1 server core
//!
//! A protocol engine for serving mail over IMAP (RFC 3501): the
//! per-connection session state machine, the command dispatcher and
//! response writer, and the sequence-set grammar shared by FETCH,
//! STORE, SEARCH, and COPY. Message persistence is pluggable through
//! the [`mailstore`] trait family; an in-memory reference backend
//! ([`MemStore`]) backs the demo binary and the test harness.
//!
//! ## Serving
//!
//! ```no_run
//! use imapd::{MemStore, Server};
//! use std::sync::Arc;
//!
//! # async fn run() -> imapd::Result<()> {
//! let mut server = Server::new(Arc::new(MemStore::demo()));
//! server.set_addr("127.0.0.1:1143");
//! server.listen_and_serve().await?;
//! # Ok(())
//! # }
//! ```
//!
//! One tokio task runs per connection; commands within a session are
//! handled strictly sequentially, and the mail store is expected to
//! synchronise itself.

mod command;
mod config;
mod connection;
mod error;
pub mod format;
mod handlers;
pub mod mailstore;
mod memstore;
pub mod sequence;
mod server;

pub use config::ServerConfig;
pub use connection::{MailboxMode, Session, SessionState, Transcript};
pub use error::{Error, Result};
pub use mailstore::{Flag, Header, MailStore, Mailbox, Message, StoreAction, User};
pub use memstore::{MemMailbox, MemStore, MemUser};
pub use sequence::{SequenceNumber, SequenceRange, SequenceSet};
pub use server::{test_connection, Server, DEFAULT_ADDR};
