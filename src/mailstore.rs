//! Mail-store interface
//!
//! The narrow capability set the protocol engine requires from any
//! backend. The core never touches message persistence directly: it
//! authenticates through [`MailStore`], walks mailboxes through
//! [`User`], and reads/mutates messages through [`Mailbox`] and
//! [`Message`].
//!
//! The traits are synchronous by design -- store calls are one of the
//! session's two blocking points, and backends provide their own
//! internal synchronisation.

use crate::error::Result;
use crate::sequence::SequenceSet;
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::sync::Arc;

/// An IMAP message flag.
///
/// System flags (prefixed with `\` on the wire) have dedicated
/// variants. User-defined keyword flags use [`Flag::Keyword`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read (`\Seen`).
    Seen,
    /// Message has been answered (`\Answered`).
    Answered,
    /// Message is flagged for attention (`\Flagged`).
    Flagged,
    /// Message is marked for deletion (`\Deleted`).
    Deleted,
    /// Message is a draft (`\Draft`).
    Draft,
    /// Message arrived since the mailbox was last selected (`\Recent`).
    Recent,
    /// A user-defined keyword flag (no `\` prefix).
    Keyword(String),
}

impl Flag {
    /// The IMAP wire representation of this flag.
    #[must_use]
    pub fn as_imap_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Keyword(kw) => kw,
        }
    }

    /// Parse a wire token back into a flag. System flag names are
    /// matched case-insensitively; anything else becomes a keyword.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "\\seen" => Self::Seen,
            "\\answered" => Self::Answered,
            "\\flagged" => Self::Flagged,
            "\\deleted" => Self::Deleted,
            "\\draft" => Self::Draft,
            "\\recent" => Self::Recent,
            _ => Self::Keyword(token.to_string()),
        }
    }

    /// Render a flag list the way FLAGS responses expect it:
    /// `(\Seen \Deleted)`.
    #[must_use]
    pub fn list(flags: &[Self]) -> String {
        let parts: Vec<&str> = flags.iter().map(Self::as_imap_str).collect();
        format!("({})", parts.join(" "))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

/// What a STORE command does with its flag list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    /// `FLAGS`: replace the message's flags with the given list.
    Replace,
    /// `+FLAGS`: add the given flags.
    Add,
    /// `-FLAGS`: remove the given flags.
    Remove,
}

/// A parsed RFC 2822 header block.
///
/// Field order is preserved; lookups are case-insensitive. Folded
/// continuation lines are unfolded during parsing.
#[derive(Debug, Clone, Default)]
pub struct Header {
    fields: Vec<(String, String)>,
}

impl Header {
    /// Parse a header block from raw bytes (everything before the
    /// blank line of an RFC 2822 message).
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                // Folded continuation of the previous field.
                if let Some((_, value)) = fields.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
            } else if let Some((name, value)) = line.split_once(':') {
                fields.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        Self { fields }
    }

    /// Look up a field by name, case-insensitively.
    #[must_use]
    pub fn find_key(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All fields in original order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Re-render the header block in wire form, one `Name: value`
    /// line per field, CRLF terminated.
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.fields {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out
    }
}

/// A mail-store backend: the authentication entry point shared by all
/// sessions.
pub trait MailStore: Send + Sync {
    /// Validate credentials. `Ok(None)` means authentication failed;
    /// `Err` means the backend itself broke.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<Arc<dyn User>>>;
}

/// An authenticated account and its mailbox namespace.
pub trait User: Send + Sync {
    fn username(&self) -> String;

    /// All mailboxes visible to this user.
    fn mailboxes(&self) -> Vec<Arc<dyn Mailbox>>;

    /// Look up a mailbox by name. INBOX is case-insensitive per
    /// RFC 3501 Section 5.1.
    fn mailbox_by_name(&self, name: &str) -> Option<Arc<dyn Mailbox>>;

    fn create_mailbox(&self, name: &str) -> Result<()>;
    fn delete_mailbox(&self, name: &str) -> Result<()>;
    fn rename_mailbox(&self, from: &str, to: &str) -> Result<()>;

    fn subscribe(&self, name: &str) -> Result<()>;
    fn unsubscribe(&self, name: &str) -> Result<()>;
    fn subscriptions(&self) -> Vec<String>;
}

/// A single mailbox: message access and mutation.
pub trait Mailbox: Send + Sync {
    fn name(&self) -> String;

    /// UIDVALIDITY epoch; changes only when the UID space is reset.
    fn uid_validity(&self) -> u32;

    /// The UID the next arriving message will receive.
    fn uid_next(&self) -> u32;

    /// Flags applicable in this mailbox.
    fn flags(&self) -> Vec<Flag>;

    fn message_count(&self) -> u32;
    fn recent_count(&self) -> u32;

    /// Sequence number of the first unseen message, if any.
    fn first_unseen(&self) -> Option<u32>;

    /// Messages addressed by sequence number.
    fn messages_by_seq(&self, set: &SequenceSet) -> Result<Vec<Arc<dyn Message>>>;

    /// Messages addressed by UID.
    fn messages_by_uid(&self, set: &SequenceSet) -> Result<Vec<Arc<dyn Message>>>;

    /// Apply a flag mutation to the message with the given UID and
    /// return the resulting flag list.
    fn set_flags(&self, uid: u32, action: StoreAction, flags: &[Flag]) -> Result<Vec<Flag>>;

    /// Add a message; used by COPY. Returns the assigned UID.
    fn append(
        &self,
        flags: &[Flag],
        internal_date: DateTime<FixedOffset>,
        raw: &[u8],
    ) -> Result<u32>;

    /// Remove all `\Deleted` messages; returns the expunged sequence
    /// numbers in the order they were removed.
    fn expunge(&self) -> Result<Vec<u32>>;

    /// Evaluate a SEARCH criteria string; returns matching sequence
    /// numbers in mailbox order.
    fn search(&self, criteria: &str) -> Result<Vec<u32>>;
}

/// A single message within a mailbox.
pub trait Message: Send + Sync {
    /// 1-based position within the mailbox; changes when earlier
    /// messages are expunged.
    fn sequence_number(&self) -> u32;

    /// Stable per-mailbox identifier.
    fn uid(&self) -> u32;

    fn internal_date(&self) -> DateTime<FixedOffset>;

    /// Size of the full RFC 2822 message in octets.
    fn size(&self) -> u32;

    fn flags(&self) -> Vec<Flag>;

    fn header(&self) -> Header;

    /// The message text after the header block.
    fn body(&self) -> Vec<u8>;
}
