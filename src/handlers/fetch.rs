//! FETCH and UID FETCH command handlers.
//!
//! The response for each matched message is a single
//! `* <seq> FETCH (...)` line. Body sections are transferred as
//! synchronising literals -- `{<length>}\r\n` followed by exactly that
//! many raw octets -- so a response carrying one is assembled into a
//! single buffer and issued as one transport write, keeping transcript
//! interleaving intact.

use crate::connection::{MailboxMode, Session};
use crate::error::Result;
use crate::format::{format_internal_date, split_params};
use crate::mailstore::{Flag, Mailbox, Message, StoreAction};
use crate::sequence::SequenceSet;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handle FETCH (`by_uid = false`) or UID FETCH (`by_uid = true`).
pub(crate) async fn fetch<S: AsyncRead + AsyncWrite + Unpin>(
    session: &mut Session<S>,
    args: &[String],
    by_uid: bool,
) -> Result<()> {
    let tag = &args[0];
    if !session.assert_selected(tag, false).await? {
        return Ok(());
    }

    let set = match SequenceSet::parse(&args[1]) {
        Ok(set) => set,
        Err(err) => return session.write_response(tag, &format!("BAD {err}")).await,
    };

    let items = match parse_items(&args[2], by_uid) {
        Ok(items) => items,
        Err(bad) => {
            return session
                .write_response(tag, &format!("BAD unknown FETCH item {bad}"))
                .await
        }
    };

    let Some((mailbox, mode)) = session.selected_mailbox() else {
        unreachable!("selected gate passed without a mailbox");
    };

    let found = if by_uid {
        mailbox.messages_by_uid(&set)
    } else {
        mailbox.messages_by_seq(&set)
    };
    let messages = match found {
        Ok(messages) => messages,
        Err(err) => return session.reject_store_error(tag, &err).await,
    };

    for message in &messages {
        let mut response = format!("* {} FETCH (", message.sequence_number()).into_bytes();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                response.push(b' ');
            }
            response.extend_from_slice(&render(item, message.as_ref(), &mailbox, mode));
        }
        response.extend_from_slice(b")\r\n");
        session.write_raw(&response).await?;
    }

    let completion = if by_uid {
        "OK UID FETCH completed"
    } else {
        "OK FETCH completed"
    };
    session.write_response(tag, completion).await
}

/// A body section specifier, the part between the brackets of
/// `BODY[...]`.
#[derive(Debug, PartialEq, Eq)]
enum Section {
    /// `BODY[]`: the entire message.
    Full,
    /// `BODY[HEADER]`.
    Header,
    /// `BODY[TEXT]`.
    Text,
    /// `BODY[HEADER.FIELDS (...)]` with the requested field names.
    HeaderFields(Vec<String>),
}

impl Section {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "" => Some(Self::Full),
            "HEADER" => Some(Self::Header),
            "TEXT" => Some(Self::Text),
            _ => {
                let fields = s.strip_prefix("HEADER.FIELDS (")?.strip_suffix(')')?;
                Some(Self::HeaderFields(
                    fields.split_whitespace().map(ToString::to_string).collect(),
                ))
            }
        }
    }

    /// The specifier as echoed back in the response item name.
    fn echo(&self) -> String {
        match self {
            Self::Full => String::new(),
            Self::Header => "HEADER".to_string(),
            Self::Text => "TEXT".to_string(),
            Self::HeaderFields(names) => format!("HEADER.FIELDS ({})", names.join(" ")),
        }
    }
}

/// One requested FETCH data item.
#[derive(Debug, PartialEq, Eq)]
enum FetchItem {
    Flags,
    Uid,
    InternalDate,
    Rfc822Size,
    Envelope,
    /// Bare `BODY`: the non-extensible body structure.
    Body,
    BodyStructure,
    /// `BODY[...]` / `BODY.PEEK[...]` section fetch.
    BodySection { peek: bool, section: Section },
}

impl FetchItem {
    fn parse(item: &str) -> Option<Self> {
        let upper = item.to_ascii_uppercase();
        match upper.as_str() {
            "FLAGS" => Some(Self::Flags),
            "UID" => Some(Self::Uid),
            "INTERNALDATE" => Some(Self::InternalDate),
            "RFC822.SIZE" => Some(Self::Rfc822Size),
            "ENVELOPE" => Some(Self::Envelope),
            "BODY" => Some(Self::Body),
            "BODYSTRUCTURE" => Some(Self::BodyStructure),
            _ => {
                let (peek, inner) = if let Some(rest) = upper.strip_prefix("BODY.PEEK[") {
                    (true, rest)
                } else if let Some(rest) = upper.strip_prefix("BODY[") {
                    (false, rest)
                } else {
                    return None;
                };
                let section = Section::parse(inner.strip_suffix(']')?)?;
                Some(Self::BodySection { peek, section })
            }
        }
    }
}

/// Parse the requested item list, expanding the ALL/FAST/FULL macros
/// and forcing UID into every UID FETCH response. Returns the
/// offending token on failure.
fn parse_items(raw: &str, by_uid: bool) -> std::result::Result<Vec<FetchItem>, String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);

    let mut items = Vec::new();
    for token in split_params(inner) {
        match token.to_ascii_uppercase().as_str() {
            "ALL" => items.extend([
                FetchItem::Flags,
                FetchItem::InternalDate,
                FetchItem::Rfc822Size,
                FetchItem::Envelope,
            ]),
            "FAST" => items.extend([
                FetchItem::Flags,
                FetchItem::InternalDate,
                FetchItem::Rfc822Size,
            ]),
            "FULL" => items.extend([
                FetchItem::Flags,
                FetchItem::InternalDate,
                FetchItem::Rfc822Size,
                FetchItem::Envelope,
                FetchItem::Body,
            ]),
            _ => items.push(FetchItem::parse(&token).ok_or(token)?),
        }
    }

    if by_uid && !items.contains(&FetchItem::Uid) {
        items.push(FetchItem::Uid);
    }
    Ok(items)
}

/// Render one item for one message.
fn render(
    item: &FetchItem,
    message: &dyn Message,
    mailbox: &Arc<dyn Mailbox>,
    mode: MailboxMode,
) -> Vec<u8> {
    match item {
        FetchItem::Flags => format!("FLAGS {}", Flag::list(&message.flags())).into_bytes(),
        FetchItem::Uid => format!("UID {}", message.uid()).into_bytes(),
        FetchItem::InternalDate => format!(
            "INTERNALDATE \"{}\"",
            format_internal_date(&message.internal_date())
        )
        .into_bytes(),
        FetchItem::Rfc822Size => format!("RFC822.SIZE {}", message.size()).into_bytes(),
        FetchItem::Envelope => format!("ENVELOPE {}", envelope(message)).into_bytes(),
        FetchItem::Body => format!("BODY {}", body_structure(message)).into_bytes(),
        FetchItem::BodyStructure => {
            format!("BODYSTRUCTURE {}", body_structure(message)).into_bytes()
        }
        FetchItem::BodySection { peek, section } => {
            let payload = section_payload(section, message);

            if !peek && mode == MailboxMode::ReadWrite && !message.flags().contains(&Flag::Seen) {
                // A non-PEEK body fetch implicitly sets \Seen.
                let _ = mailbox.set_flags(message.uid(), StoreAction::Add, &[Flag::Seen]);
            }

            let mut out =
                format!("BODY[{}] {{{}}}\r\n", section.echo(), payload.len()).into_bytes();
            out.extend_from_slice(&payload);
            out
        }
    }
}

fn section_payload(section: &Section, message: &dyn Message) -> Vec<u8> {
    match section {
        Section::Full => {
            let mut out = message.header().to_wire();
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&message.body());
            out
        }
        Section::Header => {
            let mut out = message.header().to_wire();
            out.extend_from_slice(b"\r\n");
            out
        }
        Section::Text => message.body(),
        Section::HeaderFields(names) => {
            let header = message.header();
            let mut out = Vec::new();
            for name in names {
                if let Some(value) = header.find_key(name) {
                    out.extend_from_slice(name.as_bytes());
                    out.extend_from_slice(b": ");
                    out.extend_from_slice(value.as_bytes());
                    out.extend_from_slice(b"\r\n");
                }
            }
            out.extend_from_slice(b"\r\n");
            out
        }
    }
}

/// ENVELOPE structure: `(date subject from sender reply-to to cc bcc
/// in-reply-to message-id)` with RFC 3501 address lists.
fn envelope(message: &dyn Message) -> String {
    let header = message.header();
    let from = header.find_key("from");

    let fields = [
        quoted_or_nil(header.find_key("date")),
        quoted_or_nil(header.find_key("subject")),
        address_list(from),
        address_list(header.find_key("sender").or(from)),
        address_list(header.find_key("reply-to").or(from)),
        address_list(header.find_key("to")),
        address_list(header.find_key("cc")),
        address_list(header.find_key("bcc")),
        quoted_or_nil(header.find_key("in-reply-to")),
        quoted_or_nil(header.find_key("message-id")),
    ];
    format!("({})", fields.join(" "))
}

/// Single-part text/plain body structure. MIME trees are a real
/// backend's concern; the in-memory store only holds plain messages.
fn body_structure(message: &dyn Message) -> String {
    let body = message.body();
    let lines = body.iter().filter(|&&b| b == b'\n').count();
    format!(
        "(\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" {} {lines})",
        body.len()
    )
}

fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn quoted_or_nil(value: Option<&str>) -> String {
    value.map_or_else(|| "NIL".to_string(), quote)
}

/// Render a header address field as an RFC 3501 address list:
/// `((name adl mailbox host) ...)`, NIL when the field is absent.
fn address_list(value: Option<&str>) -> String {
    let Some(value) = value else {
        return "NIL".to_string();
    };
    let addresses: Vec<String> = value.split(',').map(address).collect();
    format!("({})", addresses.join(" "))
}

/// One address structure from a `Name <local@host>` or bare
/// `local@host` form.
fn address(part: &str) -> String {
    let part = part.trim();

    let (display, addr) = match (part.find('<'), part.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = part[..open].trim().trim_matches('"');
            let name = (!name.is_empty()).then_some(name);
            (name, &part[open + 1..close])
        }
        _ => (None, part),
    };

    let (local, host) = match addr.split_once('@') {
        Some((local, host)) => (local, Some(host)),
        None => (addr, None),
    };

    format!(
        "({} NIL {} {})",
        quoted_or_nil(display),
        quote(local),
        quoted_or_nil(host)
    )
}
