//! In-memory mail store
//!
//! Reference [`MailStore`] backend holding everything in process
//! memory. Serves three roles: the backend behind the demo binary,
//! the store injected by the test harness, and a worked example of the
//! capability set a real backend has to provide.
//!
//! All mutation goes through per-store/per-mailbox `RwLock`s, so the
//! core's assumption that the store synchronises itself holds.

use crate::error::{Error, Result};
use crate::mailstore::{Flag, Header, MailStore, Mailbox, Message, StoreAction, User};
use crate::sequence::SequenceSet;
use chrono::{DateTime, FixedOffset, TimeZone};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory mail store.
pub struct MemStore {
    users: RwLock<HashMap<String, Arc<MemUser>>>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Register an account. Returns the user handle so callers can
    /// seed mailboxes.
    pub fn add_user(&self, username: &str, password: &str) -> Arc<MemUser> {
        let user = Arc::new(MemUser::new(username, password));
        self.users
            .write()
            .expect("user table lock poisoned")
            .insert(username.to_string(), user.clone());
        user
    }

    /// A store pre-seeded with one account (`username` / `password`),
    /// an INBOX holding three messages, and an empty Trash.
    #[must_use]
    pub fn demo() -> Self {
        let store = Self::new();
        let user = store.add_user("username", "password");

        let inbox = user.add_mailbox("INBOX");
        let tz = FixedOffset::east_opt(0).expect("zero offset");

        let msg = |from: &str, subject: &str, body: &str, date: &str| {
            format!(
                "From: {from}\r\nTo: username@example.org\r\nSubject: {subject}\r\n\
                 Date: {date}\r\nMessage-ID: <{subject}@example.org>\r\n\r\n{body}"
            )
        };

        inbox
            .append(
                &[Flag::Seen],
                tz.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap().fixed_offset(),
                msg(
                    "alice@example.org",
                    "welcome",
                    "Welcome to your new mailbox.\r\n",
                    "Tue, 2 Jan 2024 09:00:00 +0000",
                )
                .as_bytes(),
            )
            .expect("seed message");
        inbox
            .append(
                &[],
                tz.with_ymd_and_hms(2024, 1, 3, 11, 30, 0).unwrap().fixed_offset(),
                msg(
                    "bob@example.org",
                    "lunch",
                    "Lunch on Thursday?\r\n",
                    "Wed, 3 Jan 2024 11:30:00 +0000",
                )
                .as_bytes(),
            )
            .expect("seed message");
        inbox
            .append(
                &[],
                tz.with_ymd_and_hms(2024, 1, 4, 16, 45, 0).unwrap().fixed_offset(),
                msg(
                    "carol@example.org",
                    "minutes",
                    "Minutes from the planning meeting attached.\r\n",
                    "Thu, 4 Jan 2024 16:45:00 +0000",
                )
                .as_bytes(),
            )
            .expect("seed message");

        user.add_mailbox("Trash");
        store
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MailStore for MemStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<Arc<dyn User>>> {
        let users = self.users.read().expect("user table lock poisoned");
        Ok(users
            .get(username)
            .filter(|u| u.password == password)
            .map(|u| u.clone() as Arc<dyn User>))
    }
}

/// An account in a [`MemStore`].
pub struct MemUser {
    username: String,
    password: String,
    mailboxes: RwLock<Vec<Arc<MemMailbox>>>,
    subscriptions: RwLock<Vec<String>>,
}

impl MemUser {
    fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            mailboxes: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Create and return a mailbox, for seeding test and demo data.
    pub fn add_mailbox(&self, name: &str) -> Arc<MemMailbox> {
        let mailbox = Arc::new(MemMailbox::new(name));
        self.mailboxes
            .write()
            .expect("mailbox list lock poisoned")
            .push(mailbox.clone());
        mailbox
    }

    fn position(&self, name: &str) -> Option<usize> {
        let mailboxes = self.mailboxes.read().expect("mailbox list lock poisoned");
        mailboxes.iter().position(|m| {
            let mailbox_name = m.name();
            if name.eq_ignore_ascii_case("INBOX") {
                mailbox_name.eq_ignore_ascii_case("INBOX")
            } else {
                mailbox_name == name
            }
        })
    }
}

impl User for MemUser {
    fn username(&self) -> String {
        self.username.clone()
    }

    fn mailboxes(&self) -> Vec<Arc<dyn Mailbox>> {
        let mailboxes = self.mailboxes.read().expect("mailbox list lock poisoned");
        mailboxes.iter().map(|m| m.clone() as Arc<dyn Mailbox>).collect()
    }

    fn mailbox_by_name(&self, name: &str) -> Option<Arc<dyn Mailbox>> {
        let idx = self.position(name)?;
        let mailboxes = self.mailboxes.read().expect("mailbox list lock poisoned");
        Some(mailboxes[idx].clone() as Arc<dyn Mailbox>)
    }

    fn create_mailbox(&self, name: &str) -> Result<()> {
        if self.position(name).is_some() {
            return Err(Error::Store(format!("mailbox {name} already exists")));
        }
        self.add_mailbox(name);
        Ok(())
    }

    fn delete_mailbox(&self, name: &str) -> Result<()> {
        if name.eq_ignore_ascii_case("INBOX") {
            return Err(Error::Store("cannot delete INBOX".to_string()));
        }
        let idx = self
            .position(name)
            .ok_or_else(|| Error::Store(format!("no such mailbox {name}")))?;
        self.mailboxes
            .write()
            .expect("mailbox list lock poisoned")
            .remove(idx);
        Ok(())
    }

    fn rename_mailbox(&self, from: &str, to: &str) -> Result<()> {
        if self.position(to).is_some() {
            return Err(Error::Store(format!("mailbox {to} already exists")));
        }
        let idx = self
            .position(from)
            .ok_or_else(|| Error::Store(format!("no such mailbox {from}")))?;
        let mailboxes = self.mailboxes.read().expect("mailbox list lock poisoned");
        *mailboxes[idx].name.write().expect("mailbox name lock poisoned") = to.to_string();
        Ok(())
    }

    fn subscribe(&self, name: &str) -> Result<()> {
        self.position(name)
            .ok_or_else(|| Error::Store(format!("no such mailbox {name}")))?;
        let mut subs = self.subscriptions.write().expect("subscription lock poisoned");
        if !subs.iter().any(|s| s == name) {
            subs.push(name.to_string());
        }
        Ok(())
    }

    fn unsubscribe(&self, name: &str) -> Result<()> {
        let mut subs = self.subscriptions.write().expect("subscription lock poisoned");
        subs.retain(|s| s != name);
        Ok(())
    }

    fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .read()
            .expect("subscription lock poisoned")
            .clone()
    }
}

struct StoredMessage {
    uid: u32,
    internal_date: DateTime<FixedOffset>,
    flags: Vec<Flag>,
    raw: Vec<u8>,
}

impl StoredMessage {
    fn has(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }
}

struct MailboxState {
    messages: Vec<StoredMessage>,
    uid_next: u32,
}

/// A mailbox in a [`MemStore`].
pub struct MemMailbox {
    name: RwLock<String>,
    uid_validity: u32,
    state: RwLock<MailboxState>,
}

impl MemMailbox {
    fn new(name: &str) -> Self {
        Self {
            name: RwLock::new(name.to_string()),
            uid_validity: 1,
            state: RwLock::new(MailboxState {
                messages: Vec::new(),
                uid_next: 1,
            }),
        }
    }

    fn snapshot(&self, state: &MailboxState, idx: usize) -> Arc<dyn Message> {
        let stored = &state.messages[idx];
        Arc::new(MemMessage {
            sequence_number: u32::try_from(idx + 1).expect("mailbox size fits u32"),
            uid: stored.uid,
            internal_date: stored.internal_date,
            flags: stored.flags.clone(),
            raw: stored.raw.clone(),
        })
    }
}

impl Mailbox for MemMailbox {
    fn name(&self) -> String {
        self.name.read().expect("mailbox name lock poisoned").clone()
    }

    fn uid_validity(&self) -> u32 {
        self.uid_validity
    }

    fn uid_next(&self) -> u32 {
        self.state.read().expect("mailbox lock poisoned").uid_next
    }

    fn flags(&self) -> Vec<Flag> {
        vec![
            Flag::Answered,
            Flag::Flagged,
            Flag::Deleted,
            Flag::Seen,
            Flag::Draft,
        ]
    }

    fn message_count(&self) -> u32 {
        let state = self.state.read().expect("mailbox lock poisoned");
        u32::try_from(state.messages.len()).expect("mailbox size fits u32")
    }

    fn recent_count(&self) -> u32 {
        let state = self.state.read().expect("mailbox lock poisoned");
        let recent = state.messages.iter().filter(|m| m.has(&Flag::Recent)).count();
        u32::try_from(recent).expect("mailbox size fits u32")
    }

    fn first_unseen(&self) -> Option<u32> {
        let state = self.state.read().expect("mailbox lock poisoned");
        state
            .messages
            .iter()
            .position(|m| !m.has(&Flag::Seen))
            .map(|idx| u32::try_from(idx + 1).expect("mailbox size fits u32"))
    }

    fn messages_by_seq(&self, set: &SequenceSet) -> Result<Vec<Arc<dyn Message>>> {
        let state = self.state.read().expect("mailbox lock poisoned");
        let exists = u32::try_from(state.messages.len()).expect("mailbox size fits u32");
        Ok(set
            .expand(exists)
            .into_iter()
            .map(|seq| self.snapshot(&state, seq as usize - 1))
            .collect())
    }

    fn messages_by_uid(&self, set: &SequenceSet) -> Result<Vec<Arc<dyn Message>>> {
        let state = self.state.read().expect("mailbox lock poisoned");
        let last_uid = state.messages.last().map_or(0, |m| m.uid);
        let mut out = Vec::new();
        for idx in 0..state.messages.len() {
            if set.contains(state.messages[idx].uid, last_uid) {
                out.push(self.snapshot(&state, idx));
            }
        }
        Ok(out)
    }

    fn set_flags(&self, uid: u32, action: StoreAction, flags: &[Flag]) -> Result<Vec<Flag>> {
        let mut state = self.state.write().expect("mailbox lock poisoned");
        let stored = state
            .messages
            .iter_mut()
            .find(|m| m.uid == uid)
            .ok_or_else(|| Error::Store(format!("no message with uid {uid}")))?;

        match action {
            StoreAction::Replace => {
                // \Recent is session-managed and survives a replace.
                let recent = stored.has(&Flag::Recent);
                stored.flags = flags.to_vec();
                if recent && !stored.has(&Flag::Recent) {
                    stored.flags.push(Flag::Recent);
                }
            }
            StoreAction::Add => {
                for flag in flags {
                    if !stored.has(flag) {
                        stored.flags.push(flag.clone());
                    }
                }
            }
            StoreAction::Remove => {
                stored.flags.retain(|f| !flags.contains(f));
            }
        }

        Ok(stored.flags.clone())
    }

    fn append(
        &self,
        flags: &[Flag],
        internal_date: DateTime<FixedOffset>,
        raw: &[u8],
    ) -> Result<u32> {
        let mut state = self.state.write().expect("mailbox lock poisoned");
        let uid = state.uid_next;
        state.uid_next += 1;
        state.messages.push(StoredMessage {
            uid,
            internal_date,
            flags: flags.to_vec(),
            raw: raw.to_vec(),
        });
        Ok(uid)
    }

    fn expunge(&self) -> Result<Vec<u32>> {
        let mut state = self.state.write().expect("mailbox lock poisoned");
        let mut expunged = Vec::new();
        // Remove one at a time so each recorded sequence number
        // reflects the renumbering caused by earlier removals.
        while let Some(idx) = state.messages.iter().position(|m| m.has(&Flag::Deleted)) {
            state.messages.remove(idx);
            expunged.push(u32::try_from(idx + 1).expect("mailbox size fits u32"));
        }
        Ok(expunged)
    }

    fn search(&self, criteria: &str) -> Result<Vec<u32>> {
        let state = self.state.read().expect("mailbox lock poisoned");
        let exists = u32::try_from(state.messages.len()).expect("mailbox size fits u32");
        let last_uid = state.messages.last().map_or(0, |m| m.uid);

        let predicates = parse_criteria(criteria)?;
        let mut out = Vec::new();
        for (idx, stored) in state.messages.iter().enumerate() {
            let seq = u32::try_from(idx + 1).expect("mailbox size fits u32");
            if predicates
                .iter()
                .all(|p| p.matches(stored, seq, exists, last_uid))
            {
                out.push(seq);
            }
        }
        Ok(out)
    }
}

/// One parsed SEARCH criterion.
enum Criterion {
    All,
    FlagSet(Flag),
    FlagClear(Flag),
    New,
    Uid(SequenceSet),
    Seq(SequenceSet),
    HeaderContains(&'static str, String),
    TextContains(String),
}

impl Criterion {
    fn matches(&self, stored: &StoredMessage, seq: u32, exists: u32, last_uid: u32) -> bool {
        match self {
            Self::All => true,
            Self::FlagSet(flag) => stored.has(flag),
            Self::FlagClear(flag) => !stored.has(flag),
            Self::New => stored.has(&Flag::Recent) && !stored.has(&Flag::Seen),
            Self::Uid(set) => set.contains(stored.uid, last_uid),
            Self::Seq(set) => set.contains(seq, exists),
            Self::HeaderContains(name, needle) => Header::parse(&stored.raw)
                .find_key(name)
                .is_some_and(|v| v.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())),
            Self::TextContains(needle) => String::from_utf8_lossy(&stored.raw)
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
        }
    }
}

/// Parse a flat criteria string into AND-ed predicates. Covers the
/// flag keywords, UID sets, bare sequence sets, and the common
/// header/text substring searches.
fn parse_criteria(criteria: &str) -> Result<Vec<Criterion>> {
    let mut out = Vec::new();
    let mut tokens = criteria.split_whitespace();

    let value = |tokens: &mut std::str::SplitWhitespace<'_>| {
        tokens
            .next()
            .map(|t| crate::format::unquote(t).to_string())
            .ok_or_else(|| Error::Store(format!("missing search argument in {criteria:?}")))
    };

    while let Some(token) = tokens.next() {
        match token.to_ascii_uppercase().as_str() {
            "ALL" => out.push(Criterion::All),
            "SEEN" => out.push(Criterion::FlagSet(Flag::Seen)),
            "UNSEEN" => out.push(Criterion::FlagClear(Flag::Seen)),
            "ANSWERED" => out.push(Criterion::FlagSet(Flag::Answered)),
            "UNANSWERED" => out.push(Criterion::FlagClear(Flag::Answered)),
            "FLAGGED" => out.push(Criterion::FlagSet(Flag::Flagged)),
            "UNFLAGGED" => out.push(Criterion::FlagClear(Flag::Flagged)),
            "DELETED" => out.push(Criterion::FlagSet(Flag::Deleted)),
            "UNDELETED" => out.push(Criterion::FlagClear(Flag::Deleted)),
            "DRAFT" => out.push(Criterion::FlagSet(Flag::Draft)),
            "UNDRAFT" => out.push(Criterion::FlagClear(Flag::Draft)),
            "RECENT" => out.push(Criterion::FlagSet(Flag::Recent)),
            "OLD" => out.push(Criterion::FlagClear(Flag::Recent)),
            "NEW" => out.push(Criterion::New),
            "UID" => {
                let set = SequenceSet::parse(&value(&mut tokens)?)
                    .map_err(|e| Error::Store(e.to_string()))?;
                out.push(Criterion::Uid(set));
            }
            "FROM" => out.push(Criterion::HeaderContains("from", value(&mut tokens)?)),
            "TO" => out.push(Criterion::HeaderContains("to", value(&mut tokens)?)),
            "SUBJECT" => out.push(Criterion::HeaderContains("subject", value(&mut tokens)?)),
            "TEXT" | "BODY" => out.push(Criterion::TextContains(value(&mut tokens)?)),
            _ => {
                if let Ok(set) = SequenceSet::parse(token) {
                    out.push(Criterion::Seq(set));
                } else {
                    return Err(Error::Store(format!("unsupported search key {token:?}")));
                }
            }
        }
    }

    if out.is_empty() {
        out.push(Criterion::All);
    }
    Ok(out)
}

/// Immutable snapshot of a stored message at query time.
struct MemMessage {
    sequence_number: u32,
    uid: u32,
    internal_date: DateTime<FixedOffset>,
    flags: Vec<Flag>,
    raw: Vec<u8>,
}

impl MemMessage {
    /// Offset of the body text, just past the header separator.
    fn body_offset(&self) -> usize {
        self.raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map_or(self.raw.len(), |p| p + 4)
    }
}

impl Message for MemMessage {
    fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    fn uid(&self) -> u32 {
        self.uid
    }

    fn internal_date(&self) -> DateTime<FixedOffset> {
        self.internal_date
    }

    fn size(&self) -> u32 {
        u32::try_from(self.raw.len()).expect("message size fits u32")
    }

    fn flags(&self) -> Vec<Flag> {
        self.flags.clone()
    }

    fn header(&self) -> Header {
        Header::parse(&self.raw)
    }

    fn body(&self) -> Vec<u8> {
        self.raw[self.body_offset()..].to_vec()
    }
}
