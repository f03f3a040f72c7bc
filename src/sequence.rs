//! IMAP sequence numbers, ranges, and sets
//!
//! Implements the message-set grammar shared by FETCH, STORE, SEARCH,
//! and COPY (RFC 3501 Section 9, `sequence-set`):
//!
//! ```text
//! seq-number = 1*DIGIT / "*"
//! seq-range  = seq-number [ ":" seq-number ]
//! seq-set    = seq-range *( "," seq-range )
//! ```
//!
//! `*` denotes the largest sequence number (or UID) currently in the
//! mailbox, so a sequence number is a sum of three cases -- a concrete
//! value, the "last" sentinel, and absent -- rather than an integer.

use crate::error::{Error, Result};
use std::fmt;

/// A single IMAP sequence number.
///
/// # Examples
///
/// ```
/// use imapd::SequenceNumber;
///
/// let n = SequenceNumber::parse("56").unwrap();
/// assert_eq!(n.value().unwrap(), 56);
///
/// let last = SequenceNumber::parse("*").unwrap();
/// assert!(last.is_last());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceNumber {
    /// A concrete 1-based message sequence number or UID.
    Value(u32),
    /// The `*` sentinel: the largest number currently in the mailbox.
    Last,
    /// No number at all (the absent max of a single-number range).
    Nil,
}

impl SequenceNumber {
    /// Parse a sequence number token.
    ///
    /// The empty string parses to [`SequenceNumber::Nil`] and `*` to
    /// [`SequenceNumber::Last`]; anything else must be decimal digits.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Self::Nil),
            "*" => Ok(Self::Last),
            _ => s
                .parse::<u32>()
                .map(Self::Value)
                .map_err(|_| Error::InvalidSequenceNumber(s.to_string())),
        }
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        matches!(self, Self::Last)
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// The concrete numeric value.
    ///
    /// # Errors
    ///
    /// Fails for [`SequenceNumber::Last`] and [`SequenceNumber::Nil`],
    /// which have no value independent of a mailbox.
    pub fn value(&self) -> Result<u32> {
        match self {
            Self::Value(v) => Ok(*v),
            Self::Last => Err(Error::InvalidSequenceNumber("*".to_string())),
            Self::Nil => Err(Error::InvalidSequenceNumber(String::new())),
        }
    }

    /// Resolve against a mailbox holding `exists` messages: `*` becomes
    /// `exists`. [`SequenceNumber::Nil`] has no resolution.
    fn resolve(&self, exists: u32) -> Option<u32> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Last => Some(exists),
            Self::Nil => None,
        }
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Last => f.write_str("*"),
            Self::Nil => Ok(()),
        }
    }
}

/// One element of a sequence set: a single number or an inclusive range.
///
/// Parsing canonicalises the pair so that a numeric `min` never exceeds
/// a numeric `max`, and the `*` sentinel always ends up in `max`
/// (`*:16` means the same as `16:*`). A single number is represented
/// with a [`SequenceNumber::Nil`] max.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    pub min: SequenceNumber,
    pub max: SequenceNumber,
}

impl SequenceRange {
    /// Parse one `seq-range` token, e.g. `35`, `4:14`, `18:*`.
    ///
    /// # Errors
    ///
    /// Any token that is not a valid range -- `5*`, `hello`, an empty
    /// element -- is an [`Error::InvalidRange`] carrying the input.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidRange(s.to_string());

        match s.split_once(':') {
            None => {
                let min = SequenceNumber::parse(s).map_err(|_| invalid())?;
                if min.is_nil() {
                    return Err(invalid());
                }
                Ok(Self {
                    min,
                    max: SequenceNumber::Nil,
                })
            }
            Some((a, b)) => {
                let min = SequenceNumber::parse(a).map_err(|_| invalid())?;
                let max = SequenceNumber::parse(b).map_err(|_| invalid())?;
                if min.is_nil() || max.is_nil() {
                    return Err(invalid());
                }
                Ok(Self::canonical(min, max))
            }
        }
    }

    /// Order a parsed pair: `*:*` collapses to a single `*`, a leading
    /// `*` moves to the max side, and numeric pairs swap so min <= max.
    fn canonical(min: SequenceNumber, max: SequenceNumber) -> Self {
        match (min, max) {
            (SequenceNumber::Last, SequenceNumber::Last) => Self {
                min: SequenceNumber::Last,
                max: SequenceNumber::Nil,
            },
            (SequenceNumber::Last, max @ SequenceNumber::Value(_)) => Self {
                min: max,
                max: SequenceNumber::Last,
            },
            (SequenceNumber::Value(a), SequenceNumber::Value(b)) if a > b => Self {
                min: SequenceNumber::Value(b),
                max: SequenceNumber::Value(a),
            },
            (min, max) => Self { min, max },
        }
    }

    /// Whether `n` falls inside this range when `*` resolves to
    /// `last`. Unlike [`SequenceRange::expand`] the interval is not
    /// clamped, so this also serves UID addressing where identifiers
    /// are not dense.
    #[must_use]
    pub fn contains(&self, n: u32, last: u32) -> bool {
        let Some(a) = self.min.resolve(last) else {
            return false;
        };
        let b = self.max.resolve(last).unwrap_or(a);
        (a.min(b)..=a.max(b)).contains(&n)
    }

    /// Expand to concrete sequence numbers against a mailbox holding
    /// `exists` messages: the inclusive interval between the resolved
    /// endpoints (order-normalised) intersected with `1..=exists`.
    #[must_use]
    pub fn expand(&self, exists: u32) -> Vec<u32> {
        if exists == 0 {
            return Vec::new();
        }

        let Some(a) = self.min.resolve(exists) else {
            return Vec::new();
        };
        let b = self.max.resolve(exists).unwrap_or(a);

        let lo = a.min(b).max(1);
        let hi = a.max(b).min(exists);
        (lo..=hi).collect()
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max.is_nil() {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}:{}", self.min, self.max)
        }
    }
}

/// An ordered list of ranges parsed from a comma-separated sequence
/// set, preserving input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet(pub Vec<SequenceRange>);

impl SequenceSet {
    /// Parse a full `seq-set`, e.g. `1,3,8:14,18:*`.
    ///
    /// # Errors
    ///
    /// Any element failing to parse surfaces as
    /// [`Error::InvalidSequenceSet`] carrying the whole input.
    pub fn parse(s: &str) -> Result<Self> {
        let ranges = s
            .split(',')
            .map(SequenceRange::parse)
            .collect::<Result<Vec<_>>>()
            .map_err(|_| Error::InvalidSequenceSet(s.to_string()))?;
        Ok(Self(ranges))
    }

    /// Whether `n` falls inside any range when `*` resolves to `last`.
    #[must_use]
    pub fn contains(&self, n: u32, last: u32) -> bool {
        self.0.iter().any(|r| r.contains(n, last))
    }

    /// Expand every range against a mailbox of `exists` messages,
    /// preserving first-occurrence order and collapsing duplicates.
    #[must_use]
    pub fn expand(&self, exists: u32) -> Vec<u32> {
        let mut out = Vec::new();
        for range in &self.0 {
            for n in range.expand(exists) {
                if !out.contains(&n) {
                    out.push(n);
                }
            }
        }
        out
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}
