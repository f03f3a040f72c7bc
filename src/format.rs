//! Wire formatting helpers
//!
//! Date formats and the argument splitter shared by the command
//! handlers. IMAP emits two date renderings: the RFC 2822 form inside
//! ENVELOPE data and the INTERNALDATE form of the FETCH item.

use chrono::{DateTime, FixedOffset};

/// RFC 822 date format used in ENVELOPE responses,
/// e.g. `Mon, 2 Jan 2006 15:04:05 +0700`.
pub const RFC822_DATE: &str = "%a, %-d %b %Y %H:%M:%S %z";

/// Date format of the INTERNALDATE fetch item,
/// e.g. `02-Jan-2006 15:04:05 +0700`.
pub const INTERNAL_DATE: &str = "%d-%b-%Y %H:%M:%S %z";

/// Render a timestamp in the ENVELOPE (RFC 822) form.
#[must_use]
pub fn format_rfc822_date(date: &DateTime<FixedOffset>) -> String {
    date.format(RFC822_DATE).to_string()
}

/// Render a timestamp in the INTERNALDATE form.
#[must_use]
pub fn format_internal_date(date: &DateTime<FixedOffset>) -> String {
    date.format(INTERNAL_DATE).to_string()
}

/// Split a parameter list on spaces, keeping `[...]` regions intact.
///
/// FETCH items such as `BODY[HEADER.FIELDS (FROM TO)]` contain spaces
/// inside their bracketed section specifier; those must survive as one
/// token:
///
/// ```
/// use imapd::format::split_params;
///
/// let items = split_params("UID BODY[HEADER.FIELDS (FROM TO)] FLAGS");
/// assert_eq!(items, vec!["UID", "BODY[HEADER.FIELDS (FROM TO)]", "FLAGS"]);
/// ```
#[must_use]
pub fn split_params(params: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut depth: u32 = 0;

    for c in params.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ' ' if depth == 0 => {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

/// Strip one pair of surrounding double quotes, if present.
///
/// Mailbox names and LOGIN arguments may arrive either bare or quoted;
/// handlers normalise through this before touching the store.
#[must_use]
pub fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}
