use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

/// A single `(username, timestamp)` pair read from a relationship list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub username: String,
    /// Seconds since the Unix epoch, when the export includes one.
    pub timestamp: Option<i64>,
}

/// Entries parsed from one archive member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMember {
    pub entries: Vec<RawEntry>,
    /// Entries present in the JSON that carried no recognisable username.
    pub skipped: usize,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    string_list_data: Vec<StringListData>,
}

#[derive(Deserialize)]
struct StringListData {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

/// Parse a relationship list member.
///
/// Accepted shapes are a top-level array of entries, or an object whose first
/// array-valued property, in document order, holds the entries
/// (`{"relationships_following": [...]}`).
/// The username of an entry is the first non-empty of
/// `string_list_data[0].value`, `title`, or the last path segment of
/// `string_list_data[0].href`.
///
/// # Errors
///
/// - [`MalformedJson`](ErrorKind::MalformedJson) if the bytes aren't JSON.
/// - [`InvalidStructure`](ErrorKind::InvalidStructure) for any other shape.
#[instrument(skip(bytes), fields(member_size = bytes.len()))]
pub fn parse_member(bytes: &[u8]) -> Result<ParsedMember> {
    let document: Value = serde_json::from_slice(bytes).or_raise(|| ErrorKind::MalformedJson)?;
    let items = match document {
        Value::Array(items) => items,
        Value::Object(map) => match map.into_iter().find_map(|(_, v)| match v {
            Value::Array(items) => Some(items),
            _ => None,
        }) {
            Some(items) => items,
            None => exn::bail!(ErrorKind::InvalidStructure("object without an entry list")),
        },
        _ => exn::bail!(ErrorKind::InvalidStructure("expected an array or an object")),
    };
    let mut parsed = ParsedMember { entries: Vec::with_capacity(items.len()), skipped: 0 };
    for item in items {
        match serde_json::from_value::<Entry>(item).ok().and_then(entry_to_raw) {
            Some(entry) => parsed.entries.push(entry),
            None => parsed.skipped += 1,
        }
    }
    if parsed.skipped > 0 {
        tracing::debug!(skipped = parsed.skipped, "Entries without a username were skipped");
    }
    Ok(parsed)
}

fn entry_to_raw(entry: Entry) -> Option<RawEntry> {
    let first = entry.string_list_data.into_iter().next();
    let (value, href, timestamp) = match first {
        Some(data) => (data.value, data.href, data.timestamp),
        None => (None, None, None),
    };
    let username = value
        .as_deref()
        .and_then(clean_username)
        .or_else(|| entry.title.as_deref().and_then(clean_username))
        .or_else(|| href.as_deref().and_then(username_from_href))?;
    Some(RawEntry { username, timestamp })
}

fn clean_username(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('@').trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn username_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.trim_end_matches('/').rsplit('/').next().and_then(clean_username).filter(|name| !name.contains(':'))
}

/// Case-insensitive key used to merge the same account across lists.
pub fn username_key(username: &str) -> String {
    username.to_lowercase()
}
