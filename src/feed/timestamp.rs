//! Timestamp normalization for `updated` values.
//!
//! Entry order after a merge is a plain string comparison on `updated`, so
//! every timestamp is rewritten to RFC 3339 UTC at ingestion. Values that are
//! neither RFC 2822 (RSS `pubDate`) nor RFC 3339 (Atom) are kept as written.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::xml::{Element, Node};

/// Parses an RSS or Atom timestamp into a UTC instant.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonical textual form: RFC 3339 UTC with second precision, or the
/// trimmed input when it cannot be parsed.
pub fn normalize_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => format_timestamp(dt),
        None => raw.trim().to_string(),
    }
}

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Rewrites the text of every `updated` child of `el` in canonical form.
pub fn normalize_updated(el: &mut Element) {
    for child in el.children.iter_mut().filter_map(Node::as_element_mut) {
        if child.name == "updated" {
            let normalized = normalize_timestamp(&child.text());
            child.children = vec![Node::Text(normalized)];
        }
    }
}
