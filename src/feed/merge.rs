use thiserror::Error;

use super::convert::ConvertError;
use super::{entry_label, timestamp, FeedDocument};
use crate::xml::{Element, Node};

/// Errors raised while merging feeds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// An entry does not have exactly one `<updated>` child at sort time.
    #[error("entry {entry} has {count} <updated> elements, expected exactly one")]
    InvalidEntry { entry: String, count: usize },
    /// A secondary feed could not be turned into Atom.
    #[error("failed to convert secondary feed: {0}")]
    Convert(#[from] ConvertError),
}

/// Absorbs the entries of every secondary document into `primary`, then
/// orders all of the primary's entries by `updated`.
///
/// Secondary documents are consumed. Atom entries are moved across as-is;
/// RSS documents are converted first, with the same rules as the primary, so
/// a secondary without a channel or with a foreign root fails the merge.
/// Imported `updated` values are normalized so they compare correctly against
/// the primary's.
pub fn merge_feeds(
    primary: &mut FeedDocument,
    secondaries: Vec<FeedDocument>,
) -> Result<(), MergeError> {
    for (index, secondary) in secondaries.into_iter().enumerate() {
        let imported = secondary.into_atom()?.into_root().take_children("entry");

        tracing::debug!(
            feed = index + 1,
            entries = imported.len(),
            "Merging secondary feed"
        );
        for mut entry in imported {
            timestamp::normalize_updated(&mut entry);
            primary.push_entry(entry);
        }
    }

    sort_entries(primary)
}

/// Stable sort of the document's entries by the text of their `updated`
/// element. Non-entry children keep their relative order ahead of the entries.
pub fn sort_entries(doc: &mut FeedDocument) -> Result<(), MergeError> {
    let root = doc.root_mut();
    let mut entries: Vec<(String, Element)> = Vec::new();
    let mut others = Vec::with_capacity(root.children.len());

    for node in std::mem::take(&mut root.children) {
        match node {
            Node::Element(el) if el.name == "entry" => {
                let key = sort_key(&el)?;
                entries.push((key, el));
            }
            other => others.push(other),
        }
    }

    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    others.extend(entries.into_iter().map(|(_, el)| Node::Element(el)));
    root.children = others;
    Ok(())
}

fn sort_key(entry: &Element) -> Result<String, MergeError> {
    let mut updated = entry.children_named("updated");
    match (updated.next(), updated.next()) {
        (Some(el), None) => Ok(el.text().trim().to_string()),
        _ => Err(MergeError::InvalidEntry {
            entry: entry_label(entry),
            count: entry.child_count("updated"),
        }),
    }
}
