//! Feed documents and the transformations applied to them.
//!
//! - [`convert`] - RSS channel/item to Atom feed/entry mapping
//! - [`merge`] - Absorbing secondary feeds and ordering entries by `updated`
//! - [`filter`] - Category and age based entry removal
//! - [`timestamp`] - Canonical `updated` values
//! - [`fetcher`] - HTTP retrieval of feeds and article pages
//!
//! # Example
//!
//! ```ignore
//! use atomizer::feed::{FeedDocument, merge_feeds};
//!
//! let primary = FeedDocument::parse(&rss_text)?.into_atom()?;
//! let mut merged = primary;
//! merge_feeds(&mut merged, vec![FeedDocument::parse(&other_text)?])?;
//! println!("{}", merged.to_xml(true)?);
//! ```

mod convert;
mod fetcher;
mod filter;
mod merge;
pub mod timestamp;

pub use convert::{convert_feed, convert_item, ConvertError};
pub use fetcher::{FetchError, HttpClient, HttpSettings};
pub use filter::{remove_by_category, remove_older_than};
pub use merge::{merge_feeds, sort_entries, MergeError};

use crate::xml::{self, Element, Node, XmlError};

/// Atom namespace URI.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// The syndication format of a document, judged by its root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Atom,
    Rss,
    Unknown,
}

/// A feed held as an owned XML tree with exactly one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    root: Element,
}

impl FeedDocument {
    pub fn parse(content: &str) -> Result<Self, XmlError> {
        xml::parse_document(content).map(Self::from_root)
    }

    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// An empty Atom `<feed>` carrying the Atom namespace.
    pub fn new_atom() -> Self {
        Self::from_root(Element::new("feed").with_attr("xmlns", ATOM_NS))
    }

    pub fn kind(&self) -> FeedKind {
        match self.root.name.as_str() {
            "feed" | "atom:feed" => FeedKind::Atom,
            "rss" | "rdf:RDF" => FeedKind::Rss,
            _ => FeedKind::Unknown,
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    /// Converts RSS to Atom; Atom passes through untouched.
    pub fn into_atom(self) -> Result<Self, ConvertError> {
        match self.kind() {
            FeedKind::Atom => Ok(self),
            FeedKind::Rss => convert_feed(self),
            FeedKind::Unknown => Err(ConvertError::UnsupportedRoot(self.root.name)),
        }
    }

    /// Atom entries directly under the root.
    pub fn entries(&self) -> impl Iterator<Item = &Element> {
        self.root.children_named("entry")
    }

    pub fn entry_count(&self) -> usize {
        self.root.child_count("entry")
    }

    pub fn push_entry(&mut self, entry: Element) {
        self.root.push(entry);
    }

    /// Rewrites every entry's `updated` (and the feed's own) in canonical form.
    pub fn normalize_timestamps(&mut self) {
        timestamp::normalize_updated(&mut self.root);
        for node in self.root.children.iter_mut() {
            if let Node::Element(el) = node {
                if el.name == "entry" {
                    timestamp::normalize_updated(el);
                }
            }
        }
    }

    pub fn to_xml(&self, pretty: bool) -> Result<String, XmlError> {
        xml::write_document(&self.root, pretty)
    }
}

/// Returns the `href` of an entry's article link.
///
/// Prefers `rel="alternate"` or an unqualified link, skipping enclosures.
/// RSS-style text links (`<link>https://...</link>`) are accepted as well.
pub fn entry_link(entry: &Element) -> Option<String> {
    let mut fallback = None;
    for link in entry.children_named("link") {
        let rel = link.attr("rel").unwrap_or("alternate");
        let href = link
            .attr("href")
            .map(str::to_string)
            .unwrap_or_else(|| link.text())
            .trim()
            .to_string();
        if href.is_empty() {
            continue;
        }
        if rel == "alternate" {
            return Some(href);
        }
        if rel != "enclosure" && fallback.is_none() {
            fallback = Some(href);
        }
    }
    fallback
}

/// Identifier used when logging about an entry: its `id`, link, or title.
pub fn entry_label(entry: &Element) -> String {
    entry
        .child_text("id")
        .or_else(|| entry_link(entry))
        .or_else(|| entry.child_text("title"))
        .unwrap_or_else(|| "<unidentified entry>".to_string())
}
