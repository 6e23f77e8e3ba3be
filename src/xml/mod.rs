//! Owned XML element tree used for every feed document.
//!
//! Feeds are small enough to hold in memory, and every transformation in this
//! crate (conversion, merging, enrichment) is a structural edit: move a child
//! from one parent to another, rename an element, append a new one. An owned
//! tree makes those edits plain Rust moves instead of DOM bookkeeping.
//!
//! - [`reader`] - Parses text into a tree using `quick-xml`'s pull parser
//! - [`writer`] - Serializes a tree back to text (compact or indented)
//! - [`builder`] - Constructors for the Atom elements this crate emits

mod builder;
mod reader;
mod writer;

pub use builder::{enclosure_element, link_element, text_element};
pub use reader::parse_document;
pub use writer::write_document;

use std::borrow::Cow;

use thiserror::Error;

/// Errors raised while reading or writing XML text.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The input is not well-formed XML.
    #[error("XML parse error at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    /// The input contains no root element.
    #[error("document has no root element")]
    NoRoot,

    /// The input has content after the root element closed.
    #[error("document has more than one root element")]
    MultipleRoots,

    /// An end tag did not match the open element.
    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag { expected: String, found: String },

    /// Serialization failed.
    #[error("failed to write XML: {0}")]
    Write(String),
}

/// A node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// True if this node is an element with the given qualified name.
    pub fn is_element(&self, name: &str) -> bool {
        matches!(self, Node::Element(el) if el.name == name)
    }
}

/// An element and its owned subtree.
///
/// Names are kept exactly as written in the source, prefix included
/// (`atom:link`, `dc:creator`), so lookups are by qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style text child.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Builder-style element child.
    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing any existing value for the key.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .find(|el| el.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|el| el.name == name)
    }

    /// Direct child elements with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(move |el| el.name == name)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_count(&self, name: &str) -> usize {
        self.children_named(name).count()
    }

    /// Removes and returns the first direct child element with the given name.
    pub fn take_child(&mut self, name: &str) -> Option<Element> {
        let idx = self.children.iter().position(|n| n.is_element(name))?;
        match self.children.remove(idx) {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Removes and returns every direct child element with the given name.
    pub fn take_children(&mut self, name: &str) -> Vec<Element> {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.children.len());
        for node in std::mem::take(&mut self.children) {
            match node {
                Node::Element(el) if el.name == name => taken.push(el),
                other => kept.push(other),
            }
        }
        self.children = kept;
        taken
    }

    /// Keeps only the direct child elements for which `keep` returns true.
    /// Non-element children are always kept. Returns how many were removed.
    pub fn retain_children<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Element) -> bool,
    {
        let before = self.children.len();
        self.children.retain(|node| match node {
            Node::Element(el) => keep(el),
            _ => true,
        });
        before - self.children.len()
    }

    /// Concatenated text and CDATA content of the direct children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Text of the first child with the given name, trimmed; `None` if the
    /// child is absent or blank.
    pub fn child_text(&self, name: &str) -> Option<String> {
        let text = self.child(name)?.text();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Recursively removes every node for which `remove` returns true.
    /// The element itself is never passed to `remove`.
    pub fn remove_nodes_where<F>(&mut self, remove: &mut F)
    where
        F: FnMut(&Node) -> bool,
    {
        self.children.retain(|node| !remove(node));
        for node in &mut self.children {
            if let Node::Element(el) = node {
                el.remove_nodes_where(remove);
            }
        }
    }

    /// Depth-first search for the first descendant element matching `pred`.
    pub fn find_descendant<F>(&self, pred: &F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        for child in self.child_elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(pred) {
                return Some(found);
            }
        }
        None
    }
}

/// Removes characters XML 1.0 does not allow in a document: C0 controls
/// other than tab, newline and carriage return, and U+FFFE/U+FFFF.
pub fn strip_invalid_chars(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_invalid_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|&c| !is_invalid_char(c)).collect())
}

fn is_invalid_char(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}
