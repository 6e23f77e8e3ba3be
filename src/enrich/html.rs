//! Bridge from scraped HTML to the owned XML tree.
//!
//! HTML is far looser than XML: attribute names may contain characters XML
//! forbids, and namespaces are implied. Converting the parsed `scraper` tree
//! into an [`Element`] and dropping what XML cannot express means the
//! fragment always serializes to well-formed XML once embedded in a feed.

use scraper::{ElementRef, Node as HtmlNode};

use crate::xml::{strip_invalid_chars, Element, Node};

/// Copies a scraped element and its subtree into an owned [`Element`].
///
/// Text and comments are kept (comments and scripts are left for the
/// sanitizer), minus any characters XML forbids. Attributes with names that are not valid XML names, and any
/// `xmlns` declarations, are dropped; the rest are sorted by name. Child
/// elements whose tag names are not valid XML names are skipped along with
/// their subtree.
pub fn to_xml_element(source: ElementRef<'_>) -> Element {
    let value = source.value();
    let mut el = Element::new(value.name());

    for (name, attr_value) in value.attrs() {
        if is_xml_name(name) && !name.starts_with("xmlns") {
            el.attributes
                .push((name.to_string(), strip_invalid_chars(attr_value).into_owned()));
        } else {
            tracing::trace!(element = %value.name(), attribute = %name, "Dropping attribute");
        }
    }
    // Attribute iteration order is not stable across parses
    el.attributes.sort_by(|(a, _), (b, _)| a.cmp(b));

    for child in source.children() {
        match child.value() {
            HtmlNode::Text(text) => {
                el.children.push(Node::Text(strip_invalid_chars(text).into_owned()));
            }
            HtmlNode::Comment(comment) => {
                el.children
                    .push(Node::Comment(strip_invalid_chars(comment).into_owned()));
            }
            HtmlNode::Element(inner) if !is_xml_name(inner.name()) => {
                tracing::debug!(element = %inner.name(), "Skipping element with invalid XML name");
            }
            HtmlNode::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    el.push(to_xml_element(child_ref));
                }
            }
            _ => {}
        }
    }

    el
}

/// True if `name` is usable as an unprefixed XML element or attribute name.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{parse_document, write_document};
    use scraper::{Html, Selector};

    fn first(html: &Html, css: &str) -> Element {
        let selector = Selector::parse(css).unwrap();
        to_xml_element(html.select(&selector).next().unwrap())
    }

    #[test]
    fn test_converts_subtree() {
        let html = Html::parse_document(
            r#"<html><body><div class="body"><p>Hello <b>world</b></p><!-- note --></div></body></html>"#,
        );
        let el = first(&html, "div.body");

        assert_eq!(el.name, "div");
        assert_eq!(el.attr("class"), Some("body"));
        let p = el.child("p").unwrap();
        assert_eq!(p.text(), "Hello ");
        assert_eq!(p.child("b").unwrap().text(), "world");
        assert!(el
            .children
            .iter()
            .any(|n| matches!(n, Node::Comment(c) if c.trim() == "note")));
    }

    #[test]
    fn test_invalid_attribute_names_dropped() {
        let html = Html::parse_document(
            r#"<div id="x" @click="go()" data-ok="1" 2bad="y" xmlns="urn:other">t</div>"#,
        );
        let el = first(&html, "div");
        let names: Vec<&str> = el.attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["data-ok", "id"]);
    }

    #[test]
    fn test_output_is_well_formed_xml() {
        let html = Html::parse_document(
            r#"<article><p>a < b & c<br><img src="x.png" alt='"q"'></p><p>unclosed</article>"#,
        );
        let el = first(&html, "article");
        let xml = write_document(&el, false).unwrap();
        let reparsed = parse_document(&xml).unwrap();
        assert_eq!(reparsed.name, "article");
        assert_eq!(reparsed.child_count("p"), 2);
    }

    #[test]
    fn test_is_xml_name() {
        assert!(is_xml_name("data-id"));
        assert!(is_xml_name("_x"));
        assert!(!is_xml_name(""));
        assert!(!is_xml_name("1a"));
        assert!(!is_xml_name("a:b"));
        assert!(!is_xml_name("@click"));
    }
}
