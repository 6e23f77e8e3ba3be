use thiserror::Error;

use super::timestamp::{normalize_timestamp, now_timestamp};
use super::FeedDocument;
use crate::xml::{link_element, text_element, Element};

/// Errors raised while mapping RSS onto Atom.
///
/// Conversion is all-or-nothing: a single bad item fails the whole document.
/// Partial failure is handled later, by the enrichment step.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The RSS document has no `<channel>` element.
    #[error("unable to get channel information from RSS feed")]
    MissingChannel,
    /// An item has no `<title>`; Atom requires one.
    #[error("RSS item has no title")]
    MissingTitle,
    /// An item has no `<guid>`; Atom requires an `<id>`.
    #[error("RSS item is missing its guid")]
    MissingId,
    /// An item has no `<pubDate>`; optional in RSS, but `<updated>` is mandatory in Atom.
    #[error("RSS item has no pubDate, but updated is mandatory in Atom")]
    MissingTimestamp,
    /// The document root is neither RSS nor Atom.
    #[error("unsupported feed root element <{0}>")]
    UnsupportedRoot(String),
}

/// Converts an RSS document into a new Atom document.
///
/// Channel fields are moved into the new root: `title` and `generator` as-is,
/// `link` as an alternate `link[href]`, `copyright` as `rights`,
/// `description` as `subtitle`, `lastBuildDate` as `updated` (current time
/// when absent) and `image/url` as `logo`. The feed `id` is the channel link,
/// else its `atom:link` href, else a URN built from the title. Every item
/// becomes an entry via [`convert_item`].
///
/// Items are read from the channel, or from the document root for RSS 1.0
/// (`rdf:RDF`) documents where items are siblings of the channel.
pub fn convert_feed(rss: FeedDocument) -> Result<FeedDocument, ConvertError> {
    let mut source = rss.into_root();
    let mut channel = source
        .take_child("channel")
        .ok_or(ConvertError::MissingChannel)?;

    let mut atom = FeedDocument::new_atom();
    let root = atom.root_mut();

    let title = channel.take_child("title");
    let id = feed_id(&channel, title.as_ref());
    if let Some(title) = title {
        root.push(title);
    }
    root.push(text_element("id", id));
    if let Some(link) = channel.child_text("link") {
        root.push(link_element(link));
    }
    if let Some(rights) = channel.take_child("copyright") {
        root.push(text_element("rights", rights.text()));
    }
    if let Some(description) = channel.take_child("description") {
        root.push(text_element("subtitle", description.text()));
    }
    if let Some(generator) = channel.take_child("generator") {
        root.push(generator);
    }
    let updated = channel
        .child_text("lastBuildDate")
        .map(|raw| normalize_timestamp(&raw))
        .unwrap_or_else(now_timestamp);
    root.push(text_element("updated", updated));
    if let Some(logo) = channel.child("image").and_then(|image| image.child_text("url")) {
        root.push(text_element("logo", logo));
    }

    let mut items = channel.take_children("item");
    if items.is_empty() {
        items = source.take_children("item");
    }
    let total = items.len();
    for (index, item) in items.into_iter().enumerate() {
        let entry = convert_item(item).inspect_err(|e| {
            tracing::error!(item = index, total = total, error = %e, "Failed to convert RSS item");
        })?;
        root.push(entry);
    }

    tracing::debug!(entries = total, "Converted RSS feed to Atom");
    Ok(atom)
}

fn feed_id(channel: &Element, title: Option<&Element>) -> String {
    if let Some(link) = channel.child_text("link") {
        return link;
    }
    let self_link = channel
        .children_named("atom:link")
        .filter_map(|link| link.attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty());
    if let Some(href) = self_link {
        return href.to_string();
    }
    let title = title.map(|t| t.text()).unwrap_or_default();
    let name = match title.trim() {
        "" => "untitled",
        trimmed => trimmed,
    };
    let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("urn:atomizer:feed:{encoded}")
}

/// Converts one RSS `<item>` into an Atom `<entry>`.
///
/// `title`, `guid` and `pubDate` are mandatory; `link` becomes a
/// `link[href]` and `description` is renamed to `summary`. Pure and
/// synchronous.
pub fn convert_item(mut item: Element) -> Result<Element, ConvertError> {
    let mut entry = Element::new("entry");

    let title = item.take_child("title").ok_or(ConvertError::MissingTitle)?;
    entry.push(title);

    let id = item.child_text("guid").ok_or(ConvertError::MissingId)?;
    entry.push(text_element("id", id));

    let published = item
        .child_text("pubDate")
        .ok_or(ConvertError::MissingTimestamp)?;
    entry.push(text_element("updated", normalize_timestamp(&published)));

    if let Some(link) = item.child_text("link") {
        entry.push(link_element(link));
    }

    if let Some(mut description) = item.take_child("description") {
        description.rename("summary");
        description.set_attr("type", "html");
        entry.push(description);
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedKind;
    use pretty_assertions::assert_eq;

    const FULL_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Morning News</title>
    <link>https://news.example.com</link>
    <description>Daily headlines</description>
    <copyright>Copyright 2024 Example</copyright>
    <generator>ExampleCMS</generator>
    <lastBuildDate>Tue, 02 Jan 2024 06:00:00 GMT</lastBuildDate>
    <image><url>https://news.example.com/logo.png</url><title>Logo</title></image>
    <item>
      <title>First story</title>
      <guid>urn:story:1</guid>
      <pubDate>Mon, 01 Jan 2024 05:00:00 GMT</pubDate>
      <link>https://news.example.com/1</link>
      <description><![CDATA[<p>Body</p>]]></description>
    </item>
    <item>
      <title>Second story</title>
      <guid>urn:story:2</guid>
      <pubDate>Tue, 02 Jan 2024 05:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    fn item(fields: &[(&str, &str)]) -> Element {
        fields.iter().fold(Element::new("item"), |el, (name, value)| {
            el.with_child(text_element(name, *value))
        })
    }

    #[test]
    fn test_convert_feed_maps_channel_fields() {
        let atom = convert_feed(FeedDocument::parse(FULL_RSS).unwrap()).unwrap();
        assert_eq!(atom.kind(), FeedKind::Atom);

        let root = atom.root();
        assert_eq!(root.attr("xmlns"), Some("http://www.w3.org/2005/Atom"));
        assert_eq!(root.child_text("title").as_deref(), Some("Morning News"));
        assert_eq!(root.child_text("subtitle").as_deref(), Some("Daily headlines"));
        assert_eq!(
            root.child_text("rights").as_deref(),
            Some("Copyright 2024 Example")
        );
        assert_eq!(root.child_text("generator").as_deref(), Some("ExampleCMS"));
        assert_eq!(
            root.child_text("updated").as_deref(),
            Some("2024-01-02T06:00:00Z")
        );
        assert_eq!(
            root.child_text("logo").as_deref(),
            Some("https://news.example.com/logo.png")
        );
        assert_eq!(atom.entry_count(), 2);
    }

    #[test]
    fn test_channel_singletons_appear_once() {
        let atom = convert_feed(FeedDocument::parse(FULL_RSS).unwrap()).unwrap();
        for field in ["title", "id", "link", "updated", "generator", "logo", "subtitle", "rights"] {
            assert_eq!(atom.root().child_count(field), 1, "field {field}");
        }
    }

    #[test]
    fn test_feed_id_sources() {
        let atom = convert_feed(FeedDocument::parse(FULL_RSS).unwrap()).unwrap();
        assert_eq!(
            atom.root().child_text("id").as_deref(),
            Some("https://news.example.com")
        );
        assert_eq!(
            atom.root().child("link").unwrap().attr("href"),
            Some("https://news.example.com")
        );

        let rss = FeedDocument::parse(
            r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel><title>T</title>
            <atom:link rel="self" href="https://e.com/feed.xml"/></channel></rss>"#,
        )
        .unwrap();
        let atom = convert_feed(rss).unwrap();
        assert_eq!(atom.root().child_text("id").as_deref(), Some("https://e.com/feed.xml"));
        assert!(atom.root().child("link").is_none());

        let rss = FeedDocument::parse("<rss><channel><title>Local News</title></channel></rss>")
            .unwrap();
        let atom = convert_feed(rss).unwrap();
        assert_eq!(
            atom.root().child_text("id").as_deref(),
            Some("urn:atomizer:feed:Local+News")
        );
        assert_eq!(atom.root().child_count("id"), 1);
    }

    #[test]
    fn test_missing_last_build_date_falls_back_to_now() {
        let rss = FeedDocument::parse(
            "<rss><channel><title>T</title></channel></rss>",
        )
        .unwrap();
        let atom = convert_feed(rss).unwrap();
        let updated = atom.root().child_text("updated").unwrap();
        assert!(crate::feed::timestamp::parse_timestamp(&updated).is_some());
    }

    #[test]
    fn test_missing_channel_is_fatal() {
        let rss = FeedDocument::parse("<rss version=\"2.0\"></rss>").unwrap();
        assert_eq!(convert_feed(rss).unwrap_err(), ConvertError::MissingChannel);
    }

    #[test]
    fn test_item_failure_fails_whole_feed() {
        let rss = FeedDocument::parse(
            "<rss><channel><item><guid>1</guid><pubDate>x</pubDate></item></channel></rss>",
        )
        .unwrap();
        assert_eq!(convert_feed(rss).unwrap_err(), ConvertError::MissingTitle);
    }

    #[test]
    fn test_rss1_items_outside_channel() {
        let rss = FeedDocument::parse(
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <channel><title>RDF</title></channel>
  <item><title>A</title><guid>a</guid><pubDate>2024-01-01</pubDate></item>
</rdf:RDF>"#,
        )
        .unwrap();
        let atom = convert_feed(rss).unwrap();
        assert_eq!(atom.entry_count(), 1);
    }

    #[test]
    fn test_convert_item_round_trip_shape() {
        let entry = convert_item(item(&[
            ("title", "Story"),
            ("guid", "urn:1"),
            ("pubDate", "Mon, 01 Jan 2024 05:00:00 GMT"),
            ("link", "https://e.com/1"),
            ("description", "Summary text"),
        ]))
        .unwrap();

        for field in ["title", "id", "updated", "link", "summary"] {
            assert_eq!(entry.child_count(field), 1, "field {field}");
        }
        assert_eq!(entry.child_text("title").as_deref(), Some("Story"));
        assert_eq!(entry.child_text("id").as_deref(), Some("urn:1"));
        assert_eq!(
            entry.child_text("updated").as_deref(),
            Some("2024-01-01T05:00:00Z")
        );
        assert_eq!(entry.child("link").unwrap().attr("href"), Some("https://e.com/1"));
        let summary = entry.child("summary").unwrap();
        assert_eq!(summary.text(), "Summary text");
        assert_eq!(summary.attr("type"), Some("html"));
    }

    #[test]
    fn test_convert_item_optional_fields_absent() {
        let entry = convert_item(item(&[
            ("title", "Story"),
            ("guid", "urn:1"),
            ("pubDate", "2024-01-01"),
        ]))
        .unwrap();
        assert!(entry.child("link").is_none());
        assert!(entry.child("summary").is_none());
        assert_eq!(entry.child_text("updated").as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_convert_item_missing_title() {
        let err = convert_item(item(&[("guid", "1"), ("pubDate", "x")])).unwrap_err();
        assert_eq!(err, ConvertError::MissingTitle);
    }

    #[test]
    fn test_convert_item_missing_guid() {
        let err = convert_item(item(&[("title", "t"), ("pubDate", "x")])).unwrap_err();
        assert_eq!(err, ConvertError::MissingId);
    }

    #[test]
    fn test_convert_item_missing_pub_date() {
        let err = convert_item(item(&[("title", "t"), ("guid", "1")])).unwrap_err();
        assert_eq!(err, ConvertError::MissingTimestamp);
    }
}
