//! End-to-end runs: obtain feeds, normalize and merge them, drop stale
//! entries, enrich, and render the Atom document.
//!
//! Everything here returns [`PipelineError`] for fatal conditions only.
//! Per-entry failures are absorbed by the enrichment engine and never reach
//! the caller.

use chrono::Utc;
use thiserror::Error;

use crate::config::Settings;
use crate::enrich::{enrich_with, EnrichReport};
use crate::extract::{DailyWire, ExtractError, Extractor};
use crate::feed::{
    merge_feeds, remove_by_category, remove_older_than, ConvertError, FeedDocument, FetchError,
    HttpClient, MergeError,
};
use crate::xml::XmlError;

/// Fatal errors of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The HTTP client could not be built.
    #[error("failed to set up HTTP client: {0}")]
    Client(#[source] FetchError),
    /// A top-level feed could not be fetched.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    /// A source document is not well-formed XML.
    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: XmlError,
    },
    /// A source document could not be turned into Atom.
    #[error("failed to convert {origin}: {source}")]
    Convert {
        origin: String,
        #[source]
        source: ConvertError,
    },
    #[error(transparent)]
    Merge(#[from] MergeError),
    /// Building a provider's feed failed.
    #[error(transparent)]
    Provider(#[from] ExtractError),
    /// The output document could not be serialized.
    #[error("failed to render feed: {0}")]
    Render(#[source] XmlError),
    #[error("no feed sources given")]
    NoSources,
}

/// Builds the shared client, sending `referer` with every request if given.
pub fn client_for(settings: &Settings, referer: Option<&str>) -> Result<HttpClient, PipelineError> {
    let client = HttpClient::new(&settings.http).map_err(PipelineError::Client)?;
    match referer {
        Some(referer) => client.with_referer(referer).map_err(PipelineError::Client),
        None => Ok(client),
    }
}

/// Parses a feed and returns it as Atom with normalized timestamps.
/// `origin` names the source in errors.
pub fn parse_feed(text: &str, origin: &str) -> Result<FeedDocument, PipelineError> {
    let doc = FeedDocument::parse(text).map_err(|source| PipelineError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    let mut doc = doc.into_atom().map_err(|source| PipelineError::Convert {
        origin: origin.to_string(),
        source,
    })?;
    doc.normalize_timestamps();
    Ok(doc)
}

/// Fetches a top-level feed and returns it as Atom.
pub async fn load_feed(client: &HttpClient, url: &str) -> Result<FeedDocument, PipelineError> {
    let text = client
        .fetch_feed(url)
        .await
        .map_err(|source| PipelineError::Fetch {
            url: url.to_string(),
            source,
        })?;
    parse_feed(&text, url)
}

/// Loads every URL; the first becomes the primary document and the rest are
/// merged into it in order. A single source keeps its own entry order.
pub async fn build_feed(
    client: &HttpClient,
    urls: &[String],
) -> Result<FeedDocument, PipelineError> {
    let (first, rest) = urls.split_first().ok_or(PipelineError::NoSources)?;
    let mut primary = load_feed(client, first).await?;

    if !rest.is_empty() {
        let mut secondaries = Vec::with_capacity(rest.len());
        for url in rest {
            secondaries.push(load_feed(client, url).await?);
        }
        merge_feeds(&mut primary, secondaries)?;
    }

    tracing::info!(sources = urls.len(), entries = primary.entry_count(), "Loaded feed");
    Ok(primary)
}

/// Drops stale entries, enriches the rest with `extractor`, and renders the
/// document.
pub async fn finish_feed(
    mut doc: FeedDocument,
    client: &HttpClient,
    extractor: &dyn Extractor,
    settings: &Settings,
) -> Result<(String, EnrichReport), PipelineError> {
    let stale = remove_older_than(&mut doc, settings.max_age_days, Utc::now());
    if stale > 0 {
        tracing::info!(removed = stale, max_age_days = settings.max_age_days, "Dropped old entries");
    }

    let report = enrich_with(&mut doc, extractor, client, settings.concurrency).await;
    let xml = doc.to_xml(settings.pretty).map_err(PipelineError::Render)?;
    Ok((xml, report))
}

/// Runs a feed-based provider over `urls`.
pub async fn run_provider(
    client: &HttpClient,
    urls: &[String],
    extractor: &dyn Extractor,
    settings: &Settings,
) -> Result<String, PipelineError> {
    let doc = build_feed(client, urls).await?;
    let (xml, _) = finish_feed(doc, client, extractor, settings).await?;
    Ok(xml)
}

/// Builds a Daily Wire show's feed and resolves its videos.
pub async fn run_dailywire(
    client: &HttpClient,
    mut show: DailyWire,
    settings: &Settings,
) -> Result<String, PipelineError> {
    let doc = show.build_feed(client).await?;
    let (xml, _) = finish_feed(doc, client, &show, settings).await?;
    Ok(xml)
}

/// Converts and merges already-read documents without touching the network.
/// `sources` pairs each document's text with a name for error messages.
pub fn convert_documents(
    sources: Vec<(String, String)>,
    pretty: bool,
) -> Result<String, PipelineError> {
    let mut sources = sources.into_iter();
    let (origin, text) = sources.next().ok_or(PipelineError::NoSources)?;
    let mut primary = parse_feed(&text, &origin)?;

    let secondaries = sources
        .map(|(origin, text)| parse_feed(&text, &origin))
        .collect::<Result<Vec<_>, _>>()?;
    if !secondaries.is_empty() {
        merge_feeds(&mut primary, secondaries)?;
    }

    primary.to_xml(pretty).map_err(PipelineError::Render)
}

/// Removes entries in any of `categories` and renders the document in its
/// original format.
pub fn filter_document(
    text: &str,
    origin: &str,
    categories: &[String],
    pretty: bool,
) -> Result<String, PipelineError> {
    let mut doc = FeedDocument::parse(text).map_err(|source| PipelineError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    let removed = remove_by_category(&mut doc, categories);
    tracing::info!(removed, remaining = doc.entry_count(), "Filtered feed");
    doc.to_xml(pretty).map_err(PipelineError::Render)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Source</title>
  <lastBuildDate>Tue, 02 Jan 2024 12:00:00 GMT</lastBuildDate>
  <item><title>B</title><guid>b</guid><pubDate>Wed, 03 Jan 2024 00:00:00 GMT</pubDate></item>
  <item><title>A</title><guid>a</guid><pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></item>
</channel></rss>"#;

    const ATOM: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Other</title>
  <entry><title>M</title><id>m</id><updated>2024-01-02T00:00:00+00:00</updated></entry>
</feed>"#;

    fn ids(xml: &str) -> Vec<String> {
        let doc = FeedDocument::parse(xml).unwrap();
        doc.entries().filter_map(|e| e.child_text("id")).collect()
    }

    #[test]
    fn test_parse_feed_converts_and_normalizes() {
        let doc = parse_feed(ATOM, "atom").unwrap();
        let entry = doc.entries().next().unwrap();
        assert_eq!(entry.child_text("updated").as_deref(), Some("2024-01-02T00:00:00Z"));

        let doc = parse_feed(RSS, "rss").unwrap();
        assert_eq!(doc.root().name, "feed");
        assert_eq!(doc.entry_count(), 2);
    }

    #[test]
    fn test_parse_errors_name_origin() {
        let err = parse_feed("<rss><channel>", "broken.xml").unwrap_err();
        assert!(err.to_string().contains("broken.xml"));

        let err = parse_feed("<html/>", "page.html").unwrap_err();
        assert!(matches!(err, PipelineError::Convert { .. }));
    }

    #[test]
    fn test_convert_single_keeps_order() {
        let xml = convert_documents(vec![("rss".into(), RSS.into())], false).unwrap();
        assert_eq!(ids(&xml), vec!["b", "a"]);
    }

    #[test]
    fn test_convert_merges_and_sorts() {
        let xml = convert_documents(
            vec![("rss".into(), RSS.into()), ("atom".into(), ATOM.into())],
            true,
        )
        .unwrap();
        assert_eq!(ids(&xml), vec!["a", "m", "b"]);
        assert!(xml.ends_with('\n'));
    }

    #[test]
    fn test_convert_rejects_broken_secondary() {
        let err = convert_documents(
            vec![
                ("rss".into(), RSS.into()),
                ("empty.xml".into(), r#"<rss version="2.0"></rss>"#.into()),
            ],
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Convert { ref origin, source: ConvertError::MissingChannel }
                if origin == "empty.xml"
        ));

        let err = convert_documents(
            vec![
                ("rss".into(), RSS.into()),
                ("page.html".into(), "<html><body/></html>".into()),
            ],
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Convert { source: ConvertError::UnsupportedRoot(ref root), .. }
                if root == "html"
        ));
    }

    #[test]
    fn test_convert_requires_source() {
        assert!(matches!(
            convert_documents(Vec::new(), false),
            Err(PipelineError::NoSources)
        ));
    }

    #[test]
    fn test_filter_document_keeps_format() {
        let rss = r#"<rss version="2.0"><channel><title>T</title>
            <item><title>1</title><category>Sports</category></item>
            <item><title>2</title><category>Politics</category></item>
        </channel></rss>"#;
        let xml = filter_document(rss, "stdin", &["sport".to_string()], false).unwrap();
        let doc = FeedDocument::parse(&xml).unwrap();
        assert_eq!(doc.root().name, "rss");
        let channel = doc.root().child("channel").unwrap();
        assert_eq!(channel.child_count("item"), 1);
        assert_eq!(
            channel.child("item").unwrap().child_text("title").as_deref(),
            Some("2")
        );
    }
}
