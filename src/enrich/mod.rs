//! Concurrent enrichment of feed entries.
//!
//! Enrichment runs in two phases. In the fetch phase every entry gets its
//! own future, run on a bounded pool; each future works on an owned copy of
//! its entry and never touches the document. In the apply phase the results
//! are written back one at a time, in the order the fetches completed.
//! Entries whose fetch failed are removed once every result is applied.
//!
//! - [`html`] - Converts scraped HTML into the crate's XML tree
//! - [`sanitize`] - Strips scripts and comments from that tree
//!
//! # Example
//!
//! ```ignore
//! use atomizer::enrich::enrich_with;
//! use atomizer::extract::Npr;
//!
//! let report = enrich_with(&mut feed, &Npr, &client, 3).await;
//! tracing::info!(enriched = report.enriched, dropped = report.dropped, "done");
//! ```

mod html;
mod sanitize;

pub use html::to_xml_element;
pub use sanitize::sanitize;

use std::fmt::Display;
use std::future::Future;

use futures::stream::{self, StreamExt};
use futures::FutureExt;

use crate::extract::{Extraction, Extractor};
use crate::feed::{entry_label, FeedDocument, HttpClient};
use crate::xml::{Element, Node};

pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Outcome counts of one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// Entries whose fetch succeeded and whose result was applied.
    pub enriched: usize,
    /// Entries removed because their fetch failed.
    pub dropped: usize,
}

/// Enriches every entry present in `doc` when the call starts.
///
/// `fetch` receives an owned copy of each entry; at most `concurrency` of
/// its futures run at once (0 is treated as 1). Successful payloads are
/// handed to `apply` together with the live entry, serially and in
/// completion order. Entries whose fetch returned an error are logged and
/// removed from the document.
pub async fn enrich_entries<T, E, F, Fut, A>(
    doc: &mut FeedDocument,
    concurrency: usize,
    fetch: F,
    mut apply: A,
) -> EnrichReport
where
    F: Fn(Element) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    A: FnMut(&mut Element, T),
{
    let concurrency = concurrency.max(1);

    // Fixed working set: child positions of the entries right now
    let jobs: Vec<(usize, Element)> = doc
        .root()
        .children
        .iter()
        .enumerate()
        .filter_map(|(idx, node)| match node {
            Node::Element(el) if el.name == "entry" => Some((idx, el.clone())),
            _ => None,
        })
        .collect();

    if jobs.is_empty() {
        return EnrichReport::default();
    }
    tracing::debug!(entries = jobs.len(), concurrency, "Enriching entries");

    let results: Vec<(usize, String, Result<T, E>)> = stream::iter(jobs)
        .map(|(idx, entry)| {
            let label = entry_label(&entry);
            fetch(entry).map(move |result| (idx, label, result))
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut report = EnrichReport::default();
    let mut failed = Vec::new();
    let root = doc.root_mut();

    for (idx, label, result) in results {
        match result {
            Ok(payload) => {
                if let Some(Node::Element(entry)) = root.children.get_mut(idx) {
                    apply(entry, payload);
                    report.enriched += 1;
                }
            }
            Err(e) => {
                tracing::info!(entry = %label, error = %e, "Dropping entry");
                failed.push(idx);
            }
        }
    }

    failed.sort_unstable();
    for idx in failed.into_iter().rev() {
        root.children.remove(idx);
        report.dropped += 1;
    }

    report
}

/// Runs `extractor` over every entry of `doc` and applies the results with
/// [`apply_extraction`].
pub async fn enrich_with(
    doc: &mut FeedDocument,
    extractor: &dyn Extractor,
    client: &HttpClient,
    concurrency: usize,
) -> EnrichReport {
    let report = enrich_entries(
        doc,
        concurrency,
        move |entry| async move { extractor.extract(client, &entry).await },
        apply_extraction,
    )
    .await;

    tracing::info!(
        provider = extractor.name(),
        enriched = report.enriched,
        dropped = report.dropped,
        "Enrichment finished"
    );
    report
}

/// Writes an extraction into its entry.
///
/// The body replaces any existing `content` as `<content type="xhtml">`
/// wrapping an XHTML `div`; the enclosure is appended as a `link`.
pub fn apply_extraction(entry: &mut Element, extraction: Extraction) {
    if let Some(body) = extraction.body {
        entry.take_children("content");
        let wrapper = Element::new("div").with_attr("xmlns", XHTML_NS).with_child(body);
        entry.push(
            Element::new("content")
                .with_attr("type", "xhtml")
                .with_child(wrapper),
        );
    }
    if let Some(enclosure) = extraction.enclosure {
        entry.push(enclosure.to_element());
    }
}
