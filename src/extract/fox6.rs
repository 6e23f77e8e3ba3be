use async_trait::async_trait;
use scraper::Html;

use super::{article_url, jsonld, parse_selector, Enclosure, ExtractError, Extraction, Extractor};
use crate::enrich::{sanitize, to_xml_element};
use crate::feed::HttpClient;
use crate::util::validate_url;
use crate::xml::{Element, Node};

pub const FEED_URL: &str = "https://www.fox6now.com/rss/category/news";
pub const REFERER: &str = "https://www.fox6now.com";

const BODY_SELECTOR: &str = ".article-content";
const NEWSLETTER_HREF: &str = "https://www.fox6now.com/newsletters";
const HLS_MIME_TYPE: &str = "application/x-mpegURL";

/// Embeds the article text, or for video-only stories, the HLS stream from
/// the page's structured data. Stories with neither are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fox6;

#[async_trait]
impl Extractor for Fox6 {
    fn name(&self) -> &str {
        "fox6"
    }

    async fn extract(
        &self,
        client: &HttpClient,
        entry: &Element,
    ) -> Result<Extraction, ExtractError> {
        let url = article_url(entry)?;
        let page = client.fetch_page(&url).await?;
        parse_page(&page, &url)
    }
}

/// Pulls the article body out of a story page, falling back to the JSON-LD
/// `contentUrl` as a video enclosure.
pub fn parse_page(page: &str, page_url: &str) -> Result<Extraction, ExtractError> {
    let selector = parse_selector(BODY_SELECTOR)?;
    let document = Html::parse_document(page);

    if let Some(container) = document.select(&selector).next() {
        let mut body = to_xml_element(container);
        sanitize(&mut body);
        remove_newsletter_blocks(&mut body);
        return Ok(Extraction {
            body: Some(body),
            enclosure: None,
        });
    }

    match jsonld::find_content_url(&document) {
        Some(content_url) => {
            let href = validate_url(&content_url)
                .map_err(|_| ExtractError::InvalidMedia(content_url.clone()))?;
            tracing::debug!(url = %page_url, video = %href, "No article body, using video");
            Ok(Extraction {
                body: None,
                enclosure: Some(
                    Enclosure::new(href.as_str())
                        .with_type(HLS_MIME_TYPE)
                        .with_title("Video"),
                ),
            })
        }
        None => Err(ExtractError::NothingExtracted(page_url.to_string())),
    }
}

/// Removes every element that directly contains the newsletter sign-up link.
fn remove_newsletter_blocks(body: &mut Element) {
    let mut removed = 0usize;
    body.remove_nodes_where(&mut |node| {
        let hit = matches!(node, Node::Element(el) if el.child_elements().any(is_newsletter_link));
        removed += usize::from(hit);
        hit
    });
    // The container itself may hold the link directly
    removed += body.retain_children(|el| !is_newsletter_link(el));
    if removed > 0 {
        tracing::trace!(removed, "Removed newsletter blocks");
    }
}

fn is_newsletter_link(el: &Element) -> bool {
    el.name == "a" && el.attr("href") == Some(NEWSLETTER_HREF)
}
