use async_trait::async_trait;
use scraper::Html;

use super::{article_url, parse_selector, Enclosure, ExtractError, Extraction, Extractor};
use crate::feed::HttpClient;
use crate::util::{resolve_href, strip_query};
use crate::xml::Element;

/// NPR news feed used when no URL is given.
pub const FEED_URL: &str = "https://feeds.npr.org/3/rss.xml";
pub const REFERER: &str = "https://www.npr.org";

const LISTEN_SELECTOR: &str = ".audio-module-listen[href]";

/// Attaches the story's audio as an enclosure. Stories without audio are
/// dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Npr;

#[async_trait]
impl Extractor for Npr {
    fn name(&self) -> &str {
        "npr"
    }

    async fn extract(
        &self,
        client: &HttpClient,
        entry: &Element,
    ) -> Result<Extraction, ExtractError> {
        let url = article_url(entry)?;
        let page = client.fetch_page(&url).await?;
        let enclosure = find_audio_link(&page, &url)?;
        Ok(Extraction {
            body: None,
            enclosure: Some(enclosure),
        })
    }
}

/// Locates the first listen button on `page` and turns its `href` into an
/// enclosure, without the query string and resolved against `page_url`.
pub fn find_audio_link(page: &str, page_url: &str) -> Result<Enclosure, ExtractError> {
    let selector = parse_selector(LISTEN_SELECTOR)?;
    let document = Html::parse_document(page);

    let href = document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .ok_or_else(|| ExtractError::MissingMedia(page_url.to_string()))?;

    let resolved = resolve_href(page_url, strip_query(href))
        .map_err(|_| ExtractError::InvalidMedia(href.to_string()))?;
    let href = resolved.to_string();

    let enclosure = Enclosure::new(href.as_str());
    Ok(if href.to_ascii_lowercase().ends_with(".mp3") {
        enclosure.with_type("audio/mpeg")
    } else {
        enclosure
    })
}
