//! Provider-specific page extractors.
//!
//! Each provider hides its media and article bodies somewhere different: an
//! audio button, an article container, a JSON-LD block, or a Next.js data
//! endpoint. An [`Extractor`] turns one feed entry into an [`Extraction`];
//! the enrichment engine does not care which one it is given.
//!
//! - [`npr`] - Audio link from the `.audio-module-listen` button
//! - [`fox6`] - Article body, or the JSON-LD video stream
//! - [`dailywire`] - Episode list API and signed video URLs
//! - [`article`] - First element matching a CSS selector
//!
//! Page parsing is synchronous: the `scraper` document is built and dropped
//! between awaits, so the futures stay `Send`.

pub mod article;
pub mod dailywire;
pub mod fox6;
pub mod jsonld;
pub mod npr;

pub use article::SelectorExtractor;
pub use dailywire::DailyWire;
pub use fox6::Fox6;
pub use npr::Npr;

use async_trait::async_trait;
use scraper::Selector;
use thiserror::Error;

use crate::feed::{entry_link, FetchError, HttpClient};
use crate::xml::{enclosure_element, Element};

/// Reasons an entry could not be enriched. Every variant leads to the entry
/// being dropped from the feed.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The entry has no link to fetch.
    #[error("entry has no article link")]
    MissingLink,
    /// The page was fetched but the required media link was not on it.
    #[error("no media link found on {0}")]
    MissingMedia(String),
    /// Neither a body nor media could be found on the page.
    #[error("nothing extractable on {0}")]
    NothingExtracted(String),
    /// A CSS selector failed to parse.
    #[error("invalid CSS selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },
    /// A JSON document was missing an expected field.
    #[error("missing {field} in {url}")]
    MissingField { field: &'static str, url: String },
    /// The provider refused to hand out the media URL.
    #[error("media access denied for {0}")]
    AccessDenied(String),
    /// The media URL is not an absolute http(s) URL.
    #[error("unusable media URL {0:?}")]
    InvalidMedia(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// A downloadable media asset attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub href: String,
    pub mime_type: Option<String>,
    pub title: Option<String>,
}

impl Enclosure {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            mime_type: None,
            title: None,
        }
    }

    pub fn with_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// `<link rel="enclosure" .../>`
    pub fn to_element(&self) -> Element {
        enclosure_element(&self.href, self.mime_type.as_deref(), self.title.as_deref())
    }
}

/// What an extractor found for one entry. Both parts are optional; an
/// extractor that requires one of them fails instead of returning it empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Sanitized article body, ready to embed as XHTML.
    pub body: Option<Element>,
    pub enclosure: Option<Enclosure>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.enclosure.is_none()
    }
}

/// Finds supplementary data for a feed entry.
///
/// Implementations receive an owned snapshot of the entry and must not
/// assume anything about other entries; many calls run concurrently.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    async fn extract(
        &self,
        client: &HttpClient,
        entry: &Element,
    ) -> Result<Extraction, ExtractError>;
}

/// The entry's article URL, or [`ExtractError::MissingLink`].
pub fn article_url(entry: &Element) -> Result<String, ExtractError> {
    entry_link(entry).ok_or(ExtractError::MissingLink)
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}
