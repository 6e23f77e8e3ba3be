use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{article_url, parse_selector, ExtractError, Extraction, Extractor};
use crate::enrich::{sanitize, to_xml_element};
use crate::feed::HttpClient;
use crate::xml::Element;

pub const DEFAULT_SELECTOR: &str = "article";

/// Embeds the first element matching a CSS selector as the entry's content.
///
/// Works for any site. Pages where nothing matches keep their entry as it
/// was; only fetch failures drop an entry.
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    css: String,
    selector: Selector,
}

impl SelectorExtractor {
    pub fn new(css: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            css: css.to_string(),
            selector: parse_selector(css)?,
        })
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    /// The sanitized first match on `page`, if any.
    pub fn select_body(&self, page: &str) -> Option<Element> {
        let document = Html::parse_document(page);
        let found = document.select(&self.selector).next()?;
        let mut body = to_xml_element(found);
        sanitize(&mut body);
        Some(body)
    }
}

#[async_trait]
impl Extractor for SelectorExtractor {
    fn name(&self) -> &str {
        "article"
    }

    async fn extract(
        &self,
        client: &HttpClient,
        entry: &Element,
    ) -> Result<Extraction, ExtractError> {
        let url = article_url(entry)?;
        let page = client.fetch_page(&url).await?;
        let body = self.select_body(&page);
        if body.is_none() {
            tracing::info!(url = %url, selector = %self.css, "Nothing matched the selector");
        }
        Ok(Extraction {
            body,
            enclosure: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::HttpSettings;
    use crate::xml::link_element;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_selector() {
        let extractor = SelectorExtractor::new(DEFAULT_SELECTOR).unwrap();
        assert_eq!(extractor.css(), "article");
        let body = extractor
            .select_body("<html><body><nav>menu</nav><article><h1>Hi</h1><script>x()</script></article></body></html>")
            .unwrap();
        assert_eq!(body.name, "article");
        assert_eq!(body.child_count("h1"), 1);
        assert_eq!(body.child_count("script"), 0);
    }

    #[test]
    fn test_custom_selector_first_match() {
        let extractor = SelectorExtractor::new("div.story-body").unwrap();
        let body = extractor
            .select_body(r#"<div class="story-body"><p>one</p></div><div class="story-body"><p>two</p></div>"#)
            .unwrap();
        assert_eq!(body.child("p").unwrap().text(), "one");
    }

    #[test]
    fn test_body_text_loses_control_characters() {
        let extractor = SelectorExtractor::new(DEFAULT_SELECTOR).unwrap();
        let body = extractor
            .select_body("<article><p>a\u{0B}b\u{01}c</p></article>")
            .unwrap();
        assert_eq!(body.child("p").unwrap().text(), "abc");

        let xml = crate::xml::write_document(&body, false).unwrap();
        assert!(xml.ends_with("<article><p>abc</p></article>"));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        assert!(matches!(
            SelectorExtractor::new("div[["),
            Err(ExtractError::InvalidSelector { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_match_keeps_entry_unenriched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><p>plain</p></body></html>"))
            .mount(&server)
            .await;

        let client = HttpClient::new(&HttpSettings::default()).unwrap();
        let entry = Element::new("entry").with_child(link_element(format!("{}/post", server.uri())));
        let extraction = SelectorExtractor::new(DEFAULT_SELECTOR)
            .unwrap()
            .extract(&client, &entry)
            .await
            .unwrap();
        assert!(extraction.is_empty());
    }
}
