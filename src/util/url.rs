use thiserror::Error;
use url::Url;

/// Errors that can occur while checking a feed, page or media URL.
#[derive(Error, Debug)]
pub enum UrlError {
    /// The URL string could not be parsed.
    #[error("Invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Parses `url_str` and accepts it only if it is an absolute `http` or
/// `https` URL.
///
/// # Examples
///
/// ```
/// use atomizer::util::validate_url;
///
/// assert!(validate_url("https://feeds.npr.org/3/rss.xml").is_ok());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// assert!(validate_url("access denied").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|source| UrlError::InvalidUrl {
        url: url_str.to_string(),
        source,
    })?;
    check_scheme(url)
}

/// Resolves `href` against the page it was found on, so relative links
/// (`/podcasts/a.mp3`, `a.mp3`) become absolute.
pub fn resolve_href(base: &str, href: &str) -> Result<Url, UrlError> {
    let base = validate_url(base)?;
    let joined = base
        .join(href.trim())
        .map_err(|source| UrlError::InvalidUrl {
            url: href.to_string(),
            source,
        })?;
    check_scheme(joined)
}

/// Drops everything from the first `?`, which on media links is usually
/// tracking parameters.
pub fn strip_query(href: &str) -> &str {
    match href.find('?') {
        Some(idx) => &href[..idx],
        None => href,
    }
}

fn check_scheme(url: Url) -> Result<Url, UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_owned())),
    }
}
