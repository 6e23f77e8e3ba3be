use super::{strip_invalid_chars, Element};

/// `<tag>value</tag>`, without characters XML forbids.
pub fn text_element(tag: &str, value: impl Into<String>) -> Element {
    let value = value.into();
    Element::new(tag).with_text(strip_invalid_chars(&value).into_owned())
}

/// Atom `<link href="..."/>`.
pub fn link_element(href: impl Into<String>) -> Element {
    Element::new("link").with_attr("href", href)
}

/// Atom enclosure link pointing at a downloadable media asset.
///
/// Attribute order is `rel`, `type`, `title`, `href`; `type` and `title`
/// are omitted when not known.
pub fn enclosure_element(href: &str, mime_type: Option<&str>, title: Option<&str>) -> Element {
    let mut link = Element::new("link").with_attr("rel", "enclosure");
    if let Some(mime_type) = mime_type {
        link.set_attr("type", mime_type);
    }
    if let Some(title) = title {
        link.set_attr("title", title);
    }
    link.set_attr("href", href);
    link
}
