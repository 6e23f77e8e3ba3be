use scraper::{Html, Selector};
use serde_json::Value;

/// Finds the first string `contentUrl` in the page's JSON-LD blocks.
///
/// Blocks may be a single object, an array of objects, or an object with an
/// `@graph`; the search walks all of them depth-first. Blocks that are not
/// valid JSON are skipped.
pub fn find_content_url(document: &Html) -> Option<String> {
    find_string(document, "contentUrl")
}

/// Finds the first string value stored under `key` in any JSON-LD block.
pub fn find_string(document: &Html, key: &str) -> Option<String> {
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;

    for script in document.select(&selector) {
        let text = script.text().collect::<String>();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(json) => {
                if let Some(found) = find_key(&json, key) {
                    return Some(found.to_string());
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable JSON-LD block");
            }
        }
    }
    None
}

fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).and_then(Value::as_str) {
                return Some(found);
            }
            map.values().find_map(|child| find_key(child, key))
        }
        Value::Array(items) => items.iter().find_map(|item| find_key(item, key)),
        _ => None,
    }
}
