use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Element, Node, XmlError};

/// Maximum element nesting depth accepted from remote documents.
const MAX_DEPTH: usize = 256;

/// Parses XML text into an owned element tree and returns the root element.
///
/// Whitespace-only text between elements is dropped; all other text is kept
/// verbatim. The XML declaration, doctype and processing instructions are
/// discarded, as are comments outside the root.
///
/// # Security
///
/// `quick-xml` (0.37) never parses `<!ENTITY>` declarations, so custom
/// entities fail to unescape instead of expanding. Nesting depth is capped.
pub fn parse_document(content: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| XmlError::Malformed {
            position: position as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(XmlError::MultipleRoots);
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::Malformed {
                        position: position as u64,
                        message: format!("nesting depth exceeds {MAX_DEPTH}"),
                    });
                }
                stack.push(start_element(&e, &reader, position as u64)?);
            }
            Event::Empty(e) => {
                let el = start_element(&e, &reader, position as u64)?;
                close(el, &mut stack, &mut root)?;
            }
            Event::End(e) => {
                let found = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let el = stack.pop().ok_or_else(|| XmlError::MismatchedTag {
                    expected: String::new(),
                    found: found.clone(),
                })?;
                if el.name != found {
                    return Err(XmlError::MismatchedTag {
                        expected: el.name,
                        found,
                    });
                }
                close(el, &mut stack, &mut root)?;
            }
            Event::Text(e) => {
                let Some(parent) = stack.last_mut() else {
                    continue;
                };
                let text = e.unescape().map_err(|err| XmlError::Malformed {
                    position: position as u64,
                    message: err.to_string(),
                })?;
                if !text.trim().is_empty() {
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::CData(String::from_utf8_lossy(&e).into_owned()));
                }
            }
            Event::Comment(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Comment(String::from_utf8_lossy(&e).into_owned()));
                }
            }
            Event::Eof => break,
            // Declaration, doctype, processing instructions
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Malformed {
            position: reader.buffer_position() as u64,
            message: format!("unclosed element <{}>", open.name),
        });
    }
    root.ok_or(XmlError::NoRoot)
}

fn start_element(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    position: u64,
) -> Result<Element, XmlError> {
    let mut el = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(element = %el.name, error = %err, "Skipping malformed attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| XmlError::Malformed {
                position,
                message: err.to_string(),
            })?;
        el.attributes.push((key, value.into_owned()));
    }
    Ok(el)
}

/// Attaches a finished element to its parent, or makes it the root.
fn close(
    el: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(el);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        None => Err(XmlError::MultipleRoots),
    }
}
