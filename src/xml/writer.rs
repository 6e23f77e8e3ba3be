use std::io::Cursor;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{strip_invalid_chars, Element, Node, XmlError};

/// Serializes a tree as a standalone UTF-8 XML document.
///
/// Characters XML forbids are removed from text, comments and attribute
/// values, which are then escaped by `quick-xml`. CDATA sections that
/// would contain the `]]>` terminator are written as escaped text instead, and
/// comments containing `--` are dropped so the output is always well-formed.
pub fn write_document(root: &Element, pretty: bool) -> Result<String, XmlError> {
    let mut writer = if pretty {
        Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
    } else {
        Writer::new(Cursor::new(Vec::new()))
    };

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
    )?;
    write_element(&mut writer, root)?;

    let mut bytes = writer.into_inner().into_inner();
    if pretty {
        bytes.push(b'\n');
    }
    String::from_utf8(bytes).map_err(|e| XmlError::Write(e.to_string()))
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, el: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), &*strip_invalid_chars(value)));
    }

    if el.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    for child in &el.children {
        match child {
            Node::Element(inner) => write_element(writer, inner)?,
            Node::Text(text) => {
                let text = strip_invalid_chars(text);
                emit(writer, Event::Text(BytesText::new(&*text)))?
            }
            Node::CData(text) => {
                let text = strip_invalid_chars(text);
                if text.contains("]]>") {
                    emit(writer, Event::Text(BytesText::new(&*text)))?
                } else {
                    emit(writer, Event::CData(BytesCData::new(&*text)))?
                }
            }
            Node::Comment(text) => {
                let text = strip_invalid_chars(text);
                if text.contains("--") {
                    tracing::debug!(element = %el.name, "Dropping comment that cannot be serialized");
                } else {
                    emit(writer, Event::Comment(BytesText::from_escaped(&*text)))?
                }
            }
        }
    }
    emit(writer, Event::End(BytesEnd::new(el.name.as_str())))
}

fn emit(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Write(e.to_string()))
}
