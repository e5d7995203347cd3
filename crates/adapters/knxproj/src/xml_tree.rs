//! Generic element tree built from a document with quick-xml.
//!
//! Tag and attribute names are stored by local name (namespace prefix
//! removed); lookups ignore case.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::DocumentError;

/// Attributes of one element, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Value of the attribute `name`, if present and not blank.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// First non-blank value among `names`.
    #[must_use]
    pub fn first(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One element with its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Attributes,
    /// Direct text content, trimmed.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Whether the local tag name is one of `names` (any case).
    #[must_use]
    pub fn is(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.tag.eq_ignore_ascii_case(name))
    }
}

fn local(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn open(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element, DocumentError> {
    let mut element = Element {
        tag: local(start.local_name().as_ref()),
        ..Element::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| xml_error(reader, err.into()))?;
        let value = attribute
            .unescape_value()
            .map_err(|err| xml_error(reader, err))?;
        element
            .attributes
            .push(local(attribute.key.local_name().as_ref()), value);
    }
    Ok(element)
}

fn xml_error(reader: &Reader<&[u8]>, source: quick_xml::Error) -> DocumentError {
    DocumentError::Xml {
        position: reader.buffer_position(),
        source,
    }
}

fn attach(stack: &mut [Element], roots: &mut Vec<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

/// Parse `text` into its top-level elements.
///
/// # Errors
///
/// Returns [`DocumentError`] for malformed markup, including elements left
/// open at the end of the document.
pub fn parse(text: &str) -> Result<Vec<Element>, DocumentError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut roots = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let element = open(&start, &reader)?;
                stack.push(element);
            }
            Ok(Event::Empty(start)) => {
                let element = open(&start, &reader)?;
                attach(&mut stack, &mut roots, element);
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut roots, element);
                }
            }
            Ok(Event::Text(content)) => {
                if let Some(current) = stack.last_mut() {
                    let content = content.unescape().map_err(|err| xml_error(&reader, err))?;
                    current.text.push_str(content.trim());
                }
            }
            Ok(Event::CData(content)) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(String::from_utf8_lossy(&content).trim());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(xml_error(&reader, err)),
        }
    }

    if let Some(open) = stack.pop() {
        return Err(DocumentError::Unclosed(open.tag));
    }
    Ok(roots)
}
