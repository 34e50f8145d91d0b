//! Minimal element tree over quick-xml events
//!
//! Namespaces are dropped (elements and attributes are keyed by local name),
//! text is kept verbatim so display strings preserve their spacing.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::DocumentError;

#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content with surrounding whitespace removed
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn open_element(reader: &Reader<&[u8]>, start: &quick_xml::events::BytesStart<'_>) -> Result<Element, DocumentError> {
    let mut element = Element {
        name: local_name(start.local_name().as_ref()),
        ..Element::default()
    };

    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(reader, e))?;
        let key = attr.key;
        // xmlns and xmlns:* declarations
        if key.as_ref() == b"xmlns" || key.prefix().is_some_and(|p| p.as_ref() == b"xmlns") {
            continue;
        }
        let value = attr.unescape_value().map_err(|e| xml_error(reader, e))?;
        element
            .attributes
            .push((local_name(key.local_name().as_ref()), value.into_owned()));
    }

    Ok(element)
}

fn xml_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> DocumentError {
    DocumentError::Xml {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

/// Parse a whole document into its root element
pub(crate) fn parse_tree(xml: &str) -> Result<Element, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(&reader, e))?;
        match event {
            Event::Start(start) => {
                let element = open_element(&reader, &start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&reader, &start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(xml_error(&reader, "multiple root elements")),
                }
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    return Err(xml_error(&reader, "unexpected closing tag"));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(xml_error(&reader, "multiple root elements")),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| xml_error(&reader, e))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&raw));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(&reader, format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| xml_error(&reader, "document has no root element"))
}
