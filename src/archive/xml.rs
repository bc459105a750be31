use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, SolutionError};
use crate::table::{FieldMap, FieldValue};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One element of a parsed document. Tags are namespace-stripped local
/// names; attributes are not kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub tag: String,
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Distinct child tags, in order of first appearance
    pub fn child_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for child in &self.children {
            if !tags.contains(&child.tag.as_str()) {
                tags.push(&child.tag);
            }
        }
        tags
    }

    /// Flatten this element's children into a field map: text children
    /// become text values, the rest recurse into nested maps
    pub fn to_field_map(&self) -> FieldMap {
        let mut map = FieldMap::new();
        for child in &self.children {
            let value = match &child.text {
                Some(text) => FieldValue::Text(text.clone()),
                None => FieldValue::Nested(child.to_field_map()),
            };
            map.insert(child.tag.clone(), value);
        }
        map
    }
}

/// Decodes the solution's XML metadata document
pub trait XmlTreeDecoder {
    /// Parse raw document bytes into an element tree. `entry` names the
    /// archive entry for error messages.
    fn parse(&self, entry: &str, bytes: &[u8]) -> Result<XmlNode>;

    /// Flatten every immediate child of `root` tagged `record` into a
    /// field map, in document order
    fn flatten(&self, root: &XmlNode, record: &str) -> Vec<FieldMap> {
        root.children
            .iter()
            .filter(|child| child.tag == record)
            .map(XmlNode::to_field_map)
            .collect()
    }
}

/// Default decoder backed by quick-xml's pull parser
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickXmlDecoder;

impl XmlTreeDecoder for QuickXmlDecoder {
    fn parse(&self, entry: &str, bytes: &[u8]) -> Result<XmlNode> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = Reader::from_reader(bytes);

        let xml_error = |message: String| SolutionError::Xml {
            entry: entry.to_string(),
            message,
        };

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(format!("at byte {}: {}", reader.buffer_position(), e)))?;

            match event {
                Event::Start(e) => {
                    let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    stack.push(XmlNode::new(tag));
                }
                Event::Empty(e) => {
                    let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    attach(&mut stack, &mut root, XmlNode::new(tag));
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|e| xml_error(e.to_string()))?;
                    append_text(&mut stack, &text);
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    append_text(&mut stack, &text);
                }
                Event::End(_) => {
                    let mut node = stack
                        .pop()
                        .ok_or_else(|| xml_error("unbalanced closing tag".to_string()))?;
                    drop_indentation(&mut node);
                    attach(&mut stack, &mut root, node);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(xml_error(format!("unclosed element <{}>", stack[stack.len() - 1].tag)));
        }

        root.ok_or_else(|| xml_error("document has no root element".to_string()))
    }
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

/// Whitespace-only text around child elements is layout, not a value
fn drop_indentation(node: &mut XmlNode) {
    let layout_only = node.text.as_deref().is_some_and(|t| t.trim().is_empty());
    if layout_only && !node.children.is_empty() {
        node.text = None;
    }
}

fn append_text(stack: &mut [XmlNode], text: &str) {
    // Text outside the root element is ignored
    if let Some(node) = stack.last_mut() {
        if text.is_empty() {
            return;
        }
        node.text.get_or_insert_with(String::new).push_str(text);
    }
}
