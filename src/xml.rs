//! Owned XML tree for control-plane payloads.
//!
//! Every response the control plane returns is an XML document. This
//! module parses one into a navigable tree with child lookup by tag,
//! text extraction and canonical re-serialization. The tree is the
//! source of truth an [`Element`](crate::Element) holds on to; the
//! coercion engine only ever reads from it.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ClientError, Result};

/// One node of a parsed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    tag: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse an XML document into its root node.
    ///
    /// Declarations, comments and processing instructions are skipped;
    /// whitespace-only text is trimmed away.
    pub fn parse(input: &str) -> Result<XmlNode> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(Self::from_start(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let node = Self::from_start(e)?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Text(ref t)) => {
                    let value = t
                        .unescape()
                        .map_err(|e| ClientError::Xml(e.to_string()))?;
                    Self::append_text(&mut stack, &value);
                }
                Ok(Event::CData(ref c)) => {
                    let bytes = c.clone().into_inner();
                    let value = String::from_utf8_lossy(&bytes).into_owned();
                    Self::append_text(&mut stack, &value);
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| ClientError::Xml("unbalanced end tag".to_string()))?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ClientError::Xml(format!(
                        "parse error at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if !stack.is_empty() {
            return Err(ClientError::Xml("unclosed element".to_string()));
        }
        root.ok_or_else(|| ClientError::Xml("empty document".to_string()))
    }

    fn from_start(e: &BytesStart<'_>) -> Result<XmlNode> {
        let tag = std::str::from_utf8(e.name().as_ref())
            .map_err(|_| ClientError::Xml("invalid UTF-8 in tag name".to_string()))?
            .to_string();

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| ClientError::Xml(e.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|_| ClientError::Xml("invalid UTF-8 in attribute".to_string()))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| ClientError::Xml(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(XmlNode {
            tag,
            attributes,
            text: None,
            children: Vec::new(),
        })
    }

    fn attach(
        stack: &mut [XmlNode],
        root: &mut Option<XmlNode>,
        node: XmlNode,
    ) -> Result<()> {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        } else if root.is_none() {
            *root = Some(node);
        } else {
            return Err(ClientError::Xml("multiple root elements".to_string()));
        }
        Ok(())
    }

    fn append_text(stack: &mut [XmlNode], value: &str) {
        if value.is_empty() {
            return;
        }
        if let Some(top) = stack.last_mut() {
            match top.text {
                Some(ref mut existing) => existing.push_str(value),
                None => top.text = Some(value.to_string()),
            }
        }
    }

    /// Tag name of this node.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Text content, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Immediate children in document order.
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// First immediate child with the given tag.
    pub fn find(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// All immediate children with the given tag, in document order.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Text content of the first immediate child with the given tag.
    pub fn text_of(&self, tag: &str) -> Option<&str> {
        self.find(tag).and_then(|c| c.text())
    }

    /// Serialize this node back to canonical XML text.
    ///
    /// Re-parsing the output reproduces the same tags, attributes and
    /// child order.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.text.is_none() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(ref text) = self.text {
            out.push_str(&escape(text.as_str()));
        }
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}
