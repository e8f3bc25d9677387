//! Owned XML element tree.
//!
//! Documents are parsed once with `quick-xml`'s namespace-resolving reader and then queried
//! read-only. Each element records the namespace URI it resolved to, so queries never need to
//! consult (or mutate) prefix declarations on the document itself.

use crate::{CdaError, CdaResult};
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

/// Deepest element nesting accepted by [`Document::parse`], counting the root as 1.
pub const MAX_NESTING_DEPTH: usize = 256;

/// A parsed XML document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

/// An XML element with its resolved namespace, attributes and children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    namespace: Option<String>,
    prefix: Option<String>,
    local_name: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

/// An attribute as written in the source, with its value unescaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    Element(Element),
    Text(String),
}

impl Document {
    /// Parse XML text into a document tree.
    ///
    /// # Errors
    ///
    /// Returns [`CdaError`] if the text is not well-formed XML: syntax errors, mismatched or
    /// unclosed tags, unbound namespace prefixes, text outside the root element, or no root
    /// element at all. Elements nested deeper than [`MAX_NESTING_DEPTH`] are also rejected.
    pub fn parse(xml: &str) -> CdaResult<Self> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut reader = NsReader::from_str(xml);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            match event {
                Event::Start(start) => {
                    check_depth(&stack)?;
                    let element = open_element(resolved, &start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    check_depth(&stack)?;
                    let element = open_element(resolved, &start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        CdaError::Malformed("closing tag without matching opening tag".into())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    push_text(&mut stack, &text)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and doctypes carry no data.
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(CdaError::Malformed(format!(
                "unclosed element <{}>",
                open.qualified_name()
            )));
        }

        root.map(|root| Document { root })
            .ok_or_else(|| CdaError::Malformed("document has no root element".into()))
    }

    /// The document's root element.
    pub fn root(&self) -> &Element {
        &self.root
    }
}

impl Element {
    /// Local (unprefixed) element name.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Namespace URI the element resolved to, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Name as written in the source, including any prefix.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Value of the attribute written as `name` (namespace declarations are not attributes).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given local name, in any namespace.
    pub fn first_child(&self, local_name: &str) -> Option<&Element> {
        self.children().find(|child| child.local_name == local_name)
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Element(element) => element.collect_text(out),
                Node::Text(text) => out.push_str(text),
            }
        }
    }

    /// Serialise the element and its subtree back to XML text.
    ///
    /// Classification of vital-sign entries matches keywords against this text, so it
    /// includes tag names and attribute values as well as character data.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        let name = self.qualified_name();
        out.push('<');
        out.push_str(&name);
        for attribute in &self.attributes {
            out.push(' ');
            out.push_str(&attribute.name);
            out.push_str("=\"");
            out.push_str(&escape(&attribute.value));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for node in &self.children {
            match node {
                Node::Element(element) => element.write_xml(out),
                Node::Text(text) => out.push_str(&partial_escape(text)),
            }
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

fn check_depth(open: &[Element]) -> CdaResult<()> {
    if open.len() >= MAX_NESTING_DEPTH {
        return Err(CdaError::Malformed(format!(
            "element nesting exceeds {MAX_NESTING_DEPTH} levels"
        )));
    }
    Ok(())
}

fn utf8(bytes: &[u8]) -> CdaResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| CdaError::Malformed(format!("name is not valid UTF-8: {e}")))
}

fn open_element(resolved: ResolveResult<'_>, start: &BytesStart<'_>) -> CdaResult<Element> {
    let namespace = match resolved {
        ResolveResult::Bound(ns) => Some(utf8(ns.as_ref())?),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(CdaError::Malformed(format!(
                "unbound namespace prefix '{}'",
                String::from_utf8_lossy(&prefix)
            )))
        }
    };

    let name = start.name();
    let prefix = name.prefix().map(|p| utf8(p.as_ref())).transpose()?;
    let local_name = utf8(start.local_name().as_ref())?;

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let name = utf8(attr.key.as_ref())?;
        if name == "xmlns" || name.starts_with("xmlns:") {
            continue;
        }
        let value = attr.unescape_value()?.into_owned();
        attributes.push(Attribute { name, value });
    }

    Ok(Element {
        namespace,
        prefix,
        local_name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> CdaResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(CdaError::Malformed(format!(
                "second root element <{}>",
                element.qualified_name()
            )))
        }
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) -> CdaResult<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Text(text.to_string()));
            Ok(())
        }
        None => Err(CdaError::Malformed(
            "character data outside the root element".into(),
        )),
    }
}
