//! XML element trees
//!
//! A small DOM used as the output of encoding: complex bindings receive and
//! return [`Element`]s, and [`Element::to_xml`] serializes a finished tree
//! with quick-xml, declaring every namespace the tree uses on the root.

use std::io::Cursor;

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, QName};
use crate::XML_NAMESPACE;

/// Node in an element's content
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// Child element
    Element(Element),
    /// Character data
    Text(String),
}

/// XML Element in the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element qualified name
    pub name: QName,
    /// Attributes in insertion order
    pub attributes: IndexMap<QName, String>,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

impl Element {
    /// Create a new element
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Get the local name
    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    /// Get an attribute by qualified name
    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set an attribute
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        self.attributes.insert(name, value.into());
    }

    /// Append a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(XmlNode::Element(child));
    }

    /// Append character data
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    /// Concatenated text content, None when the element has no text nodes
    pub fn text(&self) -> Option<String> {
        let mut text: Option<String> = None;
        for child in &self.children {
            if let XmlNode::Text(t) = child {
                text.get_or_insert_with(String::new).push_str(t);
            }
        }
        text
    }

    /// Replace the text content
    ///
    /// The first text node is updated in place and any others removed; if
    /// there is none a new text node is appended.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        let mut replaced = false;
        self.children.retain_mut(|child| match child {
            XmlNode::Text(existing) if !replaced => {
                *existing = text.clone();
                replaced = true;
                true
            }
            XmlNode::Text(_) => false,
            XmlNode::Element(_) => true,
        });
        if !replaced {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.elements().filter(|e| e.local_name() == local_name).collect()
    }

    fn collect_namespaces(&self, out: &mut Vec<String>) {
        let names = std::iter::once(&self.name).chain(self.attributes.keys());
        for name in names {
            if let Some(ns) = name.namespace() {
                if ns != XML_NAMESPACE && !out.iter().any(|n| n == ns) {
                    out.push(ns.to_string());
                }
            }
        }
        for child in self.elements() {
            child.collect_namespaces(out);
        }
    }

    /// Serialize the tree
    ///
    /// Prefixes come from `namespaces`; namespaces without a mapping get
    /// generated `ns0`, `ns1`, ... prefixes. All declarations are written
    /// on the root element.
    pub fn to_xml(&self, namespaces: &NamespaceContext, options: &WriteOptions) -> Result<String> {
        let mut used = Vec::new();
        self.collect_namespaces(&mut used);

        let mut context = NamespaceContext::new();
        if let Some(default) = namespaces.get_default_namespace() {
            if used.iter().any(|ns| ns == default) && self.name.namespace() == Some(default) {
                context.set_default_namespace(default);
            }
        }
        let mut generated = 0;
        for ns in &used {
            if context.get_default_namespace() == Some(ns.as_str()) {
                continue;
            }
            match namespaces.get_prefix(ns).filter(|p| !p.is_empty()) {
                Some(prefix) => context.add_prefix(prefix, ns.as_str()),
                None => {
                    while context.get_namespace(&format!("ns{}", generated)).is_some() {
                        generated += 1;
                    }
                    context.add_prefix(format!("ns{}", generated), ns.as_str());
                }
            }
        }

        let mut writer = if options.indent > 0 {
            Writer::new_with_indent(Cursor::new(Vec::new()), b' ', options.indent)
        } else {
            Writer::new(Cursor::new(Vec::new()))
        };
        if options.xml_declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(|e| Error::Xml(e.to_string()))?;
        }
        self.write(&mut writer, &context, true)?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| Error::Encode(format!("serialized XML is not UTF-8: {}", e)))
    }

    fn prefixed(name: &QName, context: &NamespaceContext, is_attribute: bool) -> String {
        match name.namespace() {
            None => name.local_name.clone(),
            Some(XML_NAMESPACE) => format!("xml:{}", name.local_name),
            Some(ns) if !is_attribute && context.get_default_namespace() == Some(ns) => name.local_name.clone(),
            Some(ns) => match context.get_prefix(ns).filter(|p| !p.is_empty()) {
                Some(prefix) => format!("{}:{}", prefix, name.local_name),
                None => name.local_name.clone(),
            },
        }
    }

    fn write(&self, writer: &mut Writer<Cursor<Vec<u8>>>, context: &NamespaceContext, root: bool) -> Result<()> {
        let tag = Self::prefixed(&self.name, context, false);
        let mut start = BytesStart::new(tag.as_str());

        if root {
            if let Some(default) = context.get_default_namespace() {
                start.push_attribute(("xmlns", default));
            }
            let mut declarations: Vec<_> = context.iter().collect();
            declarations.sort();
            for (prefix, ns) in declarations {
                if !prefix.is_empty() {
                    start.push_attribute((format!("xmlns:{}", prefix).as_str(), ns.as_str()));
                }
            }
        }
        for (name, value) in &self.attributes {
            let attr = Self::prefixed(name, context, true);
            start.push_attribute((attr.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| Error::Xml(e.to_string()));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| Error::Xml(e.to_string()))?;
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write(writer, context, false)?,
                XmlNode::Text(t) => writer
                    .write_event(Event::Text(BytesText::new(t)))
                    .map_err(|e| Error::Xml(e.to_string()))?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(tag.as_str())))
            .map_err(|e| Error::Xml(e.to_string()))
    }
}

/// Serialization options
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Spaces per indentation level (0 disables indentation)
    pub indent: usize,
    /// Whether to emit an XML declaration
    pub xml_declaration: bool,
}
