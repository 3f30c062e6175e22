//! Parse tree nodes
//!
//! One [`Node`] is created per element, attribute and (in mixed content)
//! text occurrence. A node lives only until its parent has consumed it:
//! the driver appends finished children to the parent frame's node, and
//! bindings read them back through the lookup helpers here.

use std::sync::Arc;

use crate::namespaces::{NamespaceContext, QName};
use crate::schema::components::{Declaration, TypeDefinition};
use crate::value::Value;

/// The schema view of one occurrence in the instance document
#[derive(Debug, Clone)]
pub struct InstanceComponent {
    /// Name as it appeared in the document
    pub name: QName,
    /// Declaration the occurrence was bound to
    pub declaration: Declaration,
    /// Effective type (after xsi:type substitution)
    pub type_definition: Arc<TypeDefinition>,
    /// Raw text content
    pub text: String,
    /// Prefix mappings in scope at the occurrence
    pub namespaces: Arc<NamespaceContext>,
}

impl InstanceComponent {
    /// Check if the occurrence is an attribute
    pub fn is_attribute(&self) -> bool {
        self.declaration.is_attribute()
    }
}

/// Kind of parse tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Element occurrence
    Element,
    /// Attribute occurrence
    Attribute,
    /// Character data inside mixed content
    Text,
}

/// Parse tree node
#[derive(Debug, Clone)]
pub struct Node {
    /// Node kind
    pub kind: NodeKind,
    /// Name of the element or attribute (empty local name for text)
    pub name: QName,
    /// Schema component, absent for text nodes
    pub component: Option<Arc<InstanceComponent>>,
    /// Child element and text nodes in document order
    pub children: Vec<Node>,
    /// Attribute nodes in document order
    pub attributes: Vec<Node>,
    /// Bound value, set once the binding chain has run
    pub value: Option<Value>,
}

impl Node {
    /// Create an element node
    pub fn element(component: Arc<InstanceComponent>) -> Self {
        Self {
            kind: NodeKind::Element,
            name: component.name.clone(),
            component: Some(component),
            children: Vec::new(),
            attributes: Vec::new(),
            value: None,
        }
    }

    /// Create an attribute node with its bound value
    pub fn attribute(component: Arc<InstanceComponent>, value: Value) -> Self {
        Self {
            kind: NodeKind::Attribute,
            name: component.name.clone(),
            component: Some(component),
            children: Vec::new(),
            attributes: Vec::new(),
            value: Some(value),
        }
    }

    /// Create a text node
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            name: QName::local(""),
            component: None,
            children: Vec::new(),
            attributes: Vec::new(),
            value: Some(Value::String(text.into())),
        }
    }

    /// Text of a text node
    pub fn as_text(&self) -> Option<&str> {
        match (self.kind, &self.value) {
            (NodeKind::Text, Some(Value::String(s))) => Some(s),
            _ => None,
        }
    }

    /// Bound value, or null if unset
    pub fn value_or_null(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }

    /// Child element nodes
    pub fn element_children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|c| c.kind == NodeKind::Element)
    }

    /// First child element with a local name
    pub fn child(&self, local_name: &str) -> Option<&Node> {
        self.element_children().find(|c| c.name.local_name == local_name)
    }

    /// Every child element with a local name
    pub fn children_named(&self, local_name: &str) -> Vec<&Node> {
        self.element_children()
            .filter(|c| c.name.local_name == local_name)
            .collect()
    }

    /// Check for a child element
    pub fn has_child(&self, local_name: &str) -> bool {
        self.child(local_name).is_some()
    }

    /// Value of the first child element with a local name
    pub fn child_value(&self, local_name: &str) -> Option<&Value> {
        self.child(local_name).and_then(|c| c.value.as_ref())
    }

    /// Values of every child element with a local name
    pub fn child_values(&self, local_name: &str) -> Vec<&Value> {
        self.children_named(local_name)
            .into_iter()
            .filter_map(|c| c.value.as_ref())
            .collect()
    }

    /// Attribute node with a local name
    pub fn attribute_node(&self, local_name: &str) -> Option<&Node> {
        self.attributes.iter().find(|a| a.name.local_name == local_name)
    }

    /// Value of an attribute with a local name
    pub fn attribute_value(&self, local_name: &str) -> Option<&Value> {
        self.attribute_node(local_name).and_then(|a| a.value.as_ref())
    }
}

fn is_xml_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// Normalize the children of a mixed content element
///
/// Whitespace-only text nodes at either end are dropped, and runs of
/// consecutive whitespace-only text nodes inside are reduced to their
/// first node. Applying it to an already normalized list changes nothing.
pub fn normalize_mixed(children: &mut Vec<Node>) {
    let blank = |n: &Node| n.as_text().map_or(false, is_xml_whitespace);

    let leading = children.iter().take_while(|&n| blank(n)).count();
    children.drain(..leading);
    while children.last().map_or(false, blank) {
        children.pop();
    }

    let mut previous_blank = false;
    children.retain(|child| {
        let is_blank = blank(child);
        let keep = !(is_blank && previous_blank);
        previous_blank = is_blank;
        keep
    });
}
