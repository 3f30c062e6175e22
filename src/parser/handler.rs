//! Streaming parse driver
//!
//! [`ParseHandler`] turns document events into bound values. One
//! [`Frame`] is kept per open element, holding the element's parse tree
//! node, its resolved binding chain and its resolution scope:
//!
//! - on start-element the declaration is resolved, attributes are bound,
//!   the element's complex bindings initialize its scope and the parent's
//!   bindings may seed it further;
//! - characters accumulate in the frame (and as text nodes in mixed
//!   content);
//! - on end-element the chain runs over the finished node and the node is
//!   appended to its parent.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::executors::{preprocess, ChildContextExecutor, InitializeExecutor, ParseExecutor};
use super::node::{normalize_mixed, InstanceComponent, Node};
use super::sax::{ContentHandler, SaxAttribute};
use super::Parser;
use crate::binding::{Context, ExecutionChain};
use crate::error::{Error, Result};
use crate::locations::parse_schema_location;
use crate::namespaces::{NamespaceContext, NamespaceSupport, QName};
use crate::schema::builtins::{any_type_name, xs, XSD_ANY_SIMPLE_TYPE, XSD_STRING};
use crate::schema::components::{
    AttributeDecl, ComponentId, Declaration, ElementDecl, TypeDefinition, TypeRef, Variety,
};
use crate::schema::hierarchy::TypeWalker;
use crate::schema::index::SchemaIndex;
use crate::value::Value;
use crate::XSI_NAMESPACE;

const MAX_SUBSTITUTION_DEPTH: usize = 32;

/// Claims elements the schema does not declare where they appear
///
/// Resolvers are consulted after the schema lookups and before the lenient
/// fallbacks, in registration order.
pub trait ElementResolver: Send + Sync {
    /// Return a declaration for `name` under `parent` (None at the root)
    fn resolve(&self, parent: Option<&ElementDecl>, name: &QName, index: &SchemaIndex) -> Option<Arc<ElementDecl>>;
}

impl<F> ElementResolver for F
where
    F: Fn(Option<&ElementDecl>, &QName, &SchemaIndex) -> Option<Arc<ElementDecl>> + Send + Sync,
{
    fn resolve(&self, parent: Option<&ElementDecl>, name: &QName, index: &SchemaIndex) -> Option<Arc<ElementDecl>> {
        self(parent, name, index)
    }
}

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No element seen yet
    AwaitingRoot,
    /// Inside an element, last event was structural
    InElement,
    /// Inside an element, last event was character data
    InText,
    /// The root element closed
    Ended,
}

/// Driver state for one open element
struct Frame {
    element: Arc<ElementDecl>,
    component: Arc<InstanceComponent>,
    node: Node,
    chain: ExecutionChain,
    context: Arc<Context>,
    text: String,
    mixed: bool,
    nil: bool,
}

/// Builds the parse tree of one document from its events
pub struct ParseHandler<'p> {
    parser: &'p Parser,
    state: State,
    namespaces: NamespaceSupport,
    pending_prefixes: Vec<(String, String)>,
    scopes: Vec<Arc<NamespaceContext>>,
    frames: Vec<Frame>,
    synthetic_elements: HashMap<(QName, bool), Arc<ElementDecl>>,
    mock_attributes: HashMap<QName, Arc<AttributeDecl>>,
    list_items: HashMap<ComponentId, Arc<AttributeDecl>>,
    root: Option<Node>,
}

impl<'p> ParseHandler<'p> {
    /// Create a handler for one document
    pub fn new(parser: &'p Parser) -> Self {
        Self {
            parser,
            state: State::AwaitingRoot,
            namespaces: NamespaceSupport::new(),
            pending_prefixes: Vec::new(),
            scopes: Vec::new(),
            frames: Vec::new(),
            synthetic_elements: HashMap::new(),
            mock_attributes: HashMap::new(),
            list_items: HashMap::new(),
            root: None,
        }
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The finished root node
    pub fn into_root(self) -> Option<Node> {
        self.root
    }

    fn index(&self) -> &'p Arc<SchemaIndex> {
        let parser: &'p Parser = self.parser;
        parser.index()
    }

    fn strict(&self) -> bool {
        self.parser.options().strict
    }

    fn path(&self, last: &QName) -> String {
        let mut path = String::new();
        for frame in &self.frames {
            path.push('/');
            path.push_str(&frame.node.name.local_name);
        }
        path.push('/');
        path.push_str(&last.local_name);
        path
    }

    fn any_type(&self) -> Result<Arc<TypeDefinition>> {
        self.index()
            .type_definition(&any_type_name())
            .ok_or_else(|| Error::Schema("xs:anyType missing from schema index".to_string()))
    }

    // ========== Schema Loading ==========

    fn load_schemas(&self, attributes: &[SaxAttribute]) -> Result<()> {
        let mut hints = Vec::new();
        for attr in attributes.iter().filter(|a| a.name.namespace() == Some(XSI_NAMESPACE)) {
            match attr.name.local_name.as_str() {
                "schemaLocation" => hints.extend(
                    parse_schema_location(&attr.value)
                        .into_iter()
                        .map(|(ns, location)| (Some(ns), location)),
                ),
                "noNamespaceSchemaLocation" => hints.push((None, attr.value.trim().to_string())),
                _ => {}
            }
        }
        self.parser.load_schemas(&hints)
    }

    // ========== Declaration Resolution ==========

    fn resolve_element(&mut self, name: &QName) -> Result<Arc<ElementDecl>> {
        let index = self.index();
        let parent = self.frames.last().map(|f| Arc::clone(&f.element));
        // Effective type of the parent, xsi:type included
        let parent_type = self.frames.last().map(|f| Arc::clone(&f.component.type_definition));

        if let Some(ref parent_type) = parent_type {
            if let Some(child) = index.type_child(parent_type, name) {
                return Ok(child.element);
            }
        }

        if let Some(global) = index.element_declaration(name) {
            if let (Some(parent), Some(parent_type)) = (&parent, &parent_type) {
                if !self.substitutes_child(parent_type, &global) {
                    debug!(element = %name, parent = %parent.name, "global element used outside its content model");
                }
            }
            return Ok(global);
        }

        let parser: &'p Parser = self.parser;
        for resolver in parser.element_resolvers() {
            if let Some(decl) = resolver.resolve(parent.as_deref(), name, index) {
                trace!(element = %name, "element claimed by resolver");
                return Ok(decl);
            }
        }

        if self.strict() {
            return Err(Error::Strict(format!("no declaration found for element {}", name)));
        }

        if let Some(ref parent_type) = parent_type {
            let children = index.type_children(parent_type);
            if children.len() == 1 {
                if let Some(only) = children.values().next() {
                    debug!(element = %name, inferred = %only.element.name, "inferring the only possible child");
                    return Ok(Arc::clone(&only.element));
                }
            }
            if let Some(child) = index.type_child(parent_type, &QName::wildcard(name.local_name.clone())) {
                debug!(element = %name, matched = %child.element.name, "matched child by local name");
                return Ok(child.element);
            }
        }
        if let Some(global) = index.element_declaration(&QName::wildcard(name.local_name.clone())) {
            debug!(element = %name, matched = %global.name, "matched global element by local name");
            return Ok(global);
        }

        self.synthetic_element(name, parent.is_none())
    }

    fn substitutes_child(&self, parent_type: &TypeDefinition, element: &ElementDecl) -> bool {
        let index = self.index();
        let mut head = element.substitution_group.clone();
        let mut depth = 0;
        while let Some(name) = head {
            if index.type_child(parent_type, &name).is_some() {
                return true;
            }
            depth += 1;
            if depth > MAX_SUBSTITUTION_DEPTH {
                break;
            }
            head = index.element_declaration(&name).and_then(|d| d.substitution_group.clone());
        }
        false
    }

    fn synthetic_element(&mut self, name: &QName, is_root: bool) -> Result<Arc<ElementDecl>> {
        let key = (name.clone(), is_root);
        if let Some(decl) = self.synthetic_elements.get(&key) {
            return Ok(Arc::clone(decl));
        }

        let root_type = if is_root { self.parser.options().root_type_name()? } else { None };
        let type_name = root_type.unwrap_or_else(any_type_name);
        debug!(element = %name, type_name = %type_name, "no declaration, using a synthetic one");

        let decl = Arc::new(ElementDecl::new(name.clone()).with_type_name(type_name));
        self.synthetic_elements.insert(key, Arc::clone(&decl));
        Ok(decl)
    }

    fn resolve_attribute(
        &mut self,
        element: &ElementDecl,
        owner_type: &TypeDefinition,
        name: &QName,
    ) -> Result<Arc<AttributeDecl>> {
        if let Some(decl) = self.index().type_attribute(owner_type, name) {
            return Ok(decl);
        }
        if self.strict() {
            return Err(Error::Strict(format!(
                "unknown attribute {} on element {}",
                name, element.name
            )));
        }
        if let Some(decl) = self.mock_attributes.get(name) {
            return Ok(Arc::clone(decl));
        }
        debug!(attribute = %name, element = %element.name, "unknown attribute, binding as xs:string");
        let decl = Arc::new(AttributeDecl::new(name.clone()).with_type_name(xs(XSD_STRING)));
        self.mock_attributes.insert(name.clone(), Arc::clone(&decl));
        Ok(decl)
    }

    // ========== Value Binding ==========

    /// Pre-processed text of a component, list items bound through their
    /// item type's chain
    fn initial_value(&mut self, instance: &InstanceComponent, context: &Context, path: &str) -> Result<Value> {
        let value = preprocess(self.index(), &instance.type_definition, &instance.text);
        let Value::List(items) = value else {
            return Ok(value);
        };
        let Some((item_decl, item_type)) = self.list_item(&instance.type_definition) else {
            return Ok(Value::List(items));
        };

        let parser: &'p Parser = self.parser;
        let walker = parser.walker();
        let declaration = Declaration::Attribute(item_decl);
        let mut bound = Vec::with_capacity(items.len());
        for item in items {
            let text = item.as_str().unwrap_or_default().to_string();
            let component = Arc::new(InstanceComponent {
                name: instance.name.clone(),
                declaration: declaration.clone(),
                type_definition: Arc::clone(&item_type),
                text: text.clone(),
                namespaces: Arc::clone(&instance.namespaces),
            });
            let node = Node::attribute(Arc::clone(&component), Value::Null);
            let initial = preprocess(self.index(), &item_type, &text);
            let mut executor = ParseExecutor::new(&component, &node, initial).with_path(path);
            walker.walk(&declaration, None, None, context, &mut executor)?;
            bound.push(executor.into_value());
        }
        Ok(Value::List(bound))
    }

    fn list_item(&mut self, list_type: &Arc<TypeDefinition>) -> Option<(Arc<AttributeDecl>, Arc<TypeDefinition>)> {
        let index = self.index();
        let mut item_ref: Option<TypeRef> = None;
        TypeWalker::new(index).walk(list_type, |t| match t.as_simple() {
            Some(info) if info.variety == Variety::List => {
                item_ref = info.item_type.clone();
                false
            }
            _ => true,
        });
        let item_ref = item_ref?;
        let item_type = index.resolve_type(&item_ref)?;

        let decl = match self.list_items.get(&list_type.id) {
            Some(decl) => Arc::clone(decl),
            None => {
                let name = QName::local(format!("{}_item", list_type.display_name()));
                let decl = match item_ref {
                    TypeRef::Named(type_name) => AttributeDecl::new(name).with_type_name(type_name),
                    TypeRef::Anonymous(def) => AttributeDecl::new(name).with_anonymous_type((*def).clone()),
                };
                let decl = Arc::new(decl);
                self.list_items.insert(list_type.id, Arc::clone(&decl));
                decl
            }
        };
        Some((decl, item_type))
    }

    fn bind_attribute(
        &mut self,
        element: &ElementDecl,
        owner_type: &Arc<TypeDefinition>,
        attr: &SaxAttribute,
        scope: &Arc<NamespaceContext>,
        context: &Context,
        path: &str,
    ) -> Result<Node> {
        let decl = self.resolve_attribute(element, owner_type, &attr.name)?;
        let index = self.index();
        let type_definition = match index.attribute_type(&decl) {
            Some(t) => t,
            None => index
                .type_definition(&xs(XSD_ANY_SIMPLE_TYPE))
                .ok_or_else(|| Error::Schema("xs:anySimpleType missing from schema index".to_string()))?,
        };

        let component = Arc::new(InstanceComponent {
            name: attr.name.clone(),
            declaration: Declaration::Attribute(decl),
            type_definition,
            text: attr.value.clone(),
            namespaces: Arc::clone(scope),
        });
        let mut node = Node::attribute(Arc::clone(&component), Value::Null);

        let initial = self.initial_value(&component, context, path)?;
        let mut executor = ParseExecutor::new(&component, &node, initial).with_path(path);
        self.parser
            .walker()
            .walk(&component.declaration, None, Some(owner_type), context, &mut executor)?;
        node.value = Some(executor.into_value());
        Ok(node)
    }
}

impl<'p> ContentHandler for ParseHandler<'p> {
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.pending_prefixes.push((prefix.to_string(), uri.to_string()));
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &[SaxAttribute]) -> Result<()> {
        match self.state {
            State::Ended => return Err(Error::Xml(format!("element {} after the root element", name))),
            State::AwaitingRoot => self.load_schemas(attributes)?,
            State::InElement | State::InText => {}
        }
        self.state = State::InElement;

        let limits = &self.parser.options().limits;
        limits.check_xml_depth(self.frames.len() + 1)?;
        limits.check_attributes(attributes.len())?;

        self.namespaces.push_context();
        let declared = !self.pending_prefixes.is_empty();
        for (prefix, uri) in self.pending_prefixes.drain(..) {
            self.namespaces.declare_prefix(&prefix, &uri);
        }
        let scope = match self.scopes.last() {
            Some(top) if !declared => Arc::clone(top),
            _ => Arc::new(self.namespaces.current().clone()),
        };
        self.scopes.push(Arc::clone(&scope));

        let path = self.path(name);
        let element = self.resolve_element(name)?;
        let index = self.index();

        let mut xsi_type = None;
        let mut nil = false;
        for attr in attributes.iter().filter(|a| a.name.namespace() == Some(XSI_NAMESPACE)) {
            match attr.name.local_name.as_str() {
                "type" => {
                    let type_name = scope.resolve(attr.value.trim())?;
                    match index.type_definition(&type_name) {
                        Some(def) => xsi_type = Some(def),
                        None if self.strict() => {
                            return Err(Error::Strict(format!("unknown xsi:type {} on {}", type_name, name)))
                        }
                        None => debug!(type_name = %type_name, element = %name, "ignoring unknown xsi:type"),
                    }
                }
                "nil" => {
                    nil = matches!(attr.value.trim(), "true" | "1");
                    if nil && !element.nillable {
                        debug!(element = %name, "xsi:nil on an element not declared nillable");
                    }
                }
                _ => {}
            }
        }

        let type_definition = match xsi_type {
            Some(ref def) => Arc::clone(def),
            None => match index.element_type(&element) {
                Some(def) => def,
                None => self.any_type()?,
            },
        };
        let container = self.frames.last().map(|f| Arc::clone(&f.component.type_definition));

        let parent_context = match self.frames.last() {
            Some(parent) => Arc::clone(&parent.context),
            None => Arc::clone(self.parser.context()),
        };
        let mut context = Context::child(&parent_context);
        context.register_arc(Arc::clone(&scope));

        let declaration = Declaration::Element(Arc::clone(&element));
        let component = Arc::new(InstanceComponent {
            name: name.clone(),
            declaration: declaration.clone(),
            type_definition: Arc::clone(&type_definition),
            text: String::new(),
            namespaces: Arc::clone(&scope),
        });
        let mut node = Node::element(Arc::clone(&component));

        for attr in attributes {
            if attr.name.namespace() == Some(XSI_NAMESPACE) {
                continue;
            }
            let attribute = self.bind_attribute(&element, &type_definition, attr, &scope, &context, &path)?;
            node.attributes.push(attribute);
        }

        let parser: &'p Parser = self.parser;
        let walker = parser.walker();
        let chain = walker
            .resolve_with_type(&declaration, xsi_type.as_ref(), container.as_deref(), &context)?
            .instantiate(walker.registry(), &context)?;

        chain.execute(&mut InitializeExecutor::new(&component, &node, &mut context))?;
        if let Some(parent) = self.frames.last() {
            parent
                .chain
                .execute(&mut ChildContextExecutor::new(&component, &node, &mut context))?;
        }

        let mixed = self.parser.options().handle_mixed && type_definition.is_mixed();
        trace!(element = %name, bindings = chain.len(), mixed, nil, "element opened");
        self.frames.push(Frame {
            element,
            component,
            node,
            chain,
            context: Arc::new(context),
            text: String::new(),
            mixed,
            nil,
        });
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        frame.text.push_str(text);
        if frame.mixed {
            frame.node.children.push(Node::text(text));
        }
        self.state = State::InText;
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        let Some(mut frame) = self.frames.pop() else {
            return Err(Error::Xml(format!("unexpected end of element {}", name)));
        };
        let path = self.path(name);
        self.scopes.pop();
        self.namespaces.pop_context();

        if frame.mixed {
            normalize_mixed(&mut frame.node.children);
        }

        let component = Arc::new(InstanceComponent {
            text: mem::take(&mut frame.text),
            ..(*frame.component).clone()
        });
        frame.node.component = Some(Arc::clone(&component));

        let value = if frame.nil {
            Value::Null
        } else {
            let initial = self.initial_value(&component, &frame.context, &path)?;
            let mut executor = ParseExecutor::new(&component, &frame.node, initial).with_path(&path);
            frame.chain.execute(&mut executor)?;
            let value = executor.into_value();
            if value.is_null() && !frame.chain.is_empty() {
                warn!(element = %path, "binding chain returned null");
            }
            value
        };
        frame.node.value = Some(value);

        match self.frames.last_mut() {
            Some(parent) => {
                parent.node.children.push(frame.node);
                self.state = State::InElement;
            }
            None => {
                self.root = Some(frame.node);
                self.state = State::Ended;
            }
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        if !self.frames.is_empty() {
            return Err(Error::Xml("document ended with open elements".to_string()));
        }
        self.synthetic_elements.clear();
        self.mock_attributes.clear();
        self.list_items.clear();
        self.state = State::Ended;
        Ok(())
    }
}
