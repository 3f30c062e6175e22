//! Encode drivers
//!
//! [`Encoder::encode_element`] and [`Encoder::encode_attribute`] run one
//! component's binding chain over a domain object. [`Encoder::encode`]
//! builds a whole document: the element chain produces each element, then
//! attribute and child values are read from the object through the complex
//! bindings' `property` lookups, in schema order, and encoded recursively.

pub mod executors;

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::binding::configuration::assemble;
use crate::binding::{BindingConfiguration, BindingWalker, Context, ExecutionChain};
use crate::config::EncoderOptions;
use crate::convert::{Converters, TypeConverter};
use crate::documents::{Element, WriteOptions};
use crate::error::{Error, Result};
use crate::loaders::SchemaResolver;
use crate::locations::Location;
use crate::namespaces::{NamespaceContext, QName};
use crate::schema::components::{AttributeDecl, Declaration, ElementDecl, TypeDefinition};
use crate::schema::index::SchemaIndex;
use crate::value::Value;
use crate::XSI_NAMESPACE;

pub use executors::{xsi_nil, AttributeEncodeExecutor, ElementEncodeExecutor};

/// Encodes domain objects to XML
pub struct Encoder {
    index: Arc<SchemaIndex>,
    walker: Arc<BindingWalker>,
    context: Arc<Context>,
    converters: Converters,
    namespaces: NamespaceContext,
    options: EncoderOptions,
    resolver: SchemaResolver,
    pending: Mutex<Vec<(String, Location)>>,
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("walker", &self.walker)
            .field("converters", &self.converters)
            .field("options", &self.options)
            .finish()
    }
}

/// Output namespaces, with a prefix for the XSI namespace
///
/// The nil marker uses the prefix mapped to XSI; without one it is written
/// with `xs`, or `xsi` when `xs` is already taken.
fn output_namespaces(options: &EncoderOptions) -> NamespaceContext {
    let mut namespaces = options.namespace_context();
    if namespaces.get_prefix(XSI_NAMESPACE).is_none() {
        let prefix = if namespaces.get_namespace("xs").is_none() { "xs" } else { "xsi" };
        namespaces.add_prefix(prefix, XSI_NAMESPACE);
    }
    namespaces
}

/// Value of a named attribute or child, asked of the chain's complex bindings
fn property(chain: &ExecutionChain, object: &Value, name: &QName) -> Option<Value> {
    let mut complex = chain.execution_order().into_iter().filter_map(|b| b.as_complex()).peekable();
    if complex.peek().is_none() {
        return object.as_record().and_then(|r| r.get(&name.local_name)).cloned();
    }
    complex.find_map(|b| b.property(object, name))
}

impl Encoder {
    /// Create an encoder for one configuration with default options
    pub fn new(configuration: impl BindingConfiguration + 'static) -> Self {
        Self::with_options(vec![Arc::new(configuration)], EncoderOptions::default())
    }

    /// Create an encoder for several configurations
    pub fn with_options(configurations: Vec<Arc<dyn BindingConfiguration>>, options: EncoderOptions) -> Self {
        let assembly = assemble(&configurations);
        let index = Arc::new(SchemaIndex::new(assembly.schemas));
        let walker = Arc::new(BindingWalker::with_capacity(
            Arc::clone(&index),
            Arc::new(assembly.registry),
            options.chain_cache_capacity,
        ));
        let namespaces = output_namespaces(&options);

        let mut context = assembly.context;
        context.register_arc(Arc::clone(&index));
        context.register(namespaces.clone());

        Self {
            index,
            walker,
            context: Arc::new(context),
            converters: Converters::new(),
            namespaces,
            options,
            resolver: SchemaResolver::default(),
            pending: Mutex::new(assembly.schema_locations),
        }
    }

    /// Replace the converter list
    pub fn with_converters(mut self, converters: Converters) -> Self {
        self.converters = converters;
        self
    }

    /// Add a converter, tried before the ones already registered
    pub fn with_converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converters = self.converters.with_converter(converter);
        self
    }

    /// Replace the schema resolver used for configured schema locations
    pub fn with_schema_resolver(mut self, resolver: SchemaResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// The schema index
    pub fn index(&self) -> &Arc<SchemaIndex> {
        &self.index
    }

    /// The binding walker
    pub fn walker(&self) -> &Arc<BindingWalker> {
        &self.walker
    }

    /// Encoder options
    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Output namespace mappings
    pub fn namespaces(&self) -> &NamespaceContext {
        &self.namespaces
    }

    fn load_pending(&self) -> Result<()> {
        let pending: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for (namespace, location) in pending {
            match self.resolver.resolve_location(Some(namespace.as_str()), location.clone()) {
                Ok(documents) => {
                    for document in documents {
                        self.index.add_document(document);
                    }
                }
                Err(e) if self.options.strict => {
                    return Err(Error::Strict(format!("cannot resolve schema {}: {}", location.as_str(), e)))
                }
                Err(e) => warn!(location = %location.as_str(), error = %e, "schema could not be loaded"),
            }
        }
        Ok(())
    }

    // ========== Component Drivers ==========

    /// Encode an object as the text of an attribute
    ///
    /// Returns None when the object is null or no binding produced text.
    pub fn encode_attribute(
        &self,
        object: &Value,
        declaration: &Arc<AttributeDecl>,
        container: Option<&TypeDefinition>,
    ) -> Result<Option<String>> {
        let component = Declaration::Attribute(Arc::clone(declaration));
        let chain = self
            .walker
            .resolve(&component, container, &self.context)?
            .instantiate(self.walker.registry(), &self.context)?;

        let mut executor = AttributeEncodeExecutor::new(object, declaration.name.clone(), &self.converters);
        chain.execute(&mut executor)?;
        let text = executor.into_text();
        if text.is_none() && !object.is_null() {
            self.unencoded(&declaration.name, object)?;
        }
        Ok(text)
    }

    /// Encode an object as an element, or the replacement a binding chose
    pub fn encode_element(
        &self,
        object: &Value,
        declaration: &Arc<ElementDecl>,
        container: Option<&TypeDefinition>,
    ) -> Result<Element> {
        self.run_element_chain(object, declaration, container)
            .map(|(element, _)| element)
    }

    fn run_element_chain(
        &self,
        object: &Value,
        declaration: &Arc<ElementDecl>,
        container: Option<&TypeDefinition>,
    ) -> Result<(Element, ExecutionChain)> {
        let component = Declaration::Element(Arc::clone(declaration));
        let chain = self
            .walker
            .resolve(&component, container, &self.context)?
            .instantiate(self.walker.registry(), &self.context)?;

        let mut executor = ElementEncodeExecutor::new(object, Element::new(declaration.name.clone()), &self.converters);
        chain.execute(&mut executor)?;
        if !executor.used() && !object.is_null() {
            self.unencoded(&declaration.name, object)?;
        }
        Ok((executor.into_element(), chain))
    }

    fn unencoded(&self, name: &QName, object: &Value) -> Result<()> {
        if self.options.strict {
            return Err(Error::Strict(format!(
                "no binding can encode {} as {}",
                object.value_type(),
                name
            )));
        }
        debug!(component = %name, object = %object.value_type(), "no binding accepted the object");
        Ok(())
    }

    // ========== Documents ==========

    /// Encode an object as the global element `name` and serialize it
    pub fn encode(&self, object: &Value, name: &QName) -> Result<String> {
        let element = self.encode_tree(object, name)?;
        let options = WriteOptions {
            indent: self.options.indent,
            xml_declaration: self.options.xml_declaration,
        };
        element.to_xml(&self.namespaces, &options)
    }

    /// Encode an object as the global element `name` into an element tree
    pub fn encode_tree(&self, object: &Value, name: &QName) -> Result<Element> {
        self.load_pending()?;
        let declaration = self
            .index
            .element_declaration(name)
            .ok_or_else(|| Error::Encode(format!("no global element declaration for {}", name)))?;
        self.build(object, &declaration, None)
    }

    fn build(&self, object: &Value, declaration: &Arc<ElementDecl>, container: Option<&TypeDefinition>) -> Result<Element> {
        let (mut element, chain) = self.run_element_chain(object, declaration, container)?;

        if object.is_null() {
            if element.attribute(&xsi_nil()).is_none() {
                element.set_attribute(xsi_nil(), "true");
            }
            return Ok(element);
        }
        if matches!(object, Value::Element(_)) || element.name != declaration.name {
            return Ok(element);
        }

        let element_type = self.index.element_type(declaration);
        let container = element_type.as_deref();

        for attribute in self.index.attributes(declaration).iter() {
            if element.attribute(&attribute.name).is_some() {
                continue;
            }
            let Some(value) = property(&chain, object, &attribute.name) else {
                continue;
            };
            if let Some(text) = self.encode_attribute(&value, attribute, container)? {
                element.set_attribute(attribute.name.clone(), text);
            }
        }

        // Children written by the chain itself take precedence
        if element.elements().next().is_some() {
            return Ok(element);
        }

        for (name, child) in self.index.child_components(declaration).iter() {
            let Some(value) = property(&chain, object, name) else {
                continue;
            };
            match value {
                Value::List(ref items) if child.occurs.is_multiple() => {
                    for item in items {
                        element.add_child(self.build(item, &child.element, container)?);
                    }
                }
                Value::Null if !child.element.nillable => {
                    debug!(element = %name, "null value for a non-nillable element, omitted");
                }
                value => element.add_child(self.build(&value, &child.element, container)?),
            }
        }
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Configuration;
    use crate::schema::parsing::parse_schema;
    use crate::value::Record;

    const ORDER_XSD: &str = r#"
        <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:element name="order">
            <xs:complexType>
              <xs:sequence>
                <xs:element name="item" type="xs:string" maxOccurs="unbounded"/>
                <xs:element name="total" type="xs:decimal"/>
                <xs:element name="note" type="xs:string" nillable="true" minOccurs="0"/>
              </xs:sequence>
              <xs:attribute name="id" type="xs:int"/>
            </xs:complexType>
          </xs:element>
        </xs:schema>"#;

    fn encoder() -> Encoder {
        let schema = Arc::new(parse_schema(ORDER_XSD, None).unwrap());
        Encoder::with_options(
            vec![Arc::new(Configuration::new("urn:order").with_schema(schema))],
            EncoderOptions::new().with_xml_declaration(false),
        )
    }

    #[test]
    fn test_encode_record_in_schema_order() {
        let order = Record::new()
            .with_field("total", Value::Integer(10))
            .with_field("id", Value::Integer(7))
            .with_field("item", Value::List(vec![Value::from("a"), Value::from("b")]));
        let xml = encoder().encode(&Value::Record(order), &QName::local("order")).unwrap();
        assert!(xml.starts_with("<order"));
        assert!(xml.contains(r#"id="7""#));
        assert!(xml.contains("<item>a</item><item>b</item><total>10</total></order>"));
    }

    #[test]
    fn test_nillable_child_gets_nil_marker() {
        let order = Record::new()
            .with_field("item", Value::from("a"))
            .with_field("total", Value::Integer(1))
            .with_field("note", Value::Null);
        let tree = encoder()
            .encode_tree(&Value::Record(order), &QName::local("order"))
            .unwrap();
        let note = tree.find_children("note")[0];
        assert_eq!(note.attribute(&xsi_nil()), Some("true"));
    }

    #[test]
    fn test_unknown_root_is_an_error() {
        let result = encoder().encode(&Value::Null, &QName::local("invoice"));
        assert!(matches!(result, Err(Error::Encode(_))));
    }

    #[test]
    fn test_strict_mode_rejects_unencodable_values() {
        let schema = Arc::new(parse_schema(ORDER_XSD, None).unwrap());
        let strict = Encoder::with_options(
            vec![Arc::new(Configuration::new("urn:order").with_schema(schema))],
            EncoderOptions::new().with_strict(true),
        );
        let order = Record::new()
            .with_field("id", Value::Record(Record::new()))
            .with_field("item", Value::from("a"))
            .with_field("total", Value::Integer(1));
        let result = strict.encode(&Value::Record(order), &QName::local("order"));
        assert!(matches!(result, Err(Error::Strict(_))));
    }

    #[test]
    fn test_xsi_prefix_defaults_to_xs() {
        let namespaces = output_namespaces(&EncoderOptions::new());
        assert_eq!(namespaces.get_prefix(XSI_NAMESPACE), Some("xs"));
        let taken = output_namespaces(&EncoderOptions::new().with_namespace("xs", crate::XSD_NAMESPACE));
        assert_eq!(taken.get_prefix(XSI_NAMESPACE), Some("xsi"));
    }
}
