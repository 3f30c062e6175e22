//! # xmlbind
//!
//! Schema-driven XML data binding.
//!
//! Documents are parsed in a single streaming pass: every element and
//! attribute is matched to its schema declaration, and the bindings
//! registered along the declaration's type hierarchy turn its content into
//! a [`Value`]. Encoding runs the same binding chains in reverse, from
//! values back to an XML tree.
//!
//! ## Features
//!
//! - XSD reader for elements, attributes, groups, simple and complex types
//! - Bindings per type with override/before/after execution modes
//! - Cached, deterministic binding chains shared across threads
//! - Lenient parsing of loosely valid documents, or strict mode
//! - Built-in bindings for the XML Schema scalar types
//! - Encoding with pluggable type converters
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xmlbind::{parse_schema, Configuration, Parser, Value};
//!
//! let schema = parse_schema(xsd_text, None)?;
//! let config = Configuration::new("urn:orders").with_schema(Arc::new(schema));
//! let parser = Parser::new(config);
//!
//! let value: Value = parser.parse_str(r#"<order id="7"><item>pen</item></order>"#)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and locations
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading and trees
pub mod loaders;
pub mod documents;

// Values
pub mod value;
pub mod convert;
pub mod config;

// Schema model
pub mod schema;

// Bindings
pub mod binding;
pub mod parser;
pub mod encoder;
pub mod xs;

pub use binding::{
    Binding, BindingConfiguration, BindingRegistry, BindingWalker, ComplexBinding, Configuration, Context,
    ExecutionChain, ExecutionMode, SimpleBinding,
};
pub use config::{EncoderOptions, ParserOptions};
pub use convert::{Converters, DefaultConverter, TypeConverter};
pub use documents::Element;
pub use encoder::Encoder;
pub use error::{BindingError, Error, Result};
pub use limits::Limits;
pub use namespaces::{NamespaceContext, QName};
pub use parser::{Node, Parser};
pub use schema::parsing::parse_schema;
pub use schema::{builtins::XSD_NAMESPACE, index::SchemaIndex};
pub use value::{Record, Value, ValueType};
pub use xs::XsConfiguration;

/// Version of the xmlbind library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
