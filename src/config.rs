//! Parser and encoder options
//!
//! Both option sets deserialize from JSON so hosts can keep them in
//! configuration files. Missing keys take their defaults.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName};

/// Default capacity of the resolved binding chain cache
pub const DEFAULT_CHAIN_CACHE_CAPACITY: usize = 1024;

/// Options for the streaming parse driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Abort on unknown elements, unknown attributes and unresolved schemas
    pub strict: bool,
    /// Record text nodes for mixed content types
    pub handle_mixed: bool,
    /// Type used for an undeclared root element, in Clark notation
    pub root_type: Option<String>,
    /// Capacity of the resolved chain cache
    pub chain_cache_capacity: usize,
    /// Capacity of the schema index child/attribute table caches
    pub table_cache_capacity: usize,
    /// Document size and shape limits
    pub limits: Limits,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            strict: false,
            handle_mixed: true,
            root_type: None,
            chain_cache_capacity: DEFAULT_CHAIN_CACHE_CAPACITY,
            table_cache_capacity: crate::schema::index::DEFAULT_TABLE_CACHE_CAPACITY,
            limits: Limits::default(),
        }
    }
}

impl ParserOptions {
    /// Create default (lenient) options
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Value(format!("invalid parser options: {}", e)))
    }

    /// Set strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable or disable mixed content handling
    pub fn with_handle_mixed(mut self, handle_mixed: bool) -> Self {
        self.handle_mixed = handle_mixed;
        self
    }

    /// Set the type used for an undeclared root element
    pub fn with_root_type(mut self, root_type: &QName) -> Self {
        self.root_type = Some(root_type.to_string());
        self
    }

    /// Set the chain cache capacity
    pub fn with_chain_cache_capacity(mut self, capacity: usize) -> Self {
        self.chain_cache_capacity = capacity;
        self
    }

    /// Set document limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The configured root type name
    pub fn root_type_name(&self) -> Result<Option<QName>> {
        self.root_type.as_deref().map(QName::from_clark).transpose()
    }
}

/// Options for encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    /// Fail instead of skipping values no binding can encode
    pub strict: bool,
    /// Prefix to namespace URI mappings used for output
    pub namespaces: IndexMap<String, String>,
    /// Default namespace for output
    pub default_namespace: Option<String>,
    /// Spaces per indentation level (0 disables indentation)
    pub indent: usize,
    /// Whether to emit an XML declaration
    pub xml_declaration: bool,
    /// Capacity of the resolved chain cache
    pub chain_cache_capacity: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            namespaces: IndexMap::new(),
            default_namespace: None,
            indent: 0,
            xml_declaration: true,
            chain_cache_capacity: DEFAULT_CHAIN_CACHE_CAPACITY,
        }
    }
}

impl EncoderOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Value(format!("invalid encoder options: {}", e)))
    }

    /// Set strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Map a prefix to a namespace
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// Set the default namespace
    pub fn with_default_namespace(mut self, uri: impl Into<String>) -> Self {
        self.default_namespace = Some(uri.into());
        self
    }

    /// Set indentation
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Enable or disable the XML declaration
    pub fn with_xml_declaration(mut self, enabled: bool) -> Self {
        self.xml_declaration = enabled;
        self
    }

    /// Namespace context built from the configured mappings
    pub fn namespace_context(&self) -> NamespaceContext {
        let mut context = NamespaceContext::new();
        for (prefix, uri) in &self.namespaces {
            context.add_prefix(prefix.as_str(), uri.as_str());
        }
        if let Some(ref uri) = self.default_namespace {
            context.set_default_namespace(uri.as_str());
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_options_from_partial_json() {
        let options = ParserOptions::from_json(r#"{"strict": true, "limits": {"max_xml_depth": 5}}"#).unwrap();
        assert!(options.strict);
        assert!(options.handle_mixed);
        assert_eq!(options.limits.max_xml_depth, 5);
        assert_eq!(options.chain_cache_capacity, DEFAULT_CHAIN_CACHE_CAPACITY);
    }

    #[test]
    fn test_root_type_round_trip() {
        let name = QName::namespaced("urn:t", "RootType");
        let options = ParserOptions::new().with_root_type(&name);
        assert_eq!(options.root_type_name().unwrap(), Some(name));
        assert!(ParserOptions::from_json("{\"strict\": 3}").is_err());
    }

    #[test]
    fn test_encoder_namespace_context() {
        let options = EncoderOptions::from_json(r#"{"namespaces": {"po": "urn:po"}, "indent": 2}"#).unwrap();
        assert_eq!(options.indent, 2);
        assert!(options.xml_declaration);
        assert_eq!(options.namespace_context().get_prefix("urn:po"), Some("po"));
    }

    #[test]
    fn test_encoder_options_keep_namespace_order() {
        let options = EncoderOptions::from_json(r#"{"namespaces": {"z": "urn:z", "a": "urn:a"}}"#).unwrap();
        let json = serde_json::to_string(&options).unwrap();
        assert!(json.contains(r#""namespaces":{"z":"urn:z","a":"urn:a"}"#));
        assert_eq!(EncoderOptions::from_json(&json).unwrap(), options);
    }
}
