//! XML namespace handling
//!
//! This module provides qualified names (QNames) and the scoped prefix
//! mappings the parse driver maintains while walking a document.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Namespace marker matching any namespace in declaration lookups
pub const WILDCARD_NAMESPACE: &str = "*";

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName that matches the local name in any namespace
    pub fn wildcard(local_name: impl Into<String>) -> Self {
        Self::namespaced(WILDCARD_NAMESPACE, local_name)
    }

    /// Check if the namespace part is the wildcard marker
    pub fn is_wildcard(&self) -> bool {
        self.namespace.as_deref() == Some(WILDCARD_NAMESPACE)
    }

    /// Get the namespace as a string slice
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Parse Clark notation (`{namespace}local`) or a bare local name
    pub fn from_clark(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix('{') {
            let (ns, local) = rest
                .split_once('}')
                .ok_or_else(|| Error::Name(format!("Unterminated namespace in '{}'", s)))?;
            if local.is_empty() {
                return Err(Error::Name(format!("Missing local name in '{}'", s)));
            }
            let ns = if ns.is_empty() { None } else { Some(ns) };
            Ok(Self::new(ns, local))
        } else {
            Ok(Self::local(s))
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Find a prefix bound to a namespace
    pub fn get_prefix(&self, namespace: &str) -> Option<&str> {
        let mut found: Vec<&str> = self
            .prefixes
            .iter()
            .filter(|(_, uri)| uri.as_str() == namespace)
            .map(|(p, _)| p.as_str())
            .collect();
        // Stable answer when several prefixes share a namespace
        found.sort_unstable();
        found.first().copied()
    }

    /// Iterate over the prefix mappings
    pub fn iter(&self) -> impl Iterator<Item = (&Prefix, &NamespaceUri)> {
        self.prefixes.iter()
    }

    /// Resolve a prefixed name to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}

/// Stack of namespace scopes following element nesting
///
/// Prefix mappings pushed while an element is open are dropped again when
/// the element closes.
#[derive(Debug, Clone)]
pub struct NamespaceSupport {
    scopes: Vec<NamespaceContext>,
}

impl NamespaceSupport {
    /// Create a namespace stack with the `xml` prefix bound
    pub fn new() -> Self {
        let mut root = NamespaceContext::new();
        root.add_prefix("xml", crate::XML_NAMESPACE);
        Self { scopes: vec![root] }
    }

    /// Open a new scope inheriting the current mappings
    pub fn push_context(&mut self) {
        let current = self.current().clone();
        self.scopes.push(current);
    }

    /// Close the innermost scope
    pub fn pop_context(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declare a prefix in the innermost scope (empty prefix = default namespace)
    pub fn declare_prefix(&mut self, prefix: &str, namespace: &str) {
        let scope = self.current_mut();
        if prefix.is_empty() {
            scope.set_default_namespace(namespace);
        } else {
            scope.add_prefix(prefix, namespace);
        }
    }

    /// The mappings visible at the current depth
    pub fn current(&self) -> &NamespaceContext {
        // The root scope is never popped
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_mut(&mut self) -> &mut NamespaceContext {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }
}

impl Default for NamespaceSupport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace, Some("http://example.com".to_string()));
        assert_eq!(qname.local_name, "element");
    }

    #[test]
    fn test_qname_to_string() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");

        let qname_local = QName::local("element");
        assert_eq!(qname_local.to_string(), "element");
    }

    #[test]
    fn test_qname_from_clark() {
        let qname = QName::from_clark("{urn:a}b").unwrap();
        assert_eq!(qname, QName::namespaced("urn:a", "b"));
        assert_eq!(QName::from_clark("b").unwrap(), QName::local("b"));
        assert!(QName::from_clark("{urn:a").is_err());
        assert!(QName::from_clark("{urn:a}").is_err());
    }

    #[test]
    fn test_wildcard_qname() {
        assert!(QName::wildcard("item").is_wildcard());
        assert!(!QName::local("item").is_wildcard());
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("xs", "http://www.w3.org/2001/XMLSchema");

        let qname = ctx.resolve("xs:element").unwrap();
        assert_eq!(
            qname.namespace,
            Some("http://www.w3.org/2001/XMLSchema".to_string())
        );
        assert_eq!(qname.local_name, "element");
        assert!(ctx.resolve("foo:bar").is_err());
        assert_eq!(ctx.get_prefix("http://www.w3.org/2001/XMLSchema"), Some("xs"));
    }

    #[test]
    fn test_namespace_support_scoping() {
        let mut ns = NamespaceSupport::new();
        ns.push_context();
        ns.declare_prefix("a", "urn:a");
        ns.declare_prefix("", "urn:default");
        assert_eq!(ns.current().get_namespace("a"), Some("urn:a"));
        assert_eq!(ns.current().get_default_namespace(), Some("urn:default"));

        ns.pop_context();
        assert_eq!(ns.current().get_namespace("a"), None);
        assert_eq!(ns.current().get_namespace("xml"), Some(crate::XML_NAMESPACE));
        assert_eq!(ns.depth(), 0);
    }
}
