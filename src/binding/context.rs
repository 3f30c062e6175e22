//! Resolution contexts
//!
//! A [`Context`] is a scope of registered values that binding factories
//! draw their dependencies from. Scopes nest: lookups fall back to the
//! parent, registrations only affect the scope they are made in. The parse
//! driver opens one child scope per open element and drops it when the
//! element closes.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

type Entry = Arc<dyn Any + Send + Sync>;

/// A scope of registered dependencies
#[derive(Clone, Default)]
pub struct Context {
    parent: Option<Arc<Context>>,
    typed: HashMap<TypeId, Entry>,
    named: HashMap<String, Entry>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .field("typed", &self.typed.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Context {
    /// Create a root context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child scope of `parent`
    pub fn child(parent: &Arc<Context>) -> Self {
        Self {
            parent: Some(Arc::clone(parent)),
            typed: HashMap::new(),
            named: HashMap::new(),
        }
    }

    /// Number of ancestors
    pub fn depth(&self) -> usize {
        self.parent.as_ref().map_or(0, |p| p.depth() + 1)
    }

    /// Register a value under its type
    pub fn register<T: Any + Send + Sync>(&mut self, value: T) {
        self.register_arc(Arc::new(value));
    }

    /// Register a shared value under its type
    pub fn register_arc<T: Any + Send + Sync>(&mut self, value: Arc<T>) {
        self.typed.insert(TypeId::of::<T>(), value);
    }

    /// Register a value under a name
    pub fn register_named<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.named.insert(key.into(), Arc::new(value));
    }

    /// Builder form of [`Context::register`]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.register(value);
        self
    }

    /// Look up a value by type, searching enclosing scopes
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self.typed.get(&TypeId::of::<T>()) {
            Some(entry) => Arc::clone(entry).downcast::<T>().ok(),
            None => self.parent.as_ref().and_then(|p| p.get::<T>()),
        }
    }

    /// Look up a value by name, searching enclosing scopes
    pub fn get_named<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        match self.named.get(key) {
            Some(entry) => Arc::clone(entry).downcast::<T>().ok(),
            None => self.parent.as_ref().and_then(|p| p.get_named::<T>(key)),
        }
    }

    /// Look up a required dependency
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.get::<T>().ok_or_else(|| {
            Error::Resolution(format!("no {} registered in the resolution context", type_name::<T>()))
        })
    }

    /// Check if a value of this type is registered in this scope itself
    pub fn contains_local<T: Any + Send + Sync>(&self) -> bool {
        self.typed.contains_key(&TypeId::of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Units(&'static str);

    #[test]
    fn test_child_scope_falls_back_to_parent() {
        let root = Arc::new(Context::new().with(Units("m")).with(42u32));
        let mut child = Context::child(&root);
        assert_eq!(child.get::<Units>().as_deref(), Some(&Units("m")));

        child.register(Units("ft"));
        assert_eq!(child.get::<Units>().as_deref(), Some(&Units("ft")));
        assert_eq!(root.get::<Units>().as_deref(), Some(&Units("m")));
        assert_eq!(child.get::<u32>().as_deref(), Some(&42));
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_named_values() {
        let mut ctx = Context::new();
        ctx.register_named("srs", String::from("EPSG:4326"));
        assert_eq!(ctx.get_named::<String>("srs").as_deref().map(String::as_str), Some("EPSG:4326"));
        assert!(ctx.get_named::<u32>("srs").is_none());
    }

    #[test]
    fn test_require_reports_missing_type() {
        let ctx = Context::new();
        match ctx.require::<Units>() {
            Err(Error::Resolution(msg)) => assert!(msg.contains("Units")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
