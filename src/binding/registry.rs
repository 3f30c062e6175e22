//! Binding registry
//!
//! Maps qualified names to bindings. An entry is either a ready instance,
//! shared by every context, or a factory run against the caller's
//! [`Context`] so the binding can pull in its dependencies.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::context::Context;
use super::Binding;
use crate::error::{Error, Result};
use crate::namespaces::QName;

/// Builds a binding from the dependencies in a context
pub type BindingFactory = Arc<dyn Fn(&Context) -> Result<Binding> + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Instance(Binding),
    Factory(BindingFactory),
}

/// Registry of bindings keyed by qualified name
#[derive(Clone, Default)]
pub struct BindingRegistry {
    entries: HashMap<QName, Entry>,
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl BindingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding instance under its own target name
    pub fn register(&mut self, binding: Binding) {
        self.register_as(binding.target(), binding);
    }

    /// Register a binding instance under an explicit name
    pub fn register_as(&mut self, name: QName, binding: Binding) {
        self.entries.insert(name, Entry::Instance(binding));
    }

    /// Register a factory
    pub fn register_factory<F>(&mut self, name: QName, factory: F)
    where
        F: Fn(&Context) -> Result<Binding> + Send + Sync + 'static,
    {
        self.entries.insert(name, Entry::Factory(Arc::new(factory)));
    }

    /// Copy every registration of `other` into this registry
    ///
    /// Registrations in `other` replace existing ones with the same name.
    pub fn merge(&mut self, other: &BindingRegistry) {
        for (name, entry) in &other.entries {
            self.entries.insert(name.clone(), entry.clone());
        }
    }

    /// Remove a registration
    pub fn unregister(&mut self, name: &QName) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Check for a registration
    pub fn contains(&self, name: &QName) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<QName> {
        let mut names: Vec<QName> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Produce the binding registered for `name` in `context`
    ///
    /// Unregistered names yield `Ok(None)`. A failing factory is a
    /// resolution error: the binding cannot be used half-built.
    pub fn load(&self, name: &QName, context: &Context) -> Result<Option<Binding>> {
        match self.entries.get(name) {
            None => Ok(None),
            Some(Entry::Instance(binding)) => Ok(Some(binding.clone())),
            Some(Entry::Factory(factory)) => {
                trace!(binding = %name, "instantiating binding");
                factory(context).map(Some).map_err(|e| match e {
                    Error::Resolution(msg) => {
                        Error::Resolution(format!("cannot instantiate binding {}: {}", name, msg))
                    }
                    other => other,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{ComplexBinding, SimpleBinding};
    use crate::parser::node::{InstanceComponent, Node};
    use crate::value::{Value, ValueType};

    struct Scaled {
        factor: i64,
    }

    impl SimpleBinding for Scaled {
        fn target(&self) -> QName {
            QName::local("scaled")
        }

        fn value_type(&self) -> Option<ValueType> {
            Some(ValueType::Integer)
        }

        fn parse(&self, _instance: &InstanceComponent, value: Value) -> Result<Value> {
            Ok(Value::Integer(value.as_i64().unwrap_or(0) * self.factor))
        }

        fn encode(&self, object: &Value, _value: &str) -> Result<String> {
            Ok((object.as_i64().unwrap_or(0) / self.factor).to_string())
        }
    }

    struct Noop;

    impl ComplexBinding for Noop {
        fn target(&self) -> QName {
            QName::local("noop")
        }

        fn value_type(&self) -> Option<ValueType> {
            None
        }

        fn parse(&self, _instance: &InstanceComponent, _node: &Node, value: Value) -> Result<Value> {
            Ok(value)
        }
    }

    #[test]
    fn test_load_instance_and_missing() {
        let mut registry = BindingRegistry::new();
        registry.register(Binding::complex(Noop));
        let ctx = Context::new();
        assert!(registry.load(&QName::local("noop"), &ctx).unwrap().is_some());
        assert!(registry.load(&QName::local("other"), &ctx).unwrap().is_none());
        assert_eq!(registry.names(), vec![QName::local("noop")]);
    }

    #[test]
    fn test_factory_uses_context() {
        let mut registry = BindingRegistry::new();
        registry.register_factory(QName::local("scaled"), |ctx: &Context| {
            let factor = ctx.require::<i64>()?;
            Ok(Binding::simple(Scaled { factor: *factor }))
        });

        let missing = registry.load(&QName::local("scaled"), &Context::new());
        assert!(matches!(missing, Err(Error::Resolution(ref m)) if m.contains("scaled")));

        let ctx = Context::new().with(10i64);
        let binding = registry.load(&QName::local("scaled"), &ctx).unwrap().unwrap();
        match binding {
            Binding::Simple(b) => assert_eq!(b.encode(&Value::Integer(50), "").unwrap(), "5"),
            Binding::Complex(_) => panic!("expected simple binding"),
        }
    }
}
