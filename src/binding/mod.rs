//! Bindings
//!
//! A binding converts between one schema component and domain objects.
//! Simple bindings map text to scalar values; complex bindings map element
//! subtrees to structured objects. Bindings are registered by qualified
//! name in a [`BindingRegistry`], and the [`BindingWalker`] resolves, for a
//! declaration, the ordered chain of bindings that applies to it.

pub mod configuration;
pub mod context;
pub mod registry;
pub mod walker;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::parser::node::{InstanceComponent, Node};
use crate::value::{Value, ValueType};

pub use configuration::{resolve_configurations, BindingConfiguration, Configuration};
pub use context::Context;
pub use registry::{BindingFactory, BindingRegistry};
pub use walker::{BindingVisitor, BindingWalker, ChainLink, ExecutionChain};

/// Where a binding runs relative to the other bindings of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Replace every other binding of the chain
    Override,
    /// Run before peer bindings
    Before,
    /// Run in discovery order
    #[default]
    Default,
    /// Run after every non-after binding, in reverse discovery order
    After,
}

impl FromStr for ExecutionMode {
    type Err = Error;

    /// Parse from a configuration string, ignoring case
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "override" => Ok(Self::Override),
            "before" => Ok(Self::Before),
            "default" => Ok(Self::Default),
            "after" => Ok(Self::After),
            _ => Err(Error::Value(format!("unknown execution mode '{}'", s))),
        }
    }
}

/// Text to scalar binding
pub trait SimpleBinding: Send + Sync {
    /// Qualified name this binding is registered for
    fn target(&self) -> QName;

    /// Domain type the binding produces and accepts (None: not type-checked)
    fn value_type(&self) -> Option<ValueType>;

    /// Execution mode
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Default
    }

    /// Parse a value; `value` is the result of the previous binding in the chain
    fn parse(&self, instance: &InstanceComponent, value: Value) -> Result<Value>;

    /// Encode an object; `value` is the text produced so far
    fn encode(&self, object: &Value, value: &str) -> Result<String>;
}

/// Element subtree to object binding
pub trait ComplexBinding: Send + Sync {
    /// Qualified name this binding is registered for
    fn target(&self) -> QName;

    /// Domain type the binding produces and accepts (None: not type-checked)
    fn value_type(&self) -> Option<ValueType>;

    /// Execution mode
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Default
    }

    /// Called when the element opens, before any child is parsed
    fn initialize(&self, _instance: &InstanceComponent, _node: &Node, _context: &mut Context) -> Result<()> {
        Ok(())
    }

    /// Called on the parent's bindings when a child element opens, to seed
    /// the child's scope
    fn initialize_child_context(&self, _child: &InstanceComponent, _node: &Node, _context: &mut Context) -> Result<()> {
        Ok(())
    }

    /// Parse a value; `value` is the result of the previous binding in the chain
    fn parse(&self, instance: &InstanceComponent, node: &Node, value: Value) -> Result<Value>;

    /// Encode an object into `element`, returning it or a replacement
    fn encode(&self, _object: &Value, element: Element) -> Result<Element> {
        Ok(element)
    }

    /// Property of an object to encode as the named attribute or child
    fn property(&self, object: &Value, name: &QName) -> Option<Value> {
        object.as_record().and_then(|r| r.get(&name.local_name)).cloned()
    }
}

/// A simple or complex binding
#[derive(Clone)]
pub enum Binding {
    /// Text to scalar binding
    Simple(Arc<dyn SimpleBinding>),
    /// Element subtree binding
    Complex(Arc<dyn ComplexBinding>),
}

impl Binding {
    /// Wrap a simple binding
    pub fn simple(binding: impl SimpleBinding + 'static) -> Self {
        Binding::Simple(Arc::new(binding))
    }

    /// Wrap a complex binding
    pub fn complex(binding: impl ComplexBinding + 'static) -> Self {
        Binding::Complex(Arc::new(binding))
    }

    /// Qualified name this binding is registered for
    pub fn target(&self) -> QName {
        match self {
            Binding::Simple(b) => b.target(),
            Binding::Complex(b) => b.target(),
        }
    }

    /// Declared domain type
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Binding::Simple(b) => b.value_type(),
            Binding::Complex(b) => b.value_type(),
        }
    }

    /// Execution mode
    pub fn execution_mode(&self) -> ExecutionMode {
        match self {
            Binding::Simple(b) => b.execution_mode(),
            Binding::Complex(b) => b.execution_mode(),
        }
    }

    /// Check if this is a simple binding
    pub fn is_simple(&self) -> bool {
        matches!(self, Binding::Simple(_))
    }

    /// The complex binding, if this is one
    pub fn as_complex(&self) -> Option<&Arc<dyn ComplexBinding>> {
        match self {
            Binding::Complex(b) => Some(b),
            Binding::Simple(_) => None,
        }
    }

    /// Check if two handles refer to the same binding instance
    pub fn same_instance(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Simple(a), Binding::Simple(b)) => Arc::ptr_eq(a, b),
            (Binding::Complex(a), Binding::Complex(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_simple() { "Simple" } else { "Complex" };
        f.debug_struct(kind)
            .field("target", &self.target().to_string())
            .field("mode", &self.execution_mode())
            .field("type", &self.value_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl SimpleBinding for Upper {
        fn target(&self) -> QName {
            QName::namespaced("urn:t", "Code")
        }

        fn value_type(&self) -> Option<ValueType> {
            Some(ValueType::String)
        }

        fn execution_mode(&self) -> ExecutionMode {
            ExecutionMode::After
        }

        fn parse(&self, _instance: &InstanceComponent, value: Value) -> Result<Value> {
            Ok(match value {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other,
            })
        }

        fn encode(&self, object: &Value, _value: &str) -> Result<String> {
            Ok(object.lexical().unwrap_or_default().to_lowercase())
        }
    }

    #[test]
    fn test_binding_accessors() {
        let binding = Binding::simple(Upper);
        assert!(binding.is_simple());
        assert!(binding.as_complex().is_none());
        assert_eq!(binding.execution_mode(), ExecutionMode::After);
        assert_eq!(binding.value_type(), Some(ValueType::String));
        assert!(binding.same_instance(&binding.clone()));
        assert!(!binding.same_instance(&Binding::simple(Upper)));
        assert!(format!("{:?}", binding).contains("{urn:t}Code"));
    }

    #[test]
    fn test_execution_mode_from_str() {
        assert_eq!("OVERRIDE".parse::<ExecutionMode>().unwrap(), ExecutionMode::Override);
        assert_eq!("after".parse::<ExecutionMode>().unwrap(), ExecutionMode::After);
        assert!(matches!("sideways".parse::<ExecutionMode>(), Err(Error::Value(_))));
    }
}
