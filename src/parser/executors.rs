//! Binding chain visitors used by the parse driver
//!
//! Each visitor runs one phase of a component's chain: [`ParseExecutor`]
//! threads the bound value through every binding, [`InitializeExecutor`]
//! lets complex bindings prepare an element's scope when it opens and
//! [`ChildContextExecutor`] lets them seed the scope of a new child.

use std::mem;
use std::sync::Arc;

use super::node::{InstanceComponent, Node};
use crate::binding::{Binding, BindingVisitor, Context};
use crate::error::{BindingError, Error, Result};
use crate::schema::components::{TypeDefinition, Variety, WhiteSpace};
use crate::schema::hierarchy::TypeWalker;
use crate::schema::index::SchemaIndex;
use crate::value::Value;

/// Wrap a failure raised by a binding with the component being processed
pub(crate) fn binding_failure(error: Error, binding: &Binding, target: &str, path: Option<&str>) -> Error {
    match error {
        Error::Binding(_) | Error::Resolution(_) | Error::Strict(_) | Error::LimitExceeded(_) => error,
        other => {
            let mut wrapped = BindingError::new(format!("binding {} failed", binding.target()))
                .with_target(target)
                .with_reason(other.to_string());
            if let Some(path) = path {
                wrapped = wrapped.with_path(path);
            }
            Error::Binding(wrapped)
        }
    }
}

/// Runs the parse callbacks of a chain, feeding each binding the value the
/// previous one returned
pub struct ParseExecutor<'a> {
    instance: &'a InstanceComponent,
    node: &'a Node,
    path: Option<&'a str>,
    value: Value,
}

impl<'a> ParseExecutor<'a> {
    /// Start from `initial`, the pre-processed text value
    pub fn new(instance: &'a InstanceComponent, node: &'a Node, initial: Value) -> Self {
        Self {
            instance,
            node,
            path: None,
            value: initial,
        }
    }

    /// Attach the instance path reported on failure
    pub fn with_path(mut self, path: &'a str) -> Self {
        self.path = Some(path);
        self
    }

    /// The value produced by the bindings visited so far
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl BindingVisitor for ParseExecutor<'_> {
    fn visit(&mut self, binding: &Binding) -> Result<()> {
        let previous = mem::replace(&mut self.value, Value::Null);
        let result = match binding {
            Binding::Simple(b) => b.parse(self.instance, previous),
            Binding::Complex(b) => b.parse(self.instance, self.node, previous),
        };
        self.value = result.map_err(|e| binding_failure(e, binding, &self.instance.name.to_string(), self.path))?;
        Ok(())
    }
}

/// Calls `initialize` on the complex bindings of an opening element
pub struct InitializeExecutor<'a> {
    instance: &'a InstanceComponent,
    node: &'a Node,
    context: &'a mut Context,
}

impl<'a> InitializeExecutor<'a> {
    /// Create an initializer writing into the element's scope
    pub fn new(instance: &'a InstanceComponent, node: &'a Node, context: &'a mut Context) -> Self {
        Self { instance, node, context }
    }
}

impl BindingVisitor for InitializeExecutor<'_> {
    fn visit(&mut self, binding: &Binding) -> Result<()> {
        if let Some(b) = binding.as_complex() {
            b.initialize(self.instance, self.node, self.context)
                .map_err(|e| binding_failure(e, binding, &self.instance.name.to_string(), None))?;
        }
        Ok(())
    }
}

/// Calls `initialize_child_context` on the parent's complex bindings
pub struct ChildContextExecutor<'a> {
    child: &'a InstanceComponent,
    node: &'a Node,
    context: &'a mut Context,
}

impl<'a> ChildContextExecutor<'a> {
    /// Create an initializer for the scope of `child`
    pub fn new(child: &'a InstanceComponent, node: &'a Node, context: &'a mut Context) -> Self {
        Self { child, node, context }
    }
}

impl BindingVisitor for ChildContextExecutor<'_> {
    fn visit(&mut self, binding: &Binding) -> Result<()> {
        if let Some(b) = binding.as_complex() {
            b.initialize_child_context(self.child, self.node, self.context)
                .map_err(|e| binding_failure(e, binding, &self.child.name.to_string(), None))?;
        }
        Ok(())
    }
}

// ========== Text Pre-processing ==========

/// Lexical shape of a type's text content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFacets {
    /// Whitespace handling of the nearest type declaring it
    pub white_space: Option<WhiteSpace>,
    /// Whether the type (or a base) is a list type
    pub is_list: bool,
}

/// Find the text facets of a type by walking its hierarchy
///
/// Complex types without simple content have no text facets.
pub fn text_facets(index: &SchemaIndex, def: &Arc<TypeDefinition>) -> Option<TextFacets> {
    if let Some(info) = def.as_complex() {
        if !info.simple_content {
            return None;
        }
    }

    let mut facets = TextFacets {
        white_space: None,
        is_list: false,
    };
    TypeWalker::new(index).walk(def, |t| {
        if let Some(info) = t.as_simple() {
            if info.variety == Variety::List {
                facets.is_list = true;
            }
            if facets.white_space.is_none() {
                facets.white_space = info.white_space;
            }
        }
        true
    });
    if facets.is_list {
        facets.white_space = Some(WhiteSpace::Collapse);
    }
    Some(facets)
}

/// Pre-process raw text into the value handed to the first binding
///
/// Whitespace is normalized per the type's facet and list values are split
/// into string items. Element-only content starts from null.
pub fn preprocess(index: &SchemaIndex, def: &Arc<TypeDefinition>, text: &str) -> Value {
    let Some(facets) = text_facets(index, def) else {
        return Value::Null;
    };
    let normalized = match facets.white_space {
        Some(ws) => ws.apply(text),
        None => text.to_string(),
    };
    if facets.is_list {
        return Value::List(
            normalized
                .split_whitespace()
                .map(|item| Value::String(item.to_string()))
                .collect(),
        );
    }
    Value::String(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{ComplexBinding, SimpleBinding};
    use crate::namespaces::{NamespaceContext, QName};
    use crate::schema::builtins::xs;
    use crate::schema::components::{Declaration, ElementDecl, SimpleTypeInfo, TypeRef};
    use crate::value::ValueType;

    fn instance(text: &str) -> InstanceComponent {
        InstanceComponent {
            name: QName::local("n"),
            declaration: Declaration::Element(Arc::new(ElementDecl::new(QName::local("n")))),
            type_definition: Arc::new(TypeDefinition::simple(None, None)),
            text: text.to_string(),
            namespaces: Arc::new(NamespaceContext::new()),
        }
    }

    struct Doubler;

    impl SimpleBinding for Doubler {
        fn target(&self) -> QName {
            QName::local("doubler")
        }

        fn value_type(&self) -> Option<ValueType> {
            Some(ValueType::Integer)
        }

        fn parse(&self, _instance: &InstanceComponent, value: Value) -> Result<Value> {
            match value {
                Value::Integer(i) => Ok(Value::Integer(i * 2)),
                Value::String(s) => s
                    .parse::<i64>()
                    .map(|i| Value::Integer(i * 2))
                    .map_err(|e| Error::Value(e.to_string())),
                other => Ok(other),
            }
        }

        fn encode(&self, object: &Value, _value: &str) -> Result<String> {
            Ok(object.lexical().unwrap_or_default())
        }
    }

    struct Scoped;

    impl ComplexBinding for Scoped {
        fn target(&self) -> QName {
            QName::local("scoped")
        }

        fn value_type(&self) -> Option<ValueType> {
            None
        }

        fn initialize(&self, _instance: &InstanceComponent, _node: &Node, context: &mut Context) -> Result<()> {
            context.register(String::from("ready"));
            Ok(())
        }

        fn parse(&self, _instance: &InstanceComponent, _node: &Node, value: Value) -> Result<Value> {
            Ok(value)
        }
    }

    #[test]
    fn test_parse_executor_threads_values() {
        let inst = instance("3");
        let node = Node::text("");
        let mut executor = ParseExecutor::new(&inst, &node, Value::String("3".into()));
        executor.visit(&Binding::simple(Doubler)).unwrap();
        executor.visit(&Binding::simple(Doubler)).unwrap();
        assert_eq!(executor.into_value(), Value::Integer(12));
    }

    #[test]
    fn test_binding_failures_are_wrapped() {
        let inst = instance("x");
        let node = Node::text("");
        let mut executor = ParseExecutor::new(&inst, &node, Value::String("x".into())).with_path("/a/n");
        match executor.visit(&Binding::simple(Doubler)) {
            Err(Error::Binding(e)) => {
                assert_eq!(e.target.as_deref(), Some("n"));
                assert_eq!(e.path.as_deref(), Some("/a/n"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_initializer_only_calls_complex_bindings() {
        let inst = instance("");
        let node = Node::text("");
        let mut ctx = Context::new();
        let mut executor = InitializeExecutor::new(&inst, &node, &mut ctx);
        executor.visit(&Binding::simple(Doubler)).unwrap();
        executor.visit(&Binding::complex(Scoped)).unwrap();
        assert_eq!(ctx.get::<String>().as_deref().map(String::as_str), Some("ready"));
    }

    #[test]
    fn test_preprocess_collapses_and_splits() {
        let index = SchemaIndex::default();
        let int = index.type_definition(&xs("int")).unwrap();
        assert_eq!(preprocess(&index, &int, "  42 \n"), Value::String("42".into()));

        let string = index.type_definition(&xs("string")).unwrap();
        assert_eq!(preprocess(&index, &string, " a  b "), Value::String(" a  b ".into()));

        let list = Arc::new(TypeDefinition::simple(None, Some(TypeRef::Named(xs("anySimpleType")))).with_simple_info(
            SimpleTypeInfo {
                variety: Variety::List,
                item_type: Some(TypeRef::Named(xs("int"))),
                ..SimpleTypeInfo::default()
            },
        ));
        assert_eq!(
            preprocess(&index, &list, " 1\t2 "),
            Value::List(vec![Value::String("1".into()), Value::String("2".into())])
        );

        let any = index.type_definition(&xs("anyType")).unwrap();
        assert_eq!(preprocess(&index, &any, "text"), Value::Null);
    }
}
