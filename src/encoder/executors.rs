//! Binding chain visitors used by the encode drivers
//!
//! A binding takes part in encoding only if it declares a domain type and
//! the object is assignable to it, directly or through the converters.
//! Bindings that cannot take the object are skipped, not failed.

use std::mem;

use tracing::debug;

use crate::binding::{Binding, BindingVisitor};
use crate::convert::Converters;
use crate::documents::Element;
use crate::error::Result;
use crate::namespaces::QName;
use crate::parser::executors::binding_failure;
use crate::value::Value;
use crate::XSI_NAMESPACE;

/// Name of the nil marker attribute
pub fn xsi_nil() -> QName {
    QName::namespaced(XSI_NAMESPACE, "nil")
}

/// Find the object a binding can take, converting it if needed
///
/// Structured objects are never converted for a simple binding: every
/// object has a text form, so the conversion would always succeed and hide
/// the mismatch. Such bindings are skipped and the chain falls through to
/// the complex bindings further down.
fn accepted(object: &Value, binding: &Binding, converters: &Converters) -> Option<Value> {
    let Some(expected) = binding.value_type() else {
        debug!(binding = %binding.target(), "binding declares no type, skipped");
        return None;
    };
    if expected.is_assignable_from(object) {
        return Some(object.clone());
    }
    if binding.is_simple() && object.is_complex() {
        debug!(binding = %binding.target(), object = %object.value_type(), "structured value refused by simple binding");
        return None;
    }
    let converted = converters.convert(object, &expected);
    if converted.is_none() {
        debug!(binding = %binding.target(), from = %object.value_type(), to = %expected, "no conversion, binding skipped");
    }
    converted
}

/// Encodes an object into an element through its chain
pub struct ElementEncodeExecutor<'a> {
    object: &'a Value,
    converters: &'a Converters,
    element: Element,
    used: bool,
}

impl<'a> ElementEncodeExecutor<'a> {
    /// Start from an empty element
    pub fn new(object: &'a Value, element: Element, converters: &'a Converters) -> Self {
        Self {
            object,
            converters,
            element,
            used: false,
        }
    }

    /// Whether any binding accepted the object
    pub fn used(&self) -> bool {
        self.used
    }

    /// The element built so far (possibly a replacement)
    pub fn into_element(self) -> Element {
        self.element
    }
}

impl BindingVisitor for ElementEncodeExecutor<'_> {
    fn visit(&mut self, binding: &Binding) -> Result<()> {
        let Some(object) = accepted(self.object, binding, self.converters) else {
            return Ok(());
        };
        self.used = true;
        let target = self.element.name.to_string();

        match binding {
            Binding::Simple(b) => {
                if object.is_null() {
                    self.element.set_attribute(xsi_nil(), "true");
                    return Ok(());
                }
                let current = self.element.text().unwrap_or_default();
                let text = b
                    .encode(&object, &current)
                    .map_err(|e| binding_failure(e, binding, &target, None))?;
                self.element.set_text(text);
            }
            Binding::Complex(b) => {
                let hint = mem::replace(&mut self.element, Element::new(QName::local("")));
                self.element = b
                    .encode(&object, hint)
                    .map_err(|e| binding_failure(e, binding, &target, None))?;
            }
        }
        Ok(())
    }
}

/// Encodes an object into attribute text through its chain
///
/// Complex bindings in an attribute chain write into a scratch element
/// named after the attribute, whose text becomes the attribute value.
pub struct AttributeEncodeExecutor<'a> {
    object: &'a Value,
    converters: &'a Converters,
    name: QName,
    text: Option<String>,
}

impl<'a> AttributeEncodeExecutor<'a> {
    /// Start with no text
    pub fn new(object: &'a Value, name: QName, converters: &'a Converters) -> Self {
        Self {
            object,
            converters,
            name,
            text: None,
        }
    }

    /// The attribute value, if any binding produced one
    pub fn into_text(self) -> Option<String> {
        self.text
    }
}

impl BindingVisitor for AttributeEncodeExecutor<'_> {
    fn visit(&mut self, binding: &Binding) -> Result<()> {
        let Some(object) = accepted(self.object, binding, self.converters) else {
            return Ok(());
        };
        if object.is_null() {
            return Ok(());
        }
        let target = self.name.to_string();

        match binding {
            Binding::Simple(b) => {
                let current = self.text.clone().unwrap_or_default();
                let text = b
                    .encode(&object, &current)
                    .map_err(|e| binding_failure(e, binding, &target, None))?;
                self.text = Some(text);
            }
            Binding::Complex(b) => {
                let mut scratch = Element::new(self.name.clone());
                if let Some(ref text) = self.text {
                    scratch.set_text(text.as_str());
                }
                let encoded = b
                    .encode(&object, scratch)
                    .map_err(|e| binding_failure(e, binding, &target, None))?;
                if let Some(text) = encoded.text() {
                    self.text = Some(text);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{ComplexBinding, SimpleBinding};
    use crate::error::Error;
    use crate::parser::node::{InstanceComponent, Node};
    use crate::value::{Record, ValueType};

    struct IntText;

    impl SimpleBinding for IntText {
        fn target(&self) -> QName {
            QName::local("int")
        }

        fn value_type(&self) -> Option<ValueType> {
            Some(ValueType::Integer)
        }

        fn parse(&self, _instance: &InstanceComponent, value: Value) -> Result<Value> {
            Ok(value)
        }

        fn encode(&self, object: &Value, _value: &str) -> Result<String> {
            match object {
                Value::Integer(i) if *i < 0 => Err(Error::Value("negative".into())),
                other => Ok(other.lexical().unwrap_or_default()),
            }
        }
    }

    struct AnyText;

    impl SimpleBinding for AnyText {
        fn target(&self) -> QName {
            QName::local("text")
        }

        fn value_type(&self) -> Option<ValueType> {
            Some(ValueType::String)
        }

        fn parse(&self, _instance: &InstanceComponent, value: Value) -> Result<Value> {
            Ok(value)
        }

        fn encode(&self, object: &Value, _value: &str) -> Result<String> {
            Ok(format!("text:{}", object.lexical().unwrap_or_default()))
        }
    }

    struct Replace;

    impl ComplexBinding for Replace {
        fn target(&self) -> QName {
            QName::local("replace")
        }

        fn value_type(&self) -> Option<ValueType> {
            Some(ValueType::Record(None))
        }

        fn parse(&self, _instance: &InstanceComponent, _node: &Node, value: Value) -> Result<Value> {
            Ok(value)
        }

        fn encode(&self, _object: &Value, _element: Element) -> Result<Element> {
            Ok(Element::new(QName::local("replaced")))
        }
    }

    #[test]
    fn test_simple_binding_writes_text() {
        let converters = Converters::new();
        let object = Value::Integer(7);
        let mut executor = ElementEncodeExecutor::new(&object, Element::new(QName::local("n")), &converters);
        executor.visit(&Binding::simple(IntText)).unwrap();
        assert!(executor.used());
        assert_eq!(executor.into_element().text().as_deref(), Some("7"));
    }

    #[test]
    fn test_null_sets_nil() {
        let converters = Converters::new();
        let object = Value::Null;
        let mut executor = ElementEncodeExecutor::new(&object, Element::new(QName::local("n")), &converters);
        executor.visit(&Binding::simple(IntText)).unwrap();
        let element = executor.into_element();
        assert_eq!(element.attribute(&xsi_nil()), Some("true"));
        assert_eq!(element.text(), None);
    }

    #[test]
    fn test_records_skip_simple_bindings() {
        let converters = Converters::new();
        let object = Value::Record(Record::new().with_field("a", Value::Integer(1)));
        let mut executor = ElementEncodeExecutor::new(&object, Element::new(QName::local("n")), &converters);
        executor.visit(&Binding::simple(AnyText)).unwrap();
        assert!(!executor.used());
        executor.visit(&Binding::complex(Replace)).unwrap();
        assert_eq!(executor.into_element().name, QName::local("replaced"));
    }

    #[test]
    fn test_unconvertible_object_is_skipped() {
        let converters = Converters::empty();
        let object = Value::String("x".into());
        let mut executor = ElementEncodeExecutor::new(&object, Element::new(QName::local("n")), &converters);
        executor.visit(&Binding::simple(IntText)).unwrap();
        assert!(!executor.used());
    }

    #[test]
    fn test_encode_failure_names_the_target() {
        let converters = Converters::new();
        let object = Value::Integer(-1);
        let mut executor = ElementEncodeExecutor::new(&object, Element::new(QName::local("n")), &converters);
        match executor.visit(&Binding::simple(IntText)) {
            Err(Error::Binding(e)) => assert_eq!(e.target.as_deref(), Some("n")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_attribute_text_via_conversion() {
        let converters = Converters::new();
        let object = Value::Integer(3);
        let mut executor = AttributeEncodeExecutor::new(&object, QName::local("a"), &converters);
        executor.visit(&Binding::simple(AnyText)).unwrap();
        assert_eq!(executor.into_text().as_deref(), Some("text:3"));
    }
}
