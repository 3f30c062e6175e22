//! Bindings for the XML Schema built-in types

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;

use crate::binding::{ComplexBinding, SimpleBinding};
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, QName};
use crate::parser::node::{InstanceComponent, Node};
use crate::schema::builtins::xs;
use crate::value::{Record, Value, ValueType};

/// Record key holding the text content of an element with structure
pub const TEXT_KEY: &str = "$";

/// Lexical scalar binding driven by a [`ValueType`]
///
/// Text values are parsed into the binding's type; values already parsed
/// by a more derived binding pass through unchanged.
#[derive(Debug, Clone)]
pub struct ScalarBinding {
    target: QName,
    value_type: ValueType,
    min: Option<i128>,
    max: Option<i128>,
}

impl ScalarBinding {
    /// Create a binding for a built-in type
    pub fn new(local_name: &str, value_type: ValueType) -> Self {
        Self {
            target: xs(local_name),
            value_type,
            min: None,
            max: None,
        }
    }

    /// Inclusive lower bound for integer values
    pub fn with_min(mut self, min: i128) -> Self {
        self.min = Some(min);
        self
    }

    /// Inclusive upper bound for integer values
    pub fn with_max(mut self, max: i128) -> Self {
        self.max = Some(max);
        self
    }

    fn parse_text(&self, text: &str) -> Result<Value> {
        let value = self.value_type.parse_lexical(text)?;
        let number = match value {
            Value::Integer(i) => Some(i128::from(i)),
            Value::Decimal(ref d) => d.to_i128(),
            _ => return Ok(value),
        };
        let in_range = number.map_or(false, |n| {
            self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max)
        });
        if !in_range {
            return Err(Error::Value(format!(
                "{} is out of range for {}",
                text.trim(),
                self.target.local_name
            )));
        }
        Ok(value)
    }
}

impl SimpleBinding for ScalarBinding {
    fn target(&self) -> QName {
        self.target.clone()
    }

    fn value_type(&self) -> Option<ValueType> {
        Some(self.value_type.clone())
    }

    fn parse(&self, _instance: &InstanceComponent, value: Value) -> Result<Value> {
        if self.value_type == ValueType::String || self.value_type == ValueType::List {
            return Ok(value);
        }
        match value {
            Value::String(ref text) => self.parse_text(text),
            Value::List(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(ref text) => self.parse_text(text),
                    other => Ok(other),
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Ok(other),
        }
    }

    fn encode(&self, object: &Value, _value: &str) -> Result<String> {
        object
            .lexical()
            .ok_or_else(|| Error::Encode(format!("no lexical form for {} as {}", object.value_type(), self.target)))
    }
}

/// xs:hexBinary
#[derive(Debug, Clone, Copy, Default)]
pub struct HexBinaryBinding;

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return Err(Error::Value(format!("'{}' has an odd number of hex digits", text)));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            text.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| Error::Value(format!("'{}' is not a valid hexBinary value", text)))
        })
        .collect()
}

impl SimpleBinding for HexBinaryBinding {
    fn target(&self) -> QName {
        xs("hexBinary")
    }

    fn value_type(&self) -> Option<ValueType> {
        Some(ValueType::Binary)
    }

    fn parse(&self, _instance: &InstanceComponent, value: Value) -> Result<Value> {
        match value {
            Value::String(ref text) => decode_hex(text).map(Value::Binary),
            other => Ok(other),
        }
    }

    fn encode(&self, object: &Value, _value: &str) -> Result<String> {
        match object {
            Value::Binary(bytes) => Ok(bytes.iter().map(|b| format!("{:02X}", b)).collect()),
            other => Err(Error::Encode(format!("cannot encode {} as hexBinary", other.value_type()))),
        }
    }
}

/// xs:QName, resolving prefixes against the namespaces in scope
#[derive(Debug, Clone, Default)]
pub struct QNameBinding {
    namespaces: Option<Arc<NamespaceContext>>,
}

impl QNameBinding {
    /// Create a binding writing prefixes from `namespaces`
    pub fn new(namespaces: Option<Arc<NamespaceContext>>) -> Self {
        Self { namespaces }
    }
}

impl SimpleBinding for QNameBinding {
    fn target(&self) -> QName {
        xs("QName")
    }

    fn value_type(&self) -> Option<ValueType> {
        Some(ValueType::QName)
    }

    fn parse(&self, instance: &InstanceComponent, value: Value) -> Result<Value> {
        match value {
            Value::String(ref text) => instance.namespaces.resolve(text.trim()).map(Value::QName),
            other => Ok(other),
        }
    }

    fn encode(&self, object: &Value, _value: &str) -> Result<String> {
        let Value::QName(name) = object else {
            return Err(Error::Encode(format!("cannot encode {} as QName", object.value_type())));
        };
        let Some(namespace) = name.namespace() else {
            return Ok(name.local_name.clone());
        };
        let context = self.namespaces.as_deref();
        if context.and_then(|c| c.get_default_namespace()) == Some(namespace) {
            return Ok(name.local_name.clone());
        }
        match context.and_then(|c| c.get_prefix(namespace)) {
            Some(prefix) => Ok(format!("{}:{}", prefix, name.local_name)),
            None => Err(Error::Encode(format!("no prefix bound to namespace {}", namespace))),
        }
    }
}

/// xs:anyType, the root of every type hierarchy
///
/// Leaf elements bind to their text; elements with attributes or children
/// bind to a record of attribute values, child values (repeated children
/// as lists) and the element's content under [`TEXT_KEY`]. A simple value
/// produced by a more derived binding is that content; a record or element
/// produced by one is kept as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyTypeBinding;

impl ComplexBinding for AnyTypeBinding {
    fn target(&self) -> QName {
        xs("anyType")
    }

    fn value_type(&self) -> Option<ValueType> {
        Some(ValueType::Any)
    }

    fn parse(&self, instance: &InstanceComponent, node: &Node, value: Value) -> Result<Value> {
        if matches!(value, Value::Record(_) | Value::Element(_)) {
            return Ok(value);
        }

        let text = instance.text.trim();
        let has_children = node.element_children().next().is_some();
        if !has_children && node.attributes.is_empty() {
            return Ok(match value {
                Value::Null if text.is_empty() => Value::Null,
                Value::Null => Value::String(instance.text.clone()),
                value => value,
            });
        }

        let mut record = Record::new();
        for attribute in &node.attributes {
            record.insert(attribute.name.local_name.clone(), attribute.value_or_null());
        }
        for child in node.element_children() {
            record.append(child.name.local_name.clone(), child.value_or_null());
        }
        if !value.is_null() {
            record.insert(TEXT_KEY, value);
        } else if !text.is_empty() {
            record.insert(TEXT_KEY, Value::String(text.to_string()));
        }
        Ok(Value::Record(record))
    }

    fn encode(&self, object: &Value, mut element: Element) -> Result<Element> {
        match object {
            Value::Element(replacement) => Ok(replacement.clone()),
            Value::Record(record) => {
                if let Some(text) = record.get(TEXT_KEY).and_then(Value::lexical) {
                    element.set_text(text);
                }
                Ok(element)
            }
            scalar => {
                if element.text().is_none() {
                    if let Some(text) = scalar.lexical() {
                        element.set_text(text);
                    }
                }
                Ok(element)
            }
        }
    }

    fn property(&self, object: &Value, name: &QName) -> Option<Value> {
        match object {
            Value::Record(record) => record.get(&name.local_name).cloned(),
            Value::Element(element) => element
                .attribute(name)
                .map(|v| Value::String(v.to_string()))
                .or_else(|| {
                    element
                        .find_children(&name.local_name)
                        .first()
                        .map(|child| Value::Element((*child).clone()))
                }),
            _ => None,
        }
    }
}
