//! Type conversion
//!
//! Encoding hands a domain object to a binding only when the object is
//! assignable to the binding's declared type. Otherwise the registered
//! [`TypeConverter`]s are asked, in order, to produce a value of that type.

use std::fmt;
use std::sync::Arc;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::trace;

use crate::value::{Value, ValueType};

/// Converts values between domain types
pub trait TypeConverter: Send + Sync {
    /// Convert `value` to `target`, or None if this converter cannot
    fn convert(&self, value: &Value, target: &ValueType) -> Option<Value>;
}

impl<F> TypeConverter for F
where
    F: Fn(&Value, &ValueType) -> Option<Value> + Send + Sync,
{
    fn convert(&self, value: &Value, target: &ValueType) -> Option<Value> {
        self(value, target)
    }
}

/// Ordered list of converters; the first successful conversion wins
#[derive(Clone)]
pub struct Converters {
    converters: Vec<Arc<dyn TypeConverter>>,
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converters")
            .field("converters", &self.converters.len())
            .finish()
    }
}

impl Default for Converters {
    fn default() -> Self {
        Self::new()
    }
}

impl Converters {
    /// Converter list with only the [`DefaultConverter`]
    pub fn new() -> Self {
        Self {
            converters: vec![Arc::new(DefaultConverter)],
        }
    }

    /// Converter list with no converters at all
    pub fn empty() -> Self {
        Self { converters: Vec::new() }
    }

    /// Add a converter, tried before the ones already present
    pub fn with_converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converters.insert(0, Arc::new(converter));
        self
    }

    /// Convert a value, returning it unchanged if already assignable
    pub fn convert(&self, value: &Value, target: &ValueType) -> Option<Value> {
        if target.is_assignable_from(value) {
            return Some(value.clone());
        }
        let converted = self.converters.iter().find_map(|c| c.convert(value, target));
        trace!(from = %value.value_type(), to = %target, ok = converted.is_some(), "type conversion");
        converted
    }
}

/// Conversions between scalar values and their lexical forms
///
/// Structured values are never converted to text: every object has a
/// string form, and accepting it would let any record pass as a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConverter;

impl TypeConverter for DefaultConverter {
    fn convert(&self, value: &Value, target: &ValueType) -> Option<Value> {
        if value.is_complex() && target.is_scalar() {
            return None;
        }

        match (value, target) {
            (Value::Integer(i), ValueType::Decimal) => Some(Value::Decimal(Decimal::from(*i))),
            (Value::Integer(i), ValueType::Double) => Some(Value::Double(*i as f64)),
            (Value::Decimal(d), ValueType::Double) => d.to_f64().map(Value::Double),
            (Value::Decimal(d), ValueType::Integer) if d.fract().is_zero() => d.to_i64().map(Value::Integer),
            (Value::Double(d), ValueType::Decimal) => Decimal::from_f64(*d).map(Value::Decimal),
            // i64::MAX as f64 is 2^63
            (Value::Double(d), ValueType::Integer)
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d < i64::MAX as f64 =>
            {
                Some(Value::Integer(*d as i64))
            }
            (Value::DateTime(dt, _), ValueType::Date) => Some(Value::Date(dt.date())),
            (Value::DateTime(dt, _), ValueType::Time) => Some(Value::Time(dt.time())),
            (Value::String(s), target) if target.is_scalar() => target.parse_lexical(s).ok(),
            (value, ValueType::String) => value.lexical().map(Value::String),
            (value, ValueType::List) if !value.is_null() => Some(Value::List(vec![value.clone()])),
            _ => None,
        }
    }
}
