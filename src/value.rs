//! Bound values
//!
//! [`Value`] is the domain object model bindings produce when parsing and
//! consume when encoding. Scalars carry their lexical conversions here so
//! that bindings and converters share one definition of each XSD lexical
//! space.

use std::fmt;

use base64::Engine;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value as JsonValue};

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::QName;

/// A domain object
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (xsi:nil, or a binding returning nothing)
    Null,
    /// xs:boolean
    Boolean(bool),
    /// xs:integer and its bounded subtypes
    Integer(i64),
    /// xs:decimal
    Decimal(Decimal),
    /// xs:float, xs:double
    Double(f64),
    /// xs:string family, xs:anyURI, and untyped text
    String(String),
    /// xs:date
    Date(NaiveDate),
    /// xs:time
    Time(NaiveTime),
    /// xs:dateTime with its optional timezone
    DateTime(NaiveDateTime, Option<FixedOffset>),
    /// xs:hexBinary, xs:base64Binary
    Binary(Vec<u8>),
    /// xs:QName
    QName(QName),
    /// List type values, or repeated children
    List(Vec<Value>),
    /// Structured object with named properties
    Record(Record),
    /// Raw DOM element
    Element(Element),
}

/// A structured domain object: a type name and ordered named fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Domain type name, used for assignability checks
    pub type_name: Option<String>,
    /// Properties in insertion order
    pub fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an untyped record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record of a named domain type
    pub fn typed(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            fields: IndexMap::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Add a value to a field, turning repeated fields into lists
    pub fn append(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.get_mut(&name) {
            Some(Value::List(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, Value::Null);
                *existing = Value::List(vec![first, value]);
            }
            None => {
                self.fields.insert(name, value);
            }
        }
    }
}

/// The declared type a binding operates on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Boolean values
    Boolean,
    /// Integer values
    Integer,
    /// Decimal values
    Decimal,
    /// Floating point values
    Double,
    /// Text
    String,
    /// Calendar dates
    Date,
    /// Times of day
    Time,
    /// Date and time
    DateTime,
    /// Binary data
    Binary,
    /// Qualified names
    QName,
    /// Lists
    List,
    /// Records, optionally of one domain type
    Record(Option<String>),
    /// DOM elements
    Element,
    /// Anything
    Any,
}

impl ValueType {
    /// Check if a value can be handed to a binding declared for this type
    pub fn is_assignable_from(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Any, _) | (_, Value::Null) => true,
            (ValueType::Record(None), Value::Record(_)) => true,
            (ValueType::Record(Some(expected)), Value::Record(r)) => r.type_name.as_deref() == Some(expected),
            (ValueType::Integer, Value::Decimal(d)) => d.fract().is_zero(),
            (expected, value) => *expected == value.value_type(),
        }
    }

    /// Check if values of this type are plain scalars
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            ValueType::List | ValueType::Record(_) | ValueType::Element | ValueType::Any
        )
    }

    /// Parse a lexical value into a value of this type
    pub fn parse_lexical(&self, text: &str) -> Result<Value> {
        let invalid = |what: &str| Error::Value(format!("'{}' is not a valid {} value", text, what));
        let trimmed = text.trim();
        match self {
            ValueType::Boolean => match trimmed {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(invalid("boolean")),
            },
            ValueType::Integer => {
                let unsigned = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
                if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("integer"));
                }
                let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
                match digits.parse::<i64>() {
                    Ok(i) => Ok(Value::Integer(i)),
                    // Out of i64 range
                    Err(_) => digits.parse::<Decimal>().map(Value::Decimal).map_err(|_| invalid("integer")),
                }
            }
            ValueType::Decimal => trimmed
                .parse::<Decimal>()
                .map(Value::Decimal)
                .map_err(|_| invalid("decimal")),
            ValueType::Double => parse_double(trimmed).map(Value::Double).ok_or_else(|| invalid("double")),
            ValueType::Date => {
                let date_part = trimmed.get(..10).unwrap_or(trimmed);
                NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| invalid("date"))
            }
            ValueType::Time => {
                let (time, _) = split_timezone(trimmed);
                NaiveTime::parse_from_str(time, "%H:%M:%S%.f")
                    .map(Value::Time)
                    .map_err(|_| invalid("time"))
            }
            ValueType::DateTime => {
                let (local, offset) = split_timezone(trimmed);
                let offset = match offset {
                    Some(tz) => Some(parse_offset(tz).ok_or_else(|| invalid("timezone"))?),
                    None => None,
                };
                NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|dt| Value::DateTime(dt, offset))
                    .map_err(|_| invalid("dateTime"))
            }
            ValueType::Binary => base64::engine::general_purpose::STANDARD
                .decode(trimmed.replace(char::is_whitespace, ""))
                .map(Value::Binary)
                .map_err(|_| invalid("base64Binary")),
            ValueType::QName => Ok(Value::QName(QName::from_clark(trimmed)?)),
            ValueType::List => Ok(Value::List(
                trimmed.split_whitespace().map(|s| Value::String(s.to_string())).collect(),
            )),
            ValueType::String | ValueType::Any => Ok(Value::String(text.to_string())),
            ValueType::Record(_) | ValueType::Element => {
                Err(Error::Value(format!("no lexical form for {:?}", self)))
            }
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Record(Some(name)) => write!(f, "Record<{}>", name),
            ValueType::Record(None) => write!(f, "Record"),
            other => write!(f, "{:?}", other),
        }
    }
}

fn parse_double(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        // Rust accepts "inf"/"nan" spellings XSD does not
        _ if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => None,
        _ => s.parse::<f64>().ok(),
    }
}

/// Split a trailing `Z` or `±hh:mm` timezone off a lexical value
fn split_timezone(s: &str) -> (&str, Option<&str>) {
    if let Some(local) = s.strip_suffix('Z') {
        return (local, Some("Z"));
    }
    if s.len() > 6 {
        let (local, tz) = s.split_at(s.len() - 6);
        if (tz.starts_with('+') || tz.starts_with('-')) && tz.as_bytes()[3] == b':' {
            return (local, Some(tz));
        }
    }
    (s, None)
}

fn parse_offset(tz: &str) -> Option<FixedOffset> {
    if tz == "Z" {
        return FixedOffset::east_opt(0);
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let hours: i32 = tz.get(1..3)?.parse().ok()?;
    let minutes: i32 = tz.get(4..6)?.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn format_offset(offset: &FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "Z".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.abs();
    format!("{}{:02}:{:02}", sign, seconds / 3600, (seconds % 3600) / 60)
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        value.to_string()
    }
}

impl Value {
    /// Runtime type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::DateTime(_, _) => ValueType::DateTime,
            Value::Binary(_) => ValueType::Binary,
            Value::QName(_) => ValueType::QName,
            Value::List(_) => ValueType::List,
            Value::Record(r) => ValueType::Record(r.type_name.clone()),
            Value::Element(_) => ValueType::Element,
        }
    }

    /// Check for the null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is a structured (non-scalar) value
    pub fn is_complex(&self) -> bool {
        matches!(self, Value::List(_) | Value::Record(_) | Value::Element(_))
    }

    /// Lexical form of a scalar value; None for structured values and null
    pub fn lexical(&self) -> Option<String> {
        Some(match self {
            Value::Null | Value::Record(_) | Value::Element(_) => return None,
            Value::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.normalize().to_string(),
            Value::Double(d) => format_double(*d),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::DateTime(dt, offset) => {
                let local = dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string();
                match offset {
                    Some(offset) => local + &format_offset(offset),
                    None => local,
                }
            }
            Value::Binary(b) => base64::engine::general_purpose::STANDARD.encode(b),
            Value::QName(q) => q.to_string(),
            Value::List(items) => {
                let parts: Option<Vec<String>> = items.iter().map(|v| v.lexical()).collect();
                parts?.join(" ")
            }
        })
    }

    /// Get the string content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer content
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the boolean content
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the record content
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Convert to JSON for display and export
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => json!(b),
            Value::Integer(i) => json!(i),
            Value::Double(d) if d.is_finite() => json!(d),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(record) => {
                let mut map = Map::new();
                if let Some(ref type_name) = record.type_name {
                    map.insert("@type".to_string(), json!(type_name));
                }
                for (name, value) in &record.fields {
                    map.insert(name.clone(), value.to_json());
                }
                JsonValue::Object(map)
            }
            Value::Element(element) => json!({ "@element": element.name.to_string() }),
            other => other.lexical().map(JsonValue::String).unwrap_or(JsonValue::Null),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_assignability() {
        let record = Value::Record(Record::typed("Base"));
        assert!(ValueType::Record(Some("Base".into())).is_assignable_from(&record));
        assert!(!ValueType::Record(Some("Derived".into())).is_assignable_from(&record));
        assert!(ValueType::Record(None).is_assignable_from(&record));
        assert!(ValueType::Any.is_assignable_from(&record));
        assert!(!ValueType::String.is_assignable_from(&record));
        assert!(ValueType::Integer.is_assignable_from(&Value::Null));
    }

    #[test]
    fn test_parse_lexical_scalars() {
        assert_eq!(ValueType::Integer.parse_lexical(" 42 ").unwrap(), Value::Integer(42));
        assert_eq!(ValueType::Integer.parse_lexical("+7").unwrap(), Value::Integer(7));
        assert_eq!(ValueType::Boolean.parse_lexical("1").unwrap(), Value::Boolean(true));
        assert_eq!(ValueType::Double.parse_lexical("-INF").unwrap(), Value::Double(f64::NEG_INFINITY));
        assert!(ValueType::Double.parse_lexical("inf").is_err());
        assert!(ValueType::Integer.parse_lexical("4.2").is_err());
        assert!(ValueType::Integer.parse_lexical("-").is_err());
        let wide = ValueType::Integer.parse_lexical("9223372036854775808").unwrap();
        assert!(matches!(wide, Value::Decimal(_)));
        assert!(ValueType::Integer.is_assignable_from(&wide));
        assert_eq!(
            ValueType::Decimal.parse_lexical("1.50").unwrap().lexical().as_deref(),
            Some("1.5")
        );
    }

    #[test]
    fn test_date_time_lexical() {
        let value = ValueType::DateTime.parse_lexical("2024-02-29T10:30:00+02:00").unwrap();
        assert_eq!(value.lexical().as_deref(), Some("2024-02-29T10:30:00+02:00"));

        let utc = ValueType::DateTime.parse_lexical("2024-02-29T10:30:00.5Z").unwrap();
        assert_eq!(utc.lexical().as_deref(), Some("2024-02-29T10:30:00.500Z"));

        let date = ValueType::Date.parse_lexical("2001-10-26").unwrap();
        assert_eq!(date.lexical().as_deref(), Some("2001-10-26"));
        assert!(ValueType::Date.parse_lexical("2001-13-26").is_err());
    }

    #[test]
    fn test_record_append_builds_lists() {
        let mut record = Record::new();
        record.append("item", Value::Integer(1));
        record.append("item", Value::Integer(2));
        record.append("item", Value::Integer(3));
        assert_eq!(
            record.get("item"),
            Some(&Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]))
        );
    }

    #[test]
    fn test_complex_values_have_no_lexical_form() {
        assert!(Value::Record(Record::new()).lexical().is_none());
        assert!(Value::Record(Record::new()).is_complex());
        assert_eq!(
            Value::List(vec![Value::Integer(1), Value::Integer(2)]).lexical().as_deref(),
            Some("1 2")
        );
    }

    #[test]
    fn test_to_json() {
        let record = Record::typed("Order")
            .with_field("count", Value::Integer(2))
            .with_field("note", Value::Null);
        assert_eq!(
            Value::Record(record).to_json(),
            json!({"@type": "Order", "count": 2, "note": null})
        );
    }
}
