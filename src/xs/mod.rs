//! The XML Schema binding configuration
//!
//! Registers a binding for every built-in type so that any type hierarchy
//! ends in bindings that turn text into typed values. Most configurations
//! depend on [`XsConfiguration`]; see [`crate::binding::Configuration::new`].

pub mod bindings;

use crate::binding::{Binding, BindingConfiguration, BindingRegistry};
use crate::namespaces::NamespaceContext;
use crate::schema::builtins::xs;
use crate::value::ValueType;
use crate::XSD_NAMESPACE;

pub use bindings::{AnyTypeBinding, HexBinaryBinding, QNameBinding, ScalarBinding, TEXT_KEY};

const STRING_TYPES: &[&str] = &[
    "anySimpleType",
    "string",
    "normalizedString",
    "token",
    "language",
    "Name",
    "NCName",
    "NMTOKEN",
    "ID",
    "IDREF",
    "ENTITY",
    "NOTATION",
    "anyURI",
    "duration",
    "gYear",
    "gYearMonth",
    "gMonth",
    "gMonthDay",
    "gDay",
];

const LIST_TYPES: &[&str] = &["NMTOKENS", "IDREFS", "ENTITIES"];

const INTEGER_TYPES: &[(&str, Option<i128>, Option<i128>)] = &[
    ("integer", None, None),
    ("long", Some(i64::MIN as i128), Some(i64::MAX as i128)),
    ("int", Some(i32::MIN as i128), Some(i32::MAX as i128)),
    ("short", Some(i16::MIN as i128), Some(i16::MAX as i128)),
    ("byte", Some(i8::MIN as i128), Some(i8::MAX as i128)),
    ("nonNegativeInteger", Some(0), None),
    ("positiveInteger", Some(1), None),
    ("nonPositiveInteger", None, Some(0)),
    ("negativeInteger", None, Some(-1)),
    ("unsignedLong", Some(0), Some(u64::MAX as i128)),
    ("unsignedInt", Some(0), Some(u32::MAX as i128)),
    ("unsignedShort", Some(0), Some(u16::MAX as i128)),
    ("unsignedByte", Some(0), Some(u8::MAX as i128)),
];

/// Bindings for the `http://www.w3.org/2001/XMLSchema` namespace
#[derive(Debug, Clone, Copy, Default)]
pub struct XsConfiguration;

impl XsConfiguration {
    /// Create the configuration
    pub fn new() -> Self {
        Self
    }
}

impl BindingConfiguration for XsConfiguration {
    fn namespace(&self) -> &str {
        XSD_NAMESPACE
    }

    fn configure_bindings(&self, registry: &mut BindingRegistry) {
        for name in STRING_TYPES {
            registry.register(Binding::simple(ScalarBinding::new(name, ValueType::String)));
        }
        for name in LIST_TYPES {
            registry.register(Binding::simple(ScalarBinding::new(name, ValueType::List)));
        }
        for &(name, min, max) in INTEGER_TYPES {
            let mut binding = ScalarBinding::new(name, ValueType::Integer);
            if let Some(min) = min {
                binding = binding.with_min(min);
            }
            if let Some(max) = max {
                binding = binding.with_max(max);
            }
            registry.register(Binding::simple(binding));
        }

        registry.register(Binding::simple(ScalarBinding::new("boolean", ValueType::Boolean)));
        registry.register(Binding::simple(ScalarBinding::new("decimal", ValueType::Decimal)));
        registry.register(Binding::simple(ScalarBinding::new("float", ValueType::Double)));
        registry.register(Binding::simple(ScalarBinding::new("double", ValueType::Double)));
        registry.register(Binding::simple(ScalarBinding::new("date", ValueType::Date)));
        registry.register(Binding::simple(ScalarBinding::new("time", ValueType::Time)));
        registry.register(Binding::simple(ScalarBinding::new("dateTime", ValueType::DateTime)));
        registry.register(Binding::simple(ScalarBinding::new("base64Binary", ValueType::Binary)));
        registry.register(Binding::simple(HexBinaryBinding));
        registry.register_factory(xs("QName"), |context| {
            Ok(Binding::simple(QNameBinding::new(context.get::<NamespaceContext>())))
        });
        registry.register(Binding::complex(AnyTypeBinding));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Context;
    use std::sync::Arc;

    #[test]
    fn test_every_builtin_has_a_binding() {
        let mut registry = BindingRegistry::new();
        XsConfiguration::new().configure_bindings(&mut registry);
        for name in ["int", "string", "anyType", "anySimpleType", "QName", "hexBinary", "dateTime"] {
            assert!(registry.contains(&xs(name)), "missing binding for xs:{}", name);
        }
        let any = registry.load(&xs("anyType"), &Context::new()).unwrap().unwrap();
        assert!(!any.is_simple());
    }

    #[test]
    fn test_qname_factory_reads_namespaces() {
        let mut registry = BindingRegistry::new();
        XsConfiguration::new().configure_bindings(&mut registry);

        let mut ns = NamespaceContext::new();
        ns.add_prefix("p", "urn:p");
        let mut context = Context::new();
        context.register_arc(Arc::new(ns));

        let binding = registry.load(&xs("QName"), &context).unwrap().unwrap();
        let Binding::Simple(simple) = binding else {
            panic!("QName binding should be simple");
        };
        let name = crate::value::Value::QName(crate::namespaces::QName::namespaced("urn:p", "x"));
        assert_eq!(simple.encode(&name, "").unwrap(), "p:x");
    }
}
