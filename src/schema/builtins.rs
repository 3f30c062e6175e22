//! XSD built-in types
//!
//! The built-in type hierarchy of XML Schema as a schema document, shared by
//! every schema index so that walking any type's base chain ends at
//! `xs:anyType`.

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::components::{SimpleTypeInfo, TypeDefinition, TypeRef, Variety, WhiteSpace};
use super::document::SchemaDocument;
use crate::namespaces::QName;

// =============================================================================
// XSD Namespace Constants
// =============================================================================

/// XSD 1.0 Namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XSD anyType type name
pub const XSD_ANY_TYPE: &str = "anyType";
/// XSD anySimpleType type name
pub const XSD_ANY_SIMPLE_TYPE: &str = "anySimpleType";
/// XSD string type name
pub const XSD_STRING: &str = "string";
/// XSD normalizedString type name
pub const XSD_NORMALIZED_STRING: &str = "normalizedString";
/// XSD token type name
pub const XSD_TOKEN: &str = "token";
/// XSD boolean type name
pub const XSD_BOOLEAN: &str = "boolean";
/// XSD decimal type name
pub const XSD_DECIMAL: &str = "decimal";
/// XSD integer type name
pub const XSD_INTEGER: &str = "integer";
/// XSD long type name
pub const XSD_LONG: &str = "long";
/// XSD int type name
pub const XSD_INT: &str = "int";
/// XSD short type name
pub const XSD_SHORT: &str = "short";
/// XSD byte type name
pub const XSD_BYTE: &str = "byte";
/// XSD float type name
pub const XSD_FLOAT: &str = "float";
/// XSD double type name
pub const XSD_DOUBLE: &str = "double";
/// XSD dateTime type name
pub const XSD_DATETIME: &str = "dateTime";
/// XSD date type name
pub const XSD_DATE: &str = "date";
/// XSD time type name
pub const XSD_TIME: &str = "time";
/// XSD hexBinary type name
pub const XSD_HEX_BINARY: &str = "hexBinary";
/// XSD base64Binary type name
pub const XSD_BASE64_BINARY: &str = "base64Binary";
/// XSD anyURI type name
pub const XSD_ANY_URI: &str = "anyURI";
/// XSD QName type name
pub const XSD_QNAME: &str = "QName";

/// (name, base, whitespace) of the atomic built-ins, parents listed first
const ATOMIC_TYPES: &[(&str, &str, WhiteSpace)] = &[
    ("string", "anySimpleType", WhiteSpace::Preserve),
    ("normalizedString", "string", WhiteSpace::Replace),
    ("token", "normalizedString", WhiteSpace::Collapse),
    ("language", "token", WhiteSpace::Collapse),
    ("Name", "token", WhiteSpace::Collapse),
    ("NMTOKEN", "token", WhiteSpace::Collapse),
    ("NCName", "Name", WhiteSpace::Collapse),
    ("ID", "NCName", WhiteSpace::Collapse),
    ("IDREF", "NCName", WhiteSpace::Collapse),
    ("ENTITY", "NCName", WhiteSpace::Collapse),
    ("boolean", "anySimpleType", WhiteSpace::Collapse),
    ("decimal", "anySimpleType", WhiteSpace::Collapse),
    ("integer", "decimal", WhiteSpace::Collapse),
    ("long", "integer", WhiteSpace::Collapse),
    ("int", "long", WhiteSpace::Collapse),
    ("short", "int", WhiteSpace::Collapse),
    ("byte", "short", WhiteSpace::Collapse),
    ("nonNegativeInteger", "integer", WhiteSpace::Collapse),
    ("positiveInteger", "nonNegativeInteger", WhiteSpace::Collapse),
    ("unsignedLong", "nonNegativeInteger", WhiteSpace::Collapse),
    ("unsignedInt", "unsignedLong", WhiteSpace::Collapse),
    ("unsignedShort", "unsignedInt", WhiteSpace::Collapse),
    ("unsignedByte", "unsignedShort", WhiteSpace::Collapse),
    ("nonPositiveInteger", "integer", WhiteSpace::Collapse),
    ("negativeInteger", "nonPositiveInteger", WhiteSpace::Collapse),
    ("float", "anySimpleType", WhiteSpace::Collapse),
    ("double", "anySimpleType", WhiteSpace::Collapse),
    ("duration", "anySimpleType", WhiteSpace::Collapse),
    ("dateTime", "anySimpleType", WhiteSpace::Collapse),
    ("time", "anySimpleType", WhiteSpace::Collapse),
    ("date", "anySimpleType", WhiteSpace::Collapse),
    ("gYearMonth", "anySimpleType", WhiteSpace::Collapse),
    ("gYear", "anySimpleType", WhiteSpace::Collapse),
    ("gMonthDay", "anySimpleType", WhiteSpace::Collapse),
    ("gDay", "anySimpleType", WhiteSpace::Collapse),
    ("gMonth", "anySimpleType", WhiteSpace::Collapse),
    ("hexBinary", "anySimpleType", WhiteSpace::Collapse),
    ("base64Binary", "anySimpleType", WhiteSpace::Collapse),
    ("anyURI", "anySimpleType", WhiteSpace::Collapse),
    ("QName", "anySimpleType", WhiteSpace::Collapse),
    ("NOTATION", "anySimpleType", WhiteSpace::Collapse),
];

/// (name, item type) of the list built-ins
const LIST_TYPES: &[(&str, &str)] = &[
    ("IDREFS", "IDREF"),
    ("ENTITIES", "ENTITY"),
    ("NMTOKENS", "NMTOKEN"),
];

/// Qualified name of a built-in type
pub fn xs(local_name: &str) -> QName {
    QName::namespaced(XSD_NAMESPACE, local_name)
}

/// Qualified name of xs:anyType
pub fn any_type_name() -> QName {
    xs(XSD_ANY_TYPE)
}

/// Check if a type name is in the XSD namespace
pub fn is_builtin(name: &QName) -> bool {
    name.namespace() == Some(XSD_NAMESPACE)
}

static BUILTINS: Lazy<Arc<SchemaDocument>> = Lazy::new(|| Arc::new(build_builtins()));

/// The shared built-in schema document
pub fn builtin_schema() -> Arc<SchemaDocument> {
    Arc::clone(&BUILTINS)
}

fn build_builtins() -> SchemaDocument {
    let doc = SchemaDocument::new(Some(XSD_NAMESPACE.to_string()));

    doc.add_type(Arc::new(TypeDefinition::complex(Some(xs(XSD_ANY_TYPE)), None).with_mixed(true)));
    doc.add_type(Arc::new(TypeDefinition::simple(
        Some(xs(XSD_ANY_SIMPLE_TYPE)),
        Some(TypeRef::Named(xs(XSD_ANY_TYPE))),
    )));

    for (name, base, white_space) in ATOMIC_TYPES {
        let info = SimpleTypeInfo {
            white_space: Some(*white_space),
            ..SimpleTypeInfo::default()
        };
        doc.add_type(Arc::new(
            TypeDefinition::simple(Some(xs(name)), Some(TypeRef::Named(xs(base))))
                .with_simple_info(info),
        ));
    }

    for (name, item) in LIST_TYPES {
        let info = SimpleTypeInfo {
            variety: Variety::List,
            item_type: Some(TypeRef::Named(xs(item))),
            white_space: Some(WhiteSpace::Collapse),
            ..SimpleTypeInfo::default()
        };
        doc.add_type(Arc::new(
            TypeDefinition::simple(Some(xs(name)), Some(TypeRef::Named(xs(XSD_ANY_SIMPLE_TYPE))))
                .with_simple_info(info),
        ));
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_hierarchy() {
        let schema = builtin_schema();
        let int = schema.type_definition(&xs(XSD_INT)).unwrap();
        assert_eq!(int.base.as_ref().and_then(|b| b.name()), Some(&xs(XSD_LONG)));

        let any = schema.type_definition(&any_type_name()).unwrap();
        assert!(any.base.is_none());
        assert!(any.is_complex());
    }

    #[test]
    fn test_builtin_schema_is_shared() {
        let a = builtin_schema();
        let b = builtin_schema();
        assert_eq!(a.id, b.id);
        assert!(is_builtin(&xs("string")));
        assert!(!is_builtin(&QName::local("string")));
    }

    #[test]
    fn test_list_builtins() {
        let schema = builtin_schema();
        let tokens = schema.type_definition(&xs("NMTOKENS")).unwrap();
        let info = tokens.as_simple().unwrap();
        assert_eq!(info.variety, Variety::List);
        assert_eq!(info.item_type.as_ref().and_then(|t| t.name()), Some(&xs("NMTOKEN")));
    }
}
