//! Property tests for scalar round trips and mixed content normalization

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;

use common::{encoder_for, parser_for, po, po_configuration};
use xmlbind::namespaces::NamespaceContext;
use xmlbind::parser::{normalize_mixed, InstanceComponent, Node};
use xmlbind::schema::{Declaration, ElementDecl, TypeDefinition};
use xmlbind::{Encoder, Parser, QName, Value};

fn round_trip(encoder: &Encoder, parser: &Parser, value: &Value, element: &str) -> Value {
    let xml = encoder.encode(value, &po(element)).unwrap();
    parser.parse_str(&xml).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_quantity_round_trip(n in any::<i32>()) {
        let encoder = encoder_for(po_configuration());
        let parser = parser_for(po_configuration());
        let value = Value::Integer(i64::from(n));
        prop_assert_eq!(round_trip(&encoder, &parser, &value, "quantity"), value);
    }

    #[test]
    fn test_label_round_trip(text in "[a-zA-Z0-9]{1,20}") {
        let encoder = encoder_for(po_configuration());
        let parser = parser_for(po_configuration());
        let value = Value::String(text);
        prop_assert_eq!(round_trip(&encoder, &parser, &value, "label"), value);
    }

    #[test]
    fn test_day_round_trip(year in 1000i32..=9999, ordinal in 1u32..=365) {
        let encoder = encoder_for(po_configuration());
        let parser = parser_for(po_configuration());
        let date = NaiveDate::from_yo_opt(year, ordinal).unwrap();
        let value = Value::Date(date);
        prop_assert_eq!(round_trip(&encoder, &parser, &value, "day"), value);
    }
}

// ============================================================================
// Mixed content
// ============================================================================

fn element(name: &str) -> Node {
    let decl = Arc::new(ElementDecl::new(QName::local(name)));
    Node::element(Arc::new(InstanceComponent {
        name: QName::local(name),
        declaration: Declaration::Element(decl),
        type_definition: Arc::new(TypeDefinition::complex(None, None)),
        text: String::new(),
        namespaces: Arc::new(NamespaceContext::new()),
    }))
}

fn shape(children: &[Node]) -> Vec<String> {
    children
        .iter()
        .map(|c| match c.as_text() {
            Some(text) => format!("text:{:?}", text),
            None => format!("<{}>", c.name.local_name),
        })
        .collect()
}

fn mixed_child() -> impl Strategy<Value = Node> {
    prop_oneof![
        Just(Node::text(" ")),
        Just(Node::text("\n\t")),
        "[a-z ]{1,6}".prop_map(Node::text),
        "[a-z]{1,4}".prop_map(|name| element(&name)),
    ]
}

proptest! {
    #[test]
    fn test_normalize_mixed_is_idempotent(mut children in prop::collection::vec(mixed_child(), 0..12)) {
        normalize_mixed(&mut children);
        let once = shape(&children);
        normalize_mixed(&mut children);
        prop_assert_eq!(shape(&children), once);
    }

    #[test]
    fn test_normalize_mixed_keeps_elements(mut children in prop::collection::vec(mixed_child(), 0..12)) {
        let elements = children.iter().filter(|c| c.as_text().is_none()).count();
        normalize_mixed(&mut children);
        prop_assert_eq!(children.iter().filter(|c| c.as_text().is_none()).count(), elements);
    }
}
