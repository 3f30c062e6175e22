//! Binding chain resolution properties

mod common;

use std::sync::Arc;

use common::{parser_for, po, po_configuration, po_schema, CallLog, Tracer};
use pretty_assertions::assert_eq;
use xmlbind::schema::{xs, Declaration, ElementDecl, SchemaDocument};
use xmlbind::{ExecutionMode, QName, SchemaIndex, Value};

fn quantity_declaration(parser: &xmlbind::Parser) -> Declaration {
    let element = parser.index().element_declaration(&po("quantity")).unwrap();
    Declaration::Element(element)
}

// ============================================================================
// Chain determinism
// ============================================================================

#[test]
fn test_chain_is_stable_across_cache_eviction() {
    let parser = parser_for(po_configuration());
    let declaration = quantity_declaration(&parser);
    let walker = parser.walker();

    let first = walker.resolve(&declaration, None, parser.context()).unwrap();
    let again = walker.resolve(&declaration, None, parser.context()).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    walker.clear_cache();
    let recomputed = walker.resolve(&declaration, None, parser.context()).unwrap();
    assert_eq!(first.keys(), recomputed.keys());
    assert_eq!(
        recomputed.keys(),
        vec![
            xs("int"),
            xs("long"),
            xs("integer"),
            xs("decimal"),
            xs("anySimpleType"),
            xs("anyType"),
        ]
    );
}

#[test]
fn test_schema_mutation_invalidates_chains() {
    let schema = po_schema();
    let parser = parser_for(xmlbind::Configuration::new("urn:po").with_schema(Arc::clone(&schema)));
    let declaration = quantity_declaration(&parser);
    let before = parser.walker().resolve(&declaration, None, parser.context()).unwrap();

    schema.add_element(Arc::new(ElementDecl::new(po("late")).with_type_name(xs("string"))));
    assert!(parser.index().element_declaration(&po("late")).is_some());

    let after = parser.walker().resolve(&declaration, None, parser.context()).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before.keys(), after.keys());
}

// ============================================================================
// Execution modes
// ============================================================================

#[test]
fn test_override_in_hierarchy_wins_absolutely() {
    let log = CallLog::new();
    let config = po_configuration()
        .with_binding(Tracer::binding(po("Quantity"), "quantity", ExecutionMode::Default, &log))
        .with_binding(Tracer::binding(xs("integer"), "integer", ExecutionMode::Override, &log));
    let parser = parser_for(config);

    let declaration = quantity_declaration(&parser);
    let chain = parser.walker().resolve(&declaration, None, parser.context()).unwrap();
    assert_eq!(chain.keys(), vec![xs("integer")]);

    let value = parser.parse_str(r#"<quantity xmlns="urn:po">7</quantity>"#).unwrap();
    assert_eq!(log.entries(), vec!["integer"]);
    assert_eq!(value, Value::String("7".into()));
}

#[test]
fn test_override_under_element_name() {
    let log = CallLog::new();
    let config = po_configuration().with_binding(Tracer::binding(po("quantity"), "own", ExecutionMode::Override, &log));
    let parser = parser_for(config);

    let chain = parser
        .walker()
        .resolve(&quantity_declaration(&parser), None, parser.context())
        .unwrap();
    assert_eq!(chain.keys(), vec![po("quantity")]);
}

#[test]
fn test_element_name_binding_runs_first() {
    let log = CallLog::new();
    let config = po_configuration()
        .with_binding(Tracer::binding(po("Quantity"), "type", ExecutionMode::Default, &log))
        .with_binding(Tracer::binding(po("quantity"), "element", ExecutionMode::Default, &log));
    let parser = parser_for(config);

    parser.parse_str(r#"<quantity xmlns="urn:po">3</quantity>"#).unwrap();
    assert_eq!(log.entries(), vec!["element", "type"]);
}

#[test]
fn test_after_bindings_run_after_derived_ones() {
    let log = CallLog::new();
    let config = po_configuration()
        .with_binding(Tracer::binding(po("Quantity"), "derived", ExecutionMode::Default, &log))
        .with_binding(Tracer::binding(xs("integer"), "base-after", ExecutionMode::After, &log))
        .with_binding(Tracer::binding(xs("decimal"), "root-after", ExecutionMode::After, &log));
    let parser = parser_for(config);

    let value = parser.parse_str(r#"<quantity xmlns="urn:po"> 12 </quantity>"#).unwrap();
    assert_eq!(log.entries(), vec!["derived", "root-after", "base-after"]);
    assert_eq!(value, Value::Integer(12));
}

// ============================================================================
// Wildcard lookups
// ============================================================================

fn document_with(namespace: &str, names: &[&str]) -> Arc<SchemaDocument> {
    let doc = SchemaDocument::new(Some(namespace.to_string()));
    for name in names {
        doc.add_element(Arc::new(
            ElementDecl::new(QName::namespaced(namespace, *name)).with_type_name(xs("string")),
        ));
    }
    Arc::new(doc)
}

#[test]
fn test_wildcard_lookup_refuses_ambiguity() {
    let index = SchemaIndex::new(vec![
        document_with("urn:a", &["shared", "solo"]),
        document_with("urn:b", &["shared"]),
    ]);

    let solo = index.element_declaration(&QName::wildcard("solo")).unwrap();
    assert_eq!(solo.name, QName::namespaced("urn:a", "solo"));
    assert!(index.element_declaration(&QName::wildcard("shared")).is_none());
    assert!(index.element_declaration(&QName::namespaced("urn:b", "shared")).is_some());
}
