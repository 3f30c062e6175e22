//! Type hierarchy walking
//!
//! Walks a type definition up through its base types, most derived first,
//! and computes the key under which bindings for a type are registered.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::builtins::any_type_name;
use super::components::{TypeDefinition, TypeRef};
use super::index::SchemaIndex;
use crate::namespaces::QName;

/// Walks the base type chain of a type definition
pub struct TypeWalker<'a> {
    index: &'a SchemaIndex,
}

impl<'a> TypeWalker<'a> {
    /// Create a walker resolving base types through `index`
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self { index }
    }

    /// Visit `start`, then its base type, then that type's base and so on
    ///
    /// The visitor returns `false` to stop the walk. Each type is visited at
    /// most once. An anonymous complex type deriving from a simple type is
    /// followed directly by xs:anyType instead of its simple base.
    pub fn walk<F>(&self, start: &Arc<TypeDefinition>, mut visitor: F)
    where
        F: FnMut(&Arc<TypeDefinition>) -> bool,
    {
        let mut seen = HashSet::new();
        let mut current = Some(Arc::clone(start));

        while let Some(def) = current {
            if !seen.insert(def.id) {
                debug!(type_name = %def.display_name(), "cycle in type hierarchy");
                return;
            }
            if !visitor(&def) {
                return;
            }
            current = self.next_type(&def);
        }
    }

    /// The types `walk` would visit, in order
    pub fn ancestry(&self, start: &Arc<TypeDefinition>) -> Vec<Arc<TypeDefinition>> {
        let mut types = Vec::new();
        self.walk(start, |def| {
            types.push(Arc::clone(def));
            true
        });
        types
    }

    fn next_type(&self, def: &TypeDefinition) -> Option<Arc<TypeDefinition>> {
        let base = self.index.base_type(def)?;
        if def.is_anonymous() && def.is_complex() && base.is_simple() {
            return self.index.type_definition(&any_type_name());
        }
        Some(base)
    }

    /// Key under which bindings for `def` are registered
    ///
    /// Named types use their own name. An anonymous type owned by a global
    /// element or attribute `e` uses `{ns}_e`. Otherwise `container` (the
    /// type whose content declares the owner) provides `{ns}container_owner`,
    /// where an anonymous container contributes its own owner's local name.
    /// The last form can collide between unrelated schemas reusing short
    /// names; existing bindings rely on the exact format, so it is kept.
    pub fn binding_key(&self, def: &TypeDefinition, container: Option<&TypeDefinition>) -> Option<QName> {
        if let Some(ref name) = def.name {
            return Some(name.clone());
        }

        let owner = def.owner.as_ref()?;
        if self.is_global_owner(def, owner) {
            return Some(QName::new(owner.namespace.clone(), format!("_{}", owner.local_name)));
        }

        let container = container?;
        let container_name = match (&container.name, &container.owner) {
            (Some(name), _) => name.local_name.clone(),
            (None, Some(owner)) => owner.local_name.clone(),
            (None, None) => return None,
        };
        let namespace = def
            .target_namespace
            .clone()
            .or_else(|| container.target_namespace.clone());
        Some(QName::new(namespace, format!("{}_{}", container_name, owner.local_name)))
    }

    fn is_global_owner(&self, def: &TypeDefinition, owner: &QName) -> bool {
        let owns = |type_ref: Option<&TypeRef>| {
            matches!(type_ref, Some(TypeRef::Anonymous(anon)) if anon.id == def.id)
        };
        if let Some(element) = self.index.element_declaration(owner) {
            if owns(element.type_ref.as_ref()) {
                return true;
            }
        }
        if let Some(attribute) = self.index.attribute_declaration(owner) {
            if owns(attribute.type_ref.as_ref()) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtins::{xs, XSD_DECIMAL, XSD_INT, XSD_INTEGER, XSD_LONG};
    use crate::schema::components::{ElementDecl, Scope};
    use crate::schema::document::SchemaDocument;

    fn names(types: &[Arc<TypeDefinition>]) -> Vec<String> {
        types
            .iter()
            .map(|t| t.name.as_ref().map(|n| n.local_name.clone()).unwrap_or_else(|| "?".into()))
            .collect()
    }

    #[test]
    fn test_walk_most_derived_first() {
        let index = SchemaIndex::default();
        let int = index.type_definition(&xs(XSD_INT)).unwrap();
        let walker = TypeWalker::new(&index);
        assert_eq!(
            names(&walker.ancestry(&int)),
            vec![XSD_INT, XSD_LONG, XSD_INTEGER, XSD_DECIMAL, "anySimpleType", "anyType"]
        );
    }

    #[test]
    fn test_visitor_stops_walk() {
        let index = SchemaIndex::default();
        let int = index.type_definition(&xs(XSD_INT)).unwrap();
        let mut visited = 0;
        TypeWalker::new(&index).walk(&int, |_| {
            visited += 1;
            visited < 2
        });
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_anonymous_simple_content_jumps_to_any_type() {
        let index = SchemaIndex::default();
        let anon = Arc::new(
            TypeDefinition::complex(None, Some(TypeRef::Named(xs(XSD_INT)))).with_simple_content(true),
        );
        assert_eq!(names(&TypeWalker::new(&index).ancestry(&anon)), vec!["?", "anyType"]);
    }

    #[test]
    fn test_anonymous_binding_keys() {
        let doc = Arc::new(SchemaDocument::new(Some("urn:t".into())));
        let global = ElementDecl::new(QName::namespaced("urn:t", "order"))
            .with_anonymous_type(TypeDefinition::complex(None, None).with_target_namespace(Some("urn:t".into())));
        let Some(TypeRef::Anonymous(order_type)) = global.type_ref.clone() else {
            panic!("expected anonymous type");
        };
        doc.add_element(Arc::new(global));

        let local = ElementDecl::new(QName::namespaced("urn:t", "line"))
            .with_scope(Scope::Local)
            .with_anonymous_type(TypeDefinition::complex(None, None).with_target_namespace(Some("urn:t".into())));
        let Some(TypeRef::Anonymous(line_type)) = local.type_ref.clone() else {
            panic!("expected anonymous type");
        };

        let index = SchemaIndex::new(vec![doc]);
        let walker = TypeWalker::new(&index);

        assert_eq!(
            walker.binding_key(&order_type, None),
            Some(QName::namespaced("urn:t", "_order"))
        );
        assert_eq!(walker.binding_key(&line_type, None), None);
        // Anonymous container contributes its owner's name
        assert_eq!(
            walker.binding_key(&line_type, Some(&order_type)),
            Some(QName::namespaced("urn:t", "order_line"))
        );

        let named = TypeDefinition::complex(Some(QName::namespaced("urn:t", "T")), None);
        assert_eq!(
            walker.binding_key(&line_type, Some(&named)),
            Some(QName::namespaced("urn:t", "T_line"))
        );
    }
}
