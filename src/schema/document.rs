//! Schema documents
//!
//! A [`SchemaDocument`] owns the global declarations of one XSD document.
//! Declarations may be added or removed after loading; every change bumps a
//! per-category generation counter which the schema index compares against
//! to throw away stale lookup tables.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use super::components::{
    AttributeDecl, AttributeGroup, ComponentId, ElementDecl, GroupDefinition, TypeDefinition,
};
use crate::locations::Location;
use crate::namespaces::QName;

/// Declaration categories tracked for change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Global element declarations
    Element,
    /// Global attribute declarations
    Attribute,
    /// Attribute group definitions
    AttributeGroup,
    /// Named complex types
    ComplexType,
    /// Named simple types
    SimpleType,
    /// Named model groups
    ModelGroup,
}

impl Category {
    /// Every category
    pub const ALL: [Category; 6] = [
        Category::Element,
        Category::Attribute,
        Category::AttributeGroup,
        Category::ComplexType,
        Category::SimpleType,
        Category::ModelGroup,
    ];

    fn index(self) -> usize {
        match self {
            Category::Element => 0,
            Category::Attribute => 1,
            Category::AttributeGroup => 2,
            Category::ComplexType => 3,
            Category::SimpleType => 4,
            Category::ModelGroup => 5,
        }
    }
}

/// `xs:import` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaImport {
    /// Imported namespace
    pub namespace: Option<String>,
    /// Location hint
    pub location: Option<String>,
}

#[derive(Debug, Default)]
struct Declarations {
    elements: IndexMap<QName, Arc<ElementDecl>>,
    attributes: IndexMap<QName, Arc<AttributeDecl>>,
    attribute_groups: IndexMap<QName, Arc<AttributeGroup>>,
    types: IndexMap<QName, Arc<TypeDefinition>>,
    groups: IndexMap<QName, Arc<GroupDefinition>>,
}

/// Global declarations of one schema document
#[derive(Debug)]
pub struct SchemaDocument {
    /// Document identity
    pub id: ComponentId,
    /// Target namespace
    pub target_namespace: Option<String>,
    /// Where the document was loaded from
    pub location: Option<Location>,
    /// Imports declared by the document
    pub imports: Vec<SchemaImport>,
    /// Include locations declared by the document
    pub includes: Vec<String>,
    declarations: RwLock<Declarations>,
    generations: [AtomicU64; 6],
}

impl SchemaDocument {
    /// Create an empty schema document
    pub fn new(target_namespace: Option<String>) -> Self {
        Self {
            id: ComponentId::next(),
            target_namespace,
            location: None,
            imports: Vec::new(),
            includes: Vec::new(),
            declarations: RwLock::new(Declarations::default()),
            generations: Default::default(),
        }
    }

    /// Set the source location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Declarations> {
        self.declarations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Declarations> {
        self.declarations.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn changed(&self, category: Category) {
        self.generations[category.index()].fetch_add(1, Ordering::AcqRel);
    }

    /// Current generation of a category
    pub fn generation(&self, category: Category) -> u64 {
        self.generations[category.index()].load(Ordering::Acquire)
    }

    /// Sum of all category generations
    pub fn total_generation(&self) -> u64 {
        Category::ALL.iter().map(|c| self.generation(*c)).sum()
    }

    // ========== Registration ==========

    /// Add (or replace) a global element
    pub fn add_element(&self, element: Arc<ElementDecl>) {
        self.write().elements.insert(element.name.clone(), element);
        self.changed(Category::Element);
    }

    /// Add (or replace) a global attribute
    pub fn add_attribute(&self, attribute: Arc<AttributeDecl>) {
        self.write().attributes.insert(attribute.name.clone(), attribute);
        self.changed(Category::Attribute);
    }

    /// Add (or replace) an attribute group
    pub fn add_attribute_group(&self, group: Arc<AttributeGroup>) {
        self.write().attribute_groups.insert(group.name.clone(), group);
        self.changed(Category::AttributeGroup);
    }

    /// Add (or replace) a named type; anonymous types are ignored
    pub fn add_type(&self, def: Arc<TypeDefinition>) {
        let Some(name) = def.name.clone() else {
            return;
        };
        let category = type_category(&def);
        self.write().types.insert(name, def);
        self.changed(category);
    }

    /// Add (or replace) a named model group
    pub fn add_group(&self, group: Arc<GroupDefinition>) {
        self.write().groups.insert(group.name.clone(), group);
        self.changed(Category::ModelGroup);
    }

    /// Remove a global element
    pub fn remove_element(&self, name: &QName) -> Option<Arc<ElementDecl>> {
        let removed = self.write().elements.shift_remove(name);
        if removed.is_some() {
            self.changed(Category::Element);
        }
        removed
    }

    /// Remove a global attribute
    pub fn remove_attribute(&self, name: &QName) -> Option<Arc<AttributeDecl>> {
        let removed = self.write().attributes.shift_remove(name);
        if removed.is_some() {
            self.changed(Category::Attribute);
        }
        removed
    }

    /// Remove a named type
    pub fn remove_type(&self, name: &QName) -> Option<Arc<TypeDefinition>> {
        let removed = self.write().types.shift_remove(name);
        if let Some(ref def) = removed {
            self.changed(type_category(def));
        }
        removed
    }

    /// Copy every declaration of another document into this one
    pub fn merge(&self, other: &SchemaDocument) {
        for e in other.elements() {
            self.add_element(e);
        }
        for a in other.attributes() {
            self.add_attribute(a);
        }
        for g in other.attribute_groups() {
            self.add_attribute_group(g);
        }
        for t in other.types() {
            self.add_type(t);
        }
        for g in other.groups() {
            self.add_group(g);
        }
    }

    // ========== Lookups ==========

    /// Look up a global element
    pub fn element(&self, name: &QName) -> Option<Arc<ElementDecl>> {
        self.read().elements.get(name).cloned()
    }

    /// Look up a named type
    pub fn type_definition(&self, name: &QName) -> Option<Arc<TypeDefinition>> {
        self.read().types.get(name).cloned()
    }

    /// Snapshot of the global elements in declaration order
    pub fn elements(&self) -> Vec<Arc<ElementDecl>> {
        self.read().elements.values().cloned().collect()
    }

    /// Snapshot of the global attributes
    pub fn attributes(&self) -> Vec<Arc<AttributeDecl>> {
        self.read().attributes.values().cloned().collect()
    }

    /// Snapshot of the attribute groups
    pub fn attribute_groups(&self) -> Vec<Arc<AttributeGroup>> {
        self.read().attribute_groups.values().cloned().collect()
    }

    /// Snapshot of the named types
    pub fn types(&self) -> Vec<Arc<TypeDefinition>> {
        self.read().types.values().cloned().collect()
    }

    /// Snapshot of the named model groups
    pub fn groups(&self) -> Vec<Arc<GroupDefinition>> {
        self.read().groups.values().cloned().collect()
    }

    /// Number of global elements
    pub fn element_count(&self) -> usize {
        self.read().elements.len()
    }

    /// Number of named types
    pub fn type_count(&self) -> usize {
        self.read().types.len()
    }
}

fn type_category(def: &TypeDefinition) -> Category {
    if def.is_complex() {
        Category::ComplexType
    } else {
        Category::SimpleType
    }
}
