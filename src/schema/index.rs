//! Schema index
//!
//! Flattens a set of schema documents (plus the built-in `xs:` types) into
//! name lookup tables. Tables are built lazily, one per declaration
//! category, and rebuilt when the generation of that category changes.
//! Per-element child and attribute tables are memoized in bounded LRU
//! caches keyed by component identity.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use indexmap::IndexMap;
use lru::LruCache;
use tracing::{debug, trace};

use super::builtins::{any_type_name, builtin_schema, xs, XSD_ANY_SIMPLE_TYPE};
use super::components::{
    AttributeDecl, AttributeGroup, AttributeUse, ComponentId, Derivation, ElementDecl,
    GroupDefinition, ModelGroup, Occurs, Particle, Term, TypeDefinition, TypeRef,
};
use super::document::{Category, SchemaDocument};
use crate::namespaces::QName;

/// Default capacity of the child and attribute table caches
pub const DEFAULT_TABLE_CACHE_CAPACITY: usize = 256;

/// Nesting bound when expanding model groups and attribute groups
const MAX_GROUP_NESTING: usize = 64;

/// A child element reachable from an element's content model
#[derive(Debug, Clone)]
pub struct ChildParticle {
    /// Declaration of the child, with references resolved to their target
    pub element: Arc<ElementDecl>,
    /// Effective occurrence bounds, including enclosing groups
    pub occurs: Occurs,
}

/// Ordered child element table of one element
pub type ChildTable = IndexMap<QName, ChildParticle>;

/// A global declaration returned by [`SchemaIndex::declaration`]
#[derive(Debug, Clone)]
pub enum IndexedComponent {
    /// Global element
    Element(Arc<ElementDecl>),
    /// Global attribute
    Attribute(Arc<AttributeDecl>),
    /// Attribute group
    AttributeGroup(Arc<AttributeGroup>),
    /// Named complex or simple type
    Type(Arc<TypeDefinition>),
    /// Named model group
    ModelGroup(Arc<GroupDefinition>),
}

struct Table<T> {
    generation: u64,
    entries: IndexMap<QName, Arc<T>>,
}

/// A name table rebuilt on generation change
///
/// Population is double-checked: readers share the read lock, and only the
/// first reader that sees a stale generation takes the write lock to rebuild.
struct LazyTable<T> {
    slot: RwLock<Option<Arc<Table<T>>>>,
}

impl<T> LazyTable<T> {
    fn new() -> Self {
        Self { slot: RwLock::new(None) }
    }

    fn get(&self, generation: u64, build: impl FnOnce() -> IndexMap<QName, Arc<T>>) -> Arc<Table<T>> {
        {
            let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(table) = slot.as_ref() {
                if table.generation == generation {
                    return Arc::clone(table);
                }
            }
        }

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = slot.as_ref() {
            if table.generation == generation {
                return Arc::clone(table);
            }
        }
        let table = Arc::new(Table {
            generation,
            entries: build(),
        });
        *slot = Some(Arc::clone(&table));
        table
    }
}

/// Look up a name, matching on local name only for wildcard queries
fn lookup<T>(entries: &IndexMap<QName, Arc<T>>, name: &QName) -> Option<Arc<T>> {
    if !name.is_wildcard() {
        return entries.get(name).cloned();
    }

    let mut candidates = entries
        .iter()
        .filter(|(key, _)| key.local_name == name.local_name)
        .map(|(_, value)| value);
    let first = candidates.next()?;
    if candidates.next().is_some() {
        debug!(local_name = %name.local_name, "ambiguous wildcard lookup");
        return None;
    }
    Some(Arc::clone(first))
}

type CachedTable<T> = (u64, Arc<T>);

fn find_child(table: &ChildTable, name: &QName) -> Option<ChildParticle> {
    if !name.is_wildcard() {
        return table.get(name).cloned();
    }
    let mut candidates = table.values().filter(|c| c.element.name.local_name == name.local_name);
    let first = candidates.next()?;
    if candidates.next().is_some() {
        return None;
    }
    Some(first.clone())
}

/// Lookup tables over a set of schema documents
pub struct SchemaIndex {
    documents: RwLock<Vec<Arc<SchemaDocument>>>,
    epoch: AtomicU64,
    elements: LazyTable<ElementDecl>,
    attributes: LazyTable<AttributeDecl>,
    attribute_groups: LazyTable<AttributeGroup>,
    complex_types: LazyTable<TypeDefinition>,
    simple_types: LazyTable<TypeDefinition>,
    groups: LazyTable<GroupDefinition>,
    child_tables: Mutex<LruCache<ComponentId, CachedTable<ChildTable>>>,
    attribute_tables: Mutex<LruCache<ComponentId, CachedTable<Vec<Arc<AttributeDecl>>>>>,
}

impl std::fmt::Debug for SchemaIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaIndex")
            .field("documents", &self.documents().len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl Default for SchemaIndex {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SchemaIndex {
    /// Create an index over the given documents
    pub fn new(documents: Vec<Arc<SchemaDocument>>) -> Self {
        Self::with_cache_capacity(documents, DEFAULT_TABLE_CACHE_CAPACITY)
    }

    /// Create an index with a custom child/attribute table cache capacity
    pub fn with_cache_capacity(documents: Vec<Arc<SchemaDocument>>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let mut all = vec![builtin_schema()];
        all.extend(documents);
        Self {
            documents: RwLock::new(all),
            epoch: AtomicU64::new(0),
            elements: LazyTable::new(),
            attributes: LazyTable::new(),
            attribute_groups: LazyTable::new(),
            complex_types: LazyTable::new(),
            simple_types: LazyTable::new(),
            groups: LazyTable::new(),
            child_tables: Mutex::new(LruCache::new(capacity)),
            attribute_tables: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Add a schema document to the index
    pub fn add_document(&self, document: Arc<SchemaDocument>) {
        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        if docs.iter().any(|d| d.id == document.id) {
            return;
        }
        debug!(namespace = ?document.target_namespace, "adding schema document to index");
        docs.push(document);
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Snapshot of the indexed documents, built-ins first
    pub fn documents(&self) -> Vec<Arc<SchemaDocument>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Generation of one category across all documents
    ///
    /// Every counter only grows, so the sum changes on any change.
    pub fn category_generation(&self, category: Category) -> u64 {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        self.epoch.load(Ordering::Acquire) + docs.iter().map(|d| d.generation(category)).sum::<u64>()
    }

    /// Generation across all categories and documents
    pub fn generation(&self) -> u64 {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        self.epoch.load(Ordering::Acquire) + docs.iter().map(|d| d.total_generation()).sum::<u64>()
    }

    fn collect<T>(&self, items: impl Fn(&SchemaDocument) -> Vec<Arc<T>>, name: impl Fn(&T) -> QName) -> IndexMap<QName, Arc<T>> {
        let mut entries = IndexMap::new();
        for doc in self.documents() {
            for item in items(&doc) {
                entries.insert(name(&item), item);
            }
        }
        entries
    }

    // ========== Declaration Lookups ==========

    /// Look up a global declaration of the given category
    pub fn declaration(&self, category: Category, name: &QName) -> Option<IndexedComponent> {
        match category {
            Category::Element => self.element_declaration(name).map(IndexedComponent::Element),
            Category::Attribute => self.attribute_declaration(name).map(IndexedComponent::Attribute),
            Category::AttributeGroup => self.attribute_group(name).map(IndexedComponent::AttributeGroup),
            Category::ComplexType => self.complex_type(name).map(IndexedComponent::Type),
            Category::SimpleType => self.simple_type(name).map(IndexedComponent::Type),
            Category::ModelGroup => self.model_group(name).map(IndexedComponent::ModelGroup),
        }
    }

    /// Look up a global element
    pub fn element_declaration(&self, name: &QName) -> Option<Arc<ElementDecl>> {
        let table = self.elements.get(self.category_generation(Category::Element), || {
            trace!("building element table");
            self.collect(|d| d.elements(), |e| e.name.clone())
        });
        lookup(&table.entries, name)
    }

    /// Look up a global attribute
    pub fn attribute_declaration(&self, name: &QName) -> Option<Arc<AttributeDecl>> {
        let table = self.attributes.get(self.category_generation(Category::Attribute), || {
            self.collect(|d| d.attributes(), |a| a.name.clone())
        });
        lookup(&table.entries, name)
    }

    /// Look up an attribute group
    pub fn attribute_group(&self, name: &QName) -> Option<Arc<AttributeGroup>> {
        let table = self.attribute_groups.get(self.category_generation(Category::AttributeGroup), || {
            self.collect(|d| d.attribute_groups(), |g| g.name.clone())
        });
        lookup(&table.entries, name)
    }

    /// Look up a named complex type
    pub fn complex_type(&self, name: &QName) -> Option<Arc<TypeDefinition>> {
        let table = self.complex_types.get(self.category_generation(Category::ComplexType), || {
            self.collect(
                |d| d.types().into_iter().filter(|t| t.is_complex()).collect(),
                |t| t.name.clone().unwrap_or_else(|| QName::local("")),
            )
        });
        lookup(&table.entries, name)
    }

    /// Look up a named simple type
    pub fn simple_type(&self, name: &QName) -> Option<Arc<TypeDefinition>> {
        let table = self.simple_types.get(self.category_generation(Category::SimpleType), || {
            self.collect(
                |d| d.types().into_iter().filter(|t| t.is_simple()).collect(),
                |t| t.name.clone().unwrap_or_else(|| QName::local("")),
            )
        });
        lookup(&table.entries, name)
    }

    /// Look up a named type, complex types first
    pub fn type_definition(&self, name: &QName) -> Option<Arc<TypeDefinition>> {
        self.complex_type(name).or_else(|| self.simple_type(name))
    }

    /// Look up a named model group
    pub fn model_group(&self, name: &QName) -> Option<Arc<GroupDefinition>> {
        let table = self.groups.get(self.category_generation(Category::ModelGroup), || {
            self.collect(|d| d.groups(), |g| g.name.clone())
        });
        lookup(&table.entries, name)
    }

    /// Every global element, in document order
    pub fn global_elements(&self) -> Vec<Arc<ElementDecl>> {
        let table = self.elements.get(self.category_generation(Category::Element), || {
            self.collect(|d| d.elements(), |e| e.name.clone())
        });
        table.entries.values().cloned().collect()
    }

    /// Global elements that may substitute for `head`, transitively
    pub fn substitutes(&self, head: &QName) -> Vec<Arc<ElementDecl>> {
        let all = self.global_elements();
        let mut heads = vec![head.clone()];
        let mut seen = HashSet::new();
        let mut members = Vec::new();

        while let Some(current) = heads.pop() {
            for element in &all {
                if element.substitution_group.as_ref() == Some(&current) && seen.insert(element.id) {
                    heads.push(element.name.clone());
                    members.push(Arc::clone(element));
                }
            }
        }
        members
    }

    // ========== Type Resolution ==========

    /// Resolve an element reference to the global declaration it names
    pub fn resolve_element(&self, decl: &Arc<ElementDecl>) -> Option<Arc<ElementDecl>> {
        match decl.reference {
            Some(ref target) => self.element_declaration(target),
            None => Some(Arc::clone(decl)),
        }
    }

    /// Resolve an attribute reference to the global declaration it names
    pub fn resolve_attribute(&self, decl: &Arc<AttributeDecl>) -> Option<Arc<AttributeDecl>> {
        match decl.reference {
            Some(ref target) => self.attribute_declaration(target),
            None => Some(Arc::clone(decl)),
        }
    }

    /// Resolve a type reference
    pub fn resolve_type(&self, type_ref: &TypeRef) -> Option<Arc<TypeDefinition>> {
        match type_ref {
            TypeRef::Named(name) => {
                let found = self.type_definition(name);
                if found.is_none() {
                    debug!(type_name = %name, "type not found in schema index");
                }
                found
            }
            TypeRef::Anonymous(def) => Some(Arc::clone(def)),
        }
    }

    /// Type of an element; untyped elements take the type of their
    /// substitution group head, or xs:anyType
    pub fn element_type(&self, decl: &ElementDecl) -> Option<Arc<TypeDefinition>> {
        let mut current = match decl.reference {
            Some(ref target) => self.element_declaration(target)?,
            None => Arc::new(decl.clone()),
        };

        let mut depth = 0;
        loop {
            if let Some(ref type_ref) = current.type_ref {
                return self.resolve_type(type_ref);
            }
            match current.substitution_group {
                Some(ref head) if depth < MAX_GROUP_NESTING => {
                    current = self.element_declaration(head)?;
                    depth += 1;
                }
                _ => return self.type_definition(&any_type_name()),
            }
        }
    }

    /// Type of an attribute; untyped attributes are xs:anySimpleType
    pub fn attribute_type(&self, decl: &AttributeDecl) -> Option<Arc<TypeDefinition>> {
        let type_ref = match decl.reference {
            Some(ref target) => self.attribute_declaration(target)?.type_ref.clone(),
            None => decl.type_ref.clone(),
        };
        match type_ref {
            Some(ref type_ref) => self.resolve_type(type_ref),
            None => self.type_definition(&xs(XSD_ANY_SIMPLE_TYPE)),
        }
    }

    /// Base type of a type definition
    pub fn base_type(&self, def: &TypeDefinition) -> Option<Arc<TypeDefinition>> {
        def.base.as_ref().and_then(|base| self.resolve_type(base))
    }

    // ========== Child Tables ==========

    /// Ordered child element table of an element's declared type
    pub fn child_components(&self, element: &ElementDecl) -> Arc<ChildTable> {
        match self.element_type(element) {
            Some(def) => self.type_children(&def),
            None => Arc::new(ChildTable::new()),
        }
    }

    /// Ordered child element table of a type
    ///
    /// Extension types list their base type's children first.
    pub fn type_children(&self, def: &TypeDefinition) -> Arc<ChildTable> {
        let generation = self.generation();
        {
            let mut cache = self.child_tables.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((cached_generation, table)) = cache.get(&def.id) {
                if *cached_generation == generation {
                    return Arc::clone(table);
                }
            }
        }

        let mut table = ChildTable::new();
        self.collect_type_children(def, &mut table, 0);
        let table = Arc::new(table);
        trace!(type_name = %def.display_name(), children = table.len(), "built child table");

        let mut cache = self.child_tables.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(def.id, (generation, Arc::clone(&table)));
        table
    }

    /// Look up one child of an element by name (wildcard namespaces allowed)
    pub fn child_element(&self, parent: &ElementDecl, name: &QName) -> Option<ChildParticle> {
        let table = self.child_components(parent);
        find_child(&table, name)
    }

    /// Look up one child of a type by name (wildcard namespaces allowed)
    pub fn type_child(&self, def: &TypeDefinition, name: &QName) -> Option<ChildParticle> {
        let table = self.type_children(def);
        find_child(&table, name)
    }

    fn collect_type_children(&self, def: &TypeDefinition, table: &mut ChildTable, depth: usize) {
        if depth > MAX_GROUP_NESTING {
            return;
        }
        let Some(info) = def.as_complex() else {
            return;
        };

        if def.derivation == Derivation::Extension {
            if let Some(base) = self.base_type(def) {
                self.collect_type_children(&base, table, depth + 1);
            }
        }

        if let Some(ref particle) = info.content {
            self.collect_particle(particle, Occurs::once(), table, 0);
        }
    }

    fn collect_particle(&self, particle: &Particle, outer: Occurs, table: &mut ChildTable, depth: usize) {
        if depth > MAX_GROUP_NESTING {
            debug!("model group nesting too deep, truncating child table");
            return;
        }
        let occurs = particle.occurs.nested_in(outer);

        match particle.term {
            Term::Element(ref decl) => {
                let Some(element) = self.resolve_element(decl) else {
                    debug!(reference = %decl.name, "unresolved element reference");
                    return;
                };
                match table.get_mut(&element.name) {
                    // Repeated declarations make the name repeatable
                    Some(existing) => existing.occurs = Occurs::new(existing.occurs.min, None),
                    None => {
                        table.insert(element.name.clone(), ChildParticle { element, occurs });
                    }
                }
            }
            Term::Group(ref group) => self.collect_group(group, occurs, table, depth + 1),
            Term::GroupRef(ref name) => match self.model_group(name) {
                Some(def) => self.collect_group(&def.group, occurs, table, depth + 1),
                None => debug!(group = %name, "unresolved model group reference"),
            },
            Term::Any => {}
        }
    }

    fn collect_group(&self, group: &ModelGroup, occurs: Occurs, table: &mut ChildTable, depth: usize) {
        for particle in &group.particles {
            self.collect_particle(particle, occurs, table, depth);
        }
    }

    // ========== Attribute Tables ==========

    /// Attribute uses of an element's declared type
    pub fn attributes(&self, element: &ElementDecl) -> Arc<Vec<Arc<AttributeDecl>>> {
        match self.element_type(element) {
            Some(def) => self.type_attributes(&def),
            None => Arc::new(Vec::new()),
        }
    }

    /// Attribute uses of a type, base type attributes first
    ///
    /// References are resolved to the global declaration, prohibited uses
    /// are removed, and a derived declaration replaces a base one of the
    /// same name in place.
    pub fn type_attributes(&self, def: &TypeDefinition) -> Arc<Vec<Arc<AttributeDecl>>> {
        let generation = self.generation();
        {
            let mut cache = self.attribute_tables.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((cached_generation, table)) = cache.get(&def.id) {
                if *cached_generation == generation {
                    return Arc::clone(table);
                }
            }
        }

        let mut bases = Vec::new();
        let mut seen = HashSet::from([def.id]);
        let mut current = self.base_type(def);
        while let Some(base) = current {
            if !seen.insert(base.id) {
                break;
            }
            current = self.base_type(&base);
            bases.push(base);
        }

        let mut uses: IndexMap<QName, Option<Arc<AttributeDecl>>> = IndexMap::new();
        for owner in bases.iter().rev().map(Arc::as_ref).chain(std::iter::once(def)) {
            let Some(info) = owner.as_complex() else {
                continue;
            };
            let mut local = Vec::new();
            self.collect_attribute_uses(&info.attributes, &info.attribute_groups, &mut local, 0);
            for decl in local {
                let resolved = if decl.usage == AttributeUse::Prohibited {
                    None
                } else {
                    self.resolve_attribute(&decl)
                };
                uses.insert(decl.name.clone(), resolved);
            }
        }

        let table: Arc<Vec<Arc<AttributeDecl>>> = Arc::new(uses.into_values().flatten().collect());
        let mut cache = self.attribute_tables.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(def.id, (generation, Arc::clone(&table)));
        table
    }

    fn collect_attribute_uses(
        &self,
        attributes: &[Arc<AttributeDecl>],
        groups: &[QName],
        out: &mut Vec<Arc<AttributeDecl>>,
        depth: usize,
    ) {
        out.extend(attributes.iter().cloned());
        if depth > MAX_GROUP_NESTING {
            return;
        }
        for name in groups {
            match self.attribute_group(name) {
                Some(group) => self.collect_attribute_uses(&group.attributes, &group.groups, out, depth + 1),
                None => debug!(group = %name, "unresolved attribute group reference"),
            }
        }
    }

    /// Declaration of a named attribute on an element, falling back to the
    /// global attribute table
    pub fn element_attribute(&self, element: &ElementDecl, name: &QName) -> Option<Arc<AttributeDecl>> {
        self.attributes(element)
            .iter()
            .find(|a| a.name == *name)
            .cloned()
            .or_else(|| self.attribute_declaration(name))
    }

    /// Declaration of a named attribute on a type, falling back to the
    /// global attribute table
    pub fn type_attribute(&self, def: &TypeDefinition, name: &QName) -> Option<Arc<AttributeDecl>> {
        self.type_attributes(def)
            .iter()
            .find(|a| a.name == *name)
            .cloned()
            .or_else(|| self.attribute_declaration(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtins::XSD_INT;
    use crate::schema::components::{Compositor, Scope};

    fn qn(local: &str) -> QName {
        QName::namespaced("urn:t", local)
    }

    fn sample_index() -> (SchemaIndex, Arc<SchemaDocument>) {
        let doc = Arc::new(SchemaDocument::new(Some("urn:t".into())));

        let item = ElementDecl::new(qn("item")).with_scope(Scope::Local).with_type_name(xs("string"));
        let count = AttributeDecl::new(QName::local("count"))
            .with_scope(Scope::Local)
            .with_type_name(xs(XSD_INT));
        let base = TypeDefinition::complex(Some(qn("Base")), Some(TypeRef::Named(any_type_name())))
            .with_content(Particle::group(
                ModelGroup::new(Compositor::Sequence)
                    .with_particle(Particle::element(Arc::new(item)).with_occurs(Occurs::zero_or_more())),
            ))
            .with_attribute(Arc::new(count));
        doc.add_type(Arc::new(base));

        let extra = ElementDecl::new(qn("extra")).with_scope(Scope::Local);
        let derived = TypeDefinition::complex(Some(qn("Derived")), Some(TypeRef::Named(qn("Base"))))
            .with_derivation(Derivation::Extension)
            .with_content(Particle::group(
                ModelGroup::new(Compositor::Sequence).with_particle(Particle::element(Arc::new(extra))),
            ));
        doc.add_type(Arc::new(derived));

        doc.add_element(Arc::new(ElementDecl::new(qn("root")).with_type_name(qn("Derived"))));
        (SchemaIndex::new(vec![Arc::clone(&doc)]), doc)
    }

    #[test]
    fn test_lookup_and_builtins() {
        let (index, _) = sample_index();
        assert!(index.element_declaration(&qn("root")).is_some());
        assert!(index.element_declaration(&qn("missing")).is_none());
        assert!(index.type_definition(&xs(XSD_INT)).unwrap().is_simple());
        assert!(index.complex_type(&qn("Base")).is_some());
        assert!(index.simple_type(&qn("Base")).is_none());
    }

    #[test]
    fn test_wildcard_lookup_requires_single_match() {
        let (index, doc) = sample_index();
        assert!(index.element_declaration(&QName::wildcard("root")).is_some());

        let other = Arc::new(SchemaDocument::new(Some("urn:other".into())));
        other.add_element(Arc::new(ElementDecl::new(QName::namespaced("urn:other", "root"))));
        index.add_document(other);
        assert!(index.element_declaration(&QName::wildcard("root")).is_none());

        doc.remove_element(&qn("root"));
        assert!(index.element_declaration(&QName::wildcard("root")).is_some());
    }

    #[test]
    fn test_tables_follow_schema_changes() {
        let (index, doc) = sample_index();
        assert!(index.element_declaration(&qn("late")).is_none());
        doc.add_element(Arc::new(ElementDecl::new(qn("late"))));
        assert!(index.element_declaration(&qn("late")).is_some());
    }

    #[test]
    fn test_child_components_follow_extension() {
        let (index, _) = sample_index();
        let root = index.element_declaration(&qn("root")).unwrap();
        let children = index.child_components(&root);
        let names: Vec<_> = children.keys().map(|k| k.local_name.as_str()).collect();
        assert_eq!(names, vec!["item", "extra"]);
        assert!(children[&qn("item")].occurs.is_multiple());

        // Memoized until the schema changes
        assert!(Arc::ptr_eq(&children, &index.child_components(&root)));
    }

    #[test]
    fn test_type_children_differ_from_declared_type() {
        let (index, _) = sample_index();
        let base = index.complex_type(&qn("Base")).unwrap();
        let derived = index.complex_type(&qn("Derived")).unwrap();
        assert!(index.type_child(&base, &qn("extra")).is_none());
        assert!(index.type_child(&derived, &qn("extra")).is_some());
        assert!(index.type_child(&derived, &QName::wildcard("item")).is_some());
        assert!(index.type_attribute(&derived, &QName::local("count")).is_some());
    }

    #[test]
    fn test_attributes_include_base_type() {
        let (index, _) = sample_index();
        let root = index.element_declaration(&qn("root")).unwrap();
        let attrs = index.attributes(&root);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, QName::local("count"));
        assert!(index.element_attribute(&root, &QName::local("count")).is_some());
    }

    #[test]
    fn test_substitution_group_members() {
        let (index, doc) = sample_index();
        doc.add_element(Arc::new(ElementDecl::new(qn("a")).with_substitution_group(qn("root"))));
        doc.add_element(Arc::new(ElementDecl::new(qn("b")).with_substitution_group(qn("a"))));
        let names: Vec<_> = index.substitutes(&qn("root")).iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec![qn("a"), qn("b")]);

        // Untyped members take the head's type
        let b = index.element_declaration(&qn("b")).unwrap();
        assert_eq!(index.element_type(&b).unwrap().name, Some(qn("Derived")));
    }
}
