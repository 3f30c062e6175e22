//! XSD schema components
//!
//! Element, attribute and type declarations as read from schema documents.
//! Components are shared behind `Arc` and never mutated once published;
//! each one carries a [`ComponentId`] which is its identity for caching.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#components

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::namespaces::QName;

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a schema component
///
/// Two declarations with equal content are still distinct components; caches
/// key on this id, never on component values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        Self(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// Check if particle can have multiple occurrences
    pub fn is_multiple(&self) -> bool {
        self.max.map_or(true, |max| max > 1)
    }

    /// Combine with the occurrence of an enclosing group
    pub fn nested_in(&self, outer: Occurs) -> Occurs {
        let max = match (self.max, outer.max) {
            (Some(a), Some(b)) => Some(a.saturating_mul(b)),
            _ => None,
        };
        Occurs::new(self.min.saturating_mul(outer.min), max)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Reference to a type definition
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// Global type looked up by name
    Named(QName),
    /// Anonymous type declared inline
    Anonymous(Arc<TypeDefinition>),
}

impl TypeRef {
    /// Name of the referenced type, if it is a named reference
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Anonymous(def) => def.name.as_ref(),
        }
    }
}

/// Derivation method for types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Derivation {
    /// Type derived by restriction
    #[default]
    Restriction,
    /// Type derived by extension
    Extension,
}

/// Whitespace facet values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    /// Keep text as-is
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace, then collapse runs of spaces and trim
    Collapse,
}

impl WhiteSpace {
    /// Parse from facet value
    pub fn from_facet(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(Self::Preserve),
            "replace" => Some(Self::Replace),
            "collapse" => Some(Self::Collapse),
            _ => None,
        }
    }

    /// Apply this facet to a lexical value
    pub fn apply(&self, text: &str) -> String {
        match self {
            WhiteSpace::Preserve => text.to_string(),
            WhiteSpace::Replace => text.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => text.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Simple type variety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variety {
    /// Atomic values
    #[default]
    Atomic,
    /// Whitespace separated list of item type values
    List,
    /// Value of one of the member types
    Union,
}

/// Simple type content
#[derive(Debug, Clone, Default)]
pub struct SimpleTypeInfo {
    /// Variety of the type
    pub variety: Variety,
    /// Item type for list types
    pub item_type: Option<TypeRef>,
    /// Member types for union types
    pub member_types: Vec<TypeRef>,
    /// Whitespace facet, if declared on this type
    pub white_space: Option<WhiteSpace>,
    /// Enumeration facet values
    pub enumeration: Vec<String>,
}

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    /// Ordered sequence
    Sequence,
    /// Exactly one of the particles
    Choice,
    /// All particles, any order
    All,
}

/// Model group (sequence, choice, all)
#[derive(Debug, Clone)]
pub struct ModelGroup {
    /// Group compositor
    pub compositor: Compositor,
    /// Particles in declaration order
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    /// Create an empty group
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            particles: Vec::new(),
        }
    }

    /// Add a particle
    pub fn with_particle(mut self, particle: Particle) -> Self {
        self.particles.push(particle);
        self
    }
}

/// Particle term
#[derive(Debug, Clone)]
pub enum Term {
    /// Element declaration (local, or a reference to a global one)
    Element(Arc<ElementDecl>),
    /// Nested model group
    Group(ModelGroup),
    /// Reference to a named model group
    GroupRef(QName),
    /// Element wildcard
    Any,
}

/// A term with its occurrence bounds
#[derive(Debug, Clone)]
pub struct Particle {
    /// What the particle contains
    pub term: Term,
    /// Occurrence bounds
    pub occurs: Occurs,
}

impl Particle {
    /// Create a particle occurring once
    pub fn new(term: Term) -> Self {
        Self {
            term,
            occurs: Occurs::once(),
        }
    }

    /// Element particle
    pub fn element(decl: Arc<ElementDecl>) -> Self {
        Self::new(Term::Element(decl))
    }

    /// Group particle
    pub fn group(group: ModelGroup) -> Self {
        Self::new(Term::Group(group))
    }

    /// Set occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }
}

/// Complex type content
#[derive(Debug, Clone, Default)]
pub struct ComplexTypeInfo {
    /// Content particle (None for empty or simple content)
    pub content: Option<Particle>,
    /// Locally declared attributes
    pub attributes: Vec<Arc<AttributeDecl>>,
    /// Referenced attribute groups
    pub attribute_groups: Vec<QName>,
    /// Whether text may be interleaved with child elements
    pub mixed: bool,
    /// Whether the type has simple (text) content
    pub simple_content: bool,
    /// Whether an attribute wildcard is present
    pub any_attribute: bool,
}

/// Simple or complex type content
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Simple type
    Simple(SimpleTypeInfo),
    /// Complex type
    Complex(ComplexTypeInfo),
}

/// XSD type definition
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// Component identity
    pub id: ComponentId,
    /// Type name (None for anonymous types)
    pub name: Option<QName>,
    /// Target namespace of the declaring schema
    pub target_namespace: Option<String>,
    /// Base type (None only for the root of the hierarchy)
    pub base: Option<TypeRef>,
    /// How this type derives from its base
    pub derivation: Derivation,
    /// Simple or complex content
    pub kind: TypeKind,
    /// Whether the type is abstract
    pub is_abstract: bool,
    /// For anonymous types: name of the declaring element or attribute
    pub owner: Option<QName>,
}

impl TypeDefinition {
    /// Create a simple type
    pub fn simple(name: Option<QName>, base: Option<TypeRef>) -> Self {
        Self::new(name, base, TypeKind::Simple(SimpleTypeInfo::default()))
    }

    /// Create a complex type
    pub fn complex(name: Option<QName>, base: Option<TypeRef>) -> Self {
        Self::new(name, base, TypeKind::Complex(ComplexTypeInfo::default()))
    }

    fn new(name: Option<QName>, base: Option<TypeRef>, kind: TypeKind) -> Self {
        Self {
            id: ComponentId::next(),
            target_namespace: name.as_ref().and_then(|n| n.namespace.clone()),
            name,
            base,
            derivation: Derivation::Restriction,
            kind,
            is_abstract: false,
            owner: None,
        }
    }

    /// Set the target namespace
    pub fn with_target_namespace(mut self, ns: Option<String>) -> Self {
        self.target_namespace = ns;
        self
    }

    /// Set the derivation method
    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derivation = derivation;
        self
    }

    /// Set the owning declaration name of an anonymous type
    pub fn with_owner(mut self, owner: QName) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Replace the complex content (no-op for simple types)
    pub fn with_content(mut self, particle: Particle) -> Self {
        if let TypeKind::Complex(ref mut info) = self.kind {
            info.content = Some(particle);
        }
        self
    }

    /// Add a local attribute (no-op for simple types)
    pub fn with_attribute(mut self, attribute: Arc<AttributeDecl>) -> Self {
        if let TypeKind::Complex(ref mut info) = self.kind {
            info.attributes.push(attribute);
        }
        self
    }

    /// Mark a complex type as mixed
    pub fn with_mixed(mut self, mixed: bool) -> Self {
        if let TypeKind::Complex(ref mut info) = self.kind {
            info.mixed = mixed;
        }
        self
    }

    /// Mark a complex type as having simple content
    pub fn with_simple_content(mut self, simple: bool) -> Self {
        if let TypeKind::Complex(ref mut info) = self.kind {
            info.simple_content = simple;
        }
        self
    }

    /// Set the simple type details (no-op for complex types)
    pub fn with_simple_info(mut self, info: SimpleTypeInfo) -> Self {
        if let TypeKind::Simple(_) = self.kind {
            self.kind = TypeKind::Simple(info);
        }
        self
    }

    /// Check if this is a simple type
    pub fn is_simple(&self) -> bool {
        matches!(self.kind, TypeKind::Simple(_))
    }

    /// Check if this is a complex type
    pub fn is_complex(&self) -> bool {
        matches!(self.kind, TypeKind::Complex(_))
    }

    /// Check if this type is anonymous
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    /// Simple type details
    pub fn as_simple(&self) -> Option<&SimpleTypeInfo> {
        match &self.kind {
            TypeKind::Simple(info) => Some(info),
            TypeKind::Complex(_) => None,
        }
    }

    /// Complex type details
    pub fn as_complex(&self) -> Option<&ComplexTypeInfo> {
        match &self.kind {
            TypeKind::Complex(info) => Some(info),
            TypeKind::Simple(_) => None,
        }
    }

    /// Whether instances of this type mix text and child elements
    pub fn is_mixed(&self) -> bool {
        self.as_complex().map_or(false, |c| c.mixed)
    }

    /// Readable name for diagnostics
    pub fn display_name(&self) -> String {
        match (&self.name, &self.owner) {
            (Some(name), _) => name.to_string(),
            (None, Some(owner)) => format!("anonymous type of {}", owner),
            (None, None) => format!("anonymous type {}", self.id),
        }
    }
}

/// Declaration scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Top-level declaration of a schema document
    #[default]
    Global,
    /// Declared inside a type or group
    Local,
}

/// XSD element declaration
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// Component identity
    pub id: ComponentId,
    /// Element name
    pub name: QName,
    /// Declared type (None means xs:anyType)
    pub type_ref: Option<TypeRef>,
    /// Referenced global element, for `ref=` particles
    pub reference: Option<QName>,
    /// Whether xsi:nil is allowed
    pub nillable: bool,
    /// Whether the element is abstract
    pub is_abstract: bool,
    /// Head of the substitution group this element belongs to
    pub substitution_group: Option<QName>,
    /// Global or local
    pub scope: Scope,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
}

impl ElementDecl {
    /// Create a global element declaration
    pub fn new(name: QName) -> Self {
        Self {
            id: ComponentId::next(),
            name,
            type_ref: None,
            reference: None,
            nillable: false,
            is_abstract: false,
            substitution_group: None,
            scope: Scope::Global,
            default: None,
            fixed: None,
        }
    }

    /// Create a reference to a global element
    pub fn reference(target: QName) -> Self {
        let mut decl = Self::new(target.clone());
        decl.reference = Some(target);
        decl.scope = Scope::Local;
        decl
    }

    /// Set a named type
    pub fn with_type_name(mut self, type_name: QName) -> Self {
        self.type_ref = Some(TypeRef::Named(type_name));
        self
    }

    /// Set an inline anonymous type
    pub fn with_anonymous_type(mut self, def: TypeDefinition) -> Self {
        let def = def.with_owner(self.name.clone());
        self.type_ref = Some(TypeRef::Anonymous(Arc::new(def)));
        self
    }

    /// Set the scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set nillable
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = nillable;
        self
    }

    /// Set the substitution group head
    pub fn with_substitution_group(mut self, head: QName) -> Self {
        self.substitution_group = Some(head);
        self
    }

    /// Make a copy with a new identity (used for synthetic declarations)
    pub fn derive(&self) -> Self {
        let mut copy = self.clone();
        copy.id = ComponentId::next();
        copy
    }

    /// Check if this is a reference to a global declaration
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Target namespace
    pub fn target_namespace(&self) -> Option<&str> {
        self.name.namespace.as_deref()
    }
}

/// How an attribute may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUse {
    /// May be omitted
    #[default]
    Optional,
    /// Must be present
    Required,
    /// Must not be present
    Prohibited,
}

/// XSD attribute declaration
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// Component identity
    pub id: ComponentId,
    /// Attribute name
    pub name: QName,
    /// Declared type (None means xs:anySimpleType)
    pub type_ref: Option<TypeRef>,
    /// Referenced global attribute, for `ref=` uses
    pub reference: Option<QName>,
    /// Usage constraint
    pub usage: AttributeUse,
    /// Global or local
    pub scope: Scope,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
}

impl AttributeDecl {
    /// Create a global attribute declaration
    pub fn new(name: QName) -> Self {
        Self {
            id: ComponentId::next(),
            name,
            type_ref: None,
            reference: None,
            usage: AttributeUse::Optional,
            scope: Scope::Global,
            default: None,
            fixed: None,
        }
    }

    /// Create a reference to a global attribute
    pub fn reference(target: QName) -> Self {
        let mut decl = Self::new(target.clone());
        decl.reference = Some(target);
        decl.scope = Scope::Local;
        decl
    }

    /// Set a named type
    pub fn with_type_name(mut self, type_name: QName) -> Self {
        self.type_ref = Some(TypeRef::Named(type_name));
        self
    }

    /// Set an inline anonymous type
    pub fn with_anonymous_type(mut self, def: TypeDefinition) -> Self {
        let def = def.with_owner(self.name.clone());
        self.type_ref = Some(TypeRef::Anonymous(Arc::new(def)));
        self
    }

    /// Set the scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the usage
    pub fn with_usage(mut self, usage: AttributeUse) -> Self {
        self.usage = usage;
        self
    }

    /// Check if this is a reference to a global declaration
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }
}

/// XSD attribute group definition
#[derive(Debug, Clone)]
pub struct AttributeGroup {
    /// Component identity
    pub id: ComponentId,
    /// Group name
    pub name: QName,
    /// Attributes declared in the group
    pub attributes: Vec<Arc<AttributeDecl>>,
    /// Nested attribute group references
    pub groups: Vec<QName>,
}

impl AttributeGroup {
    /// Create an empty attribute group
    pub fn new(name: QName) -> Self {
        Self {
            id: ComponentId::next(),
            name,
            attributes: Vec::new(),
            groups: Vec::new(),
        }
    }
}

/// Named model group definition (`xs:group name=...`)
#[derive(Debug, Clone)]
pub struct GroupDefinition {
    /// Component identity
    pub id: ComponentId,
    /// Group name
    pub name: QName,
    /// The group content
    pub group: ModelGroup,
}

impl GroupDefinition {
    /// Create a named group
    pub fn new(name: QName, group: ModelGroup) -> Self {
        Self {
            id: ComponentId::next(),
            name,
            group,
        }
    }
}

/// An element or attribute declaration: the unit bindings are resolved for
#[derive(Debug, Clone)]
pub enum Declaration {
    /// Element declaration
    Element(Arc<ElementDecl>),
    /// Attribute declaration
    Attribute(Arc<AttributeDecl>),
}

impl Declaration {
    /// Component identity
    pub fn id(&self) -> ComponentId {
        match self {
            Declaration::Element(e) => e.id,
            Declaration::Attribute(a) => a.id,
        }
    }

    /// Declared name
    pub fn name(&self) -> &QName {
        match self {
            Declaration::Element(e) => &e.name,
            Declaration::Attribute(a) => &a.name,
        }
    }

    /// Declared type reference
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            Declaration::Element(e) => e.type_ref.as_ref(),
            Declaration::Attribute(a) => a.type_ref.as_ref(),
        }
    }

    /// Check if this is a reference to a global declaration
    pub fn is_reference(&self) -> bool {
        match self {
            Declaration::Element(e) => e.is_reference(),
            Declaration::Attribute(a) => a.is_reference(),
        }
    }

    /// Check if this is an attribute declaration
    pub fn is_attribute(&self) -> bool {
        matches!(self, Declaration::Attribute(_))
    }
}
