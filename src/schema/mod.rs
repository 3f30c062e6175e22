//! XML Schema model
//!
//! Schema components, schema documents, the built-in types, the XSD reader,
//! the schema index and the type hierarchy walker.

pub mod builtins;
pub mod components;
pub mod document;
pub mod hierarchy;
pub mod index;
pub mod parsing;

pub use builtins::{any_type_name, builtin_schema, xs, XSD_NAMESPACE};
pub use components::{
    AttributeDecl, AttributeGroup, AttributeUse, ComplexTypeInfo, ComponentId, Compositor,
    Declaration, Derivation, ElementDecl, GroupDefinition, ModelGroup, Occurs, Particle, Scope,
    SimpleTypeInfo, Term, TypeDefinition, TypeKind, TypeRef, Variety, WhiteSpace,
};
pub use document::{Category, SchemaDocument, SchemaImport};
pub use hierarchy::TypeWalker;
pub use index::{ChildParticle, ChildTable, IndexedComponent, SchemaIndex};
pub use parsing::parse_schema;
