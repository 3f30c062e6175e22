//! XSD document parsing
//!
//! Reads XSD text into a [`SchemaDocument`]. Only the structure the binding
//! engine needs is kept: declarations, type derivation, particles and the
//! facets that affect lexical pre-processing (whiteSpace, enumeration).

use std::sync::Arc;

use roxmltree::{Document, Node};
use tracing::trace;

use super::builtins::{xs, XSD_ANY_SIMPLE_TYPE, XSD_ANY_TYPE, XSD_NAMESPACE};
use super::components::{
    AttributeDecl, AttributeGroup, AttributeUse, Compositor, Derivation, ElementDecl,
    GroupDefinition, ModelGroup, Occurs, Particle, Scope, SimpleTypeInfo, Term, TypeDefinition,
    TypeKind, TypeRef, Variety, WhiteSpace,
};
use super::document::{SchemaDocument, SchemaImport};
use crate::error::{Error, Result};
use crate::locations::Location;
use crate::names::{check_declaration_name, parse_reference};
use crate::namespaces::QName;

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ATTRIBUTE_GROUP: &str = "attributeGroup";
    pub const ANY_ATTRIBUTE: &str = "anyAttribute";
    pub const GROUP: &str = "group";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const ANY: &str = "any";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const LIST: &str = "list";
    pub const UNION: &str = "union";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const WHITE_SPACE: &str = "whiteSpace";
    pub const ENUMERATION: &str = "enumeration";
}

/// Parse XSD text into a schema document
pub fn parse_schema(text: &str, location: Option<Location>) -> Result<SchemaDocument> {
    let doc = Document::parse(text).map_err(|e| {
        Error::Schema(format!(
            "Failed to parse schema{}: {}",
            location.as_ref().map(|l| format!(" '{}'", l.as_str())).unwrap_or_default(),
            e
        ))
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != xsd_elements::SCHEMA || root.tag_name().namespace() != Some(XSD_NAMESPACE) {
        return Err(Error::Schema(format!(
            "Expected xs:schema root element, got {}",
            root.tag_name().name()
        )));
    }

    let target_namespace = root.attribute("targetNamespace").map(str::to_string);
    let parser = SchemaParser {
        target_namespace: target_namespace.clone(),
        element_qualified: root.attribute("elementFormDefault") == Some("qualified"),
        attribute_qualified: root.attribute("attributeFormDefault") == Some("qualified"),
    };

    let mut schema = SchemaDocument::new(target_namespace);
    if let Some(location) = location {
        schema = schema.with_location(location);
    }

    for child in element_children(root) {
        match child.tag_name().name() {
            xsd_elements::IMPORT => schema.imports.push(SchemaImport {
                namespace: child.attribute("namespace").map(str::to_string),
                location: child.attribute("schemaLocation").map(str::to_string),
            }),
            xsd_elements::INCLUDE | xsd_elements::REDEFINE => {
                if let Some(loc) = child.attribute("schemaLocation") {
                    schema.includes.push(loc.to_string());
                }
            }
            _ => {}
        }
    }

    for child in element_children(root) {
        match child.tag_name().name() {
            xsd_elements::ELEMENT => {
                let decl = parser.parse_element(child, Scope::Global)?;
                schema.add_element(Arc::new(decl));
            }
            xsd_elements::ATTRIBUTE => {
                let decl = parser.parse_attribute(child, Scope::Global)?;
                schema.add_attribute(Arc::new(decl));
            }
            xsd_elements::COMPLEX_TYPE => {
                let name = parser.global_name(child)?;
                schema.add_type(Arc::new(parser.parse_complex_type(child, Some(name))?));
            }
            xsd_elements::SIMPLE_TYPE => {
                let name = parser.global_name(child)?;
                schema.add_type(Arc::new(parser.parse_simple_type(child, Some(name))?));
            }
            xsd_elements::ATTRIBUTE_GROUP => {
                let name = parser.global_name(child)?;
                schema.add_attribute_group(Arc::new(parser.parse_attribute_group(child, name)?));
            }
            xsd_elements::GROUP => {
                let name = parser.global_name(child)?;
                let group = parser.parse_named_group(child)?;
                schema.add_group(Arc::new(GroupDefinition::new(name, group)));
            }
            _ => {}
        }
    }

    trace!(
        namespace = ?schema.target_namespace,
        elements = schema.element_count(),
        types = schema.type_count(),
        "parsed schema document"
    );

    Ok(schema)
}

fn element_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().namespace() == Some(XSD_NAMESPACE))
}

fn child_named<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    element_children(node).find(|n| n.tag_name().name() == name)
}

/// Parse minOccurs/maxOccurs attribute values
fn parse_occurs(node: Node) -> Result<Occurs> {
    let mut occurs = Occurs::once();

    if let Some(min) = node.attribute("minOccurs") {
        occurs.min = min.trim().parse().map_err(|_| {
            Error::Schema(format!("minOccurs value '{}' is not a non-negative integer", min))
        })?;
    }

    if let Some(max) = node.attribute("maxOccurs") {
        occurs.max = if max.trim() == "unbounded" {
            None
        } else {
            Some(max.trim().parse().map_err(|_| {
                Error::Schema(format!("maxOccurs value '{}' is not valid", max))
            })?)
        };
    }

    Ok(occurs)
}

fn parse_bool(node: Node, attr: &str) -> bool {
    matches!(node.attribute(attr), Some("true") | Some("1"))
}

struct SchemaParser {
    target_namespace: Option<String>,
    element_qualified: bool,
    attribute_qualified: bool,
}

impl SchemaParser {
    /// Resolve a `prefix:local` reference in the scope of a schema node
    fn resolve_qname(&self, node: Node, value: &str) -> Result<QName> {
        let (prefix, local) = parse_reference(value)?;
        let namespace = match prefix {
            Some(p) => Some(node.lookup_namespace_uri(Some(p)).ok_or_else(|| {
                Error::Namespace(format!("Unknown prefix '{}' in reference '{}'", p, value))
            })?),
            None => node.lookup_namespace_uri(None),
        };
        Ok(QName::new(namespace, local))
    }

    fn global_name(&self, node: Node) -> Result<QName> {
        let name = node.attribute("name").ok_or_else(|| {
            Error::Schema(format!("Global {} without a name", node.tag_name().name()))
        })?;
        check_declaration_name(name)?;
        Ok(QName::new(self.target_namespace.clone(), name))
    }

    fn local_name(&self, node: Node, qualified_default: bool) -> Result<QName> {
        let name = node
            .attribute("name")
            .ok_or_else(|| Error::Schema(format!("Local {} without a name", node.tag_name().name())))?;
        check_declaration_name(name)?;
        let qualified = match node.attribute("form") {
            Some(form) => form == "qualified",
            None => qualified_default,
        };
        let namespace = if qualified { self.target_namespace.clone() } else { None };
        Ok(QName::new(namespace, name))
    }

    fn parse_element(&self, node: Node, scope: Scope) -> Result<ElementDecl> {
        if let Some(reference) = node.attribute("ref") {
            return Ok(ElementDecl::reference(self.resolve_qname(node, reference)?));
        }

        let name = match scope {
            Scope::Global => self.global_name(node)?,
            Scope::Local => self.local_name(node, self.element_qualified)?,
        };

        let mut decl = ElementDecl::new(name.clone()).with_scope(scope);
        decl.nillable = parse_bool(node, "nillable");
        decl.is_abstract = parse_bool(node, "abstract");
        decl.default = node.attribute("default").map(str::to_string);
        decl.fixed = node.attribute("fixed").map(str::to_string);
        if let Some(head) = node.attribute("substitutionGroup") {
            decl.substitution_group = Some(self.resolve_qname(node, head)?);
        }

        if let Some(type_name) = node.attribute("type") {
            decl = decl.with_type_name(self.resolve_qname(node, type_name)?);
        } else if let Some(ct) = child_named(node, xsd_elements::COMPLEX_TYPE) {
            decl = decl.with_anonymous_type(self.parse_complex_type(ct, None)?);
        } else if let Some(st) = child_named(node, xsd_elements::SIMPLE_TYPE) {
            decl = decl.with_anonymous_type(self.parse_simple_type(st, None)?);
        }

        Ok(decl)
    }

    fn parse_attribute(&self, node: Node, scope: Scope) -> Result<AttributeDecl> {
        let mut decl = if let Some(reference) = node.attribute("ref") {
            AttributeDecl::reference(self.resolve_qname(node, reference)?)
        } else {
            let name = match scope {
                Scope::Global => self.global_name(node)?,
                Scope::Local => self.local_name(node, self.attribute_qualified)?,
            };
            let mut decl = AttributeDecl::new(name).with_scope(scope);
            if let Some(type_name) = node.attribute("type") {
                decl = decl.with_type_name(self.resolve_qname(node, type_name)?);
            } else if let Some(st) = child_named(node, xsd_elements::SIMPLE_TYPE) {
                decl = decl.with_anonymous_type(self.parse_simple_type(st, None)?);
            }
            decl
        };

        decl.usage = match node.attribute("use") {
            Some("required") => AttributeUse::Required,
            Some("prohibited") => AttributeUse::Prohibited,
            _ => AttributeUse::Optional,
        };
        decl.default = node.attribute("default").map(str::to_string);
        decl.fixed = node.attribute("fixed").map(str::to_string);
        Ok(decl)
    }

    fn parse_complex_type(&self, node: Node, name: Option<QName>) -> Result<TypeDefinition> {
        let mut def = TypeDefinition::complex(name, Some(TypeRef::Named(xs(XSD_ANY_TYPE))))
            .with_target_namespace(self.target_namespace.clone())
            .with_mixed(parse_bool(node, "mixed"));
        def.is_abstract = parse_bool(node, "abstract");

        if let Some(content) = child_named(node, xsd_elements::SIMPLE_CONTENT) {
            def = def.with_simple_content(true);
            return self.parse_derivation(content, def);
        }

        if let Some(content) = child_named(node, xsd_elements::COMPLEX_CONTENT) {
            if content.attribute("mixed").is_some() {
                def = def.with_mixed(parse_bool(content, "mixed"));
            }
            return self.parse_derivation(content, def);
        }

        self.parse_complex_body(node, def)
    }

    /// Parse `<xs:extension>` / `<xs:restriction>` inside simple or complex content
    fn parse_derivation(&self, content: Node, mut def: TypeDefinition) -> Result<TypeDefinition> {
        let derivation = element_children(content).find(|n| {
            matches!(n.tag_name().name(), xsd_elements::EXTENSION | xsd_elements::RESTRICTION)
        });
        let Some(derivation) = derivation else {
            return Ok(def);
        };

        def.derivation = if derivation.tag_name().name() == xsd_elements::EXTENSION {
            Derivation::Extension
        } else {
            Derivation::Restriction
        };

        if let Some(base) = derivation.attribute("base") {
            def.base = Some(TypeRef::Named(self.resolve_qname(derivation, base)?));
        } else if let Some(st) = child_named(derivation, xsd_elements::SIMPLE_TYPE) {
            def.base = Some(TypeRef::Anonymous(Arc::new(self.parse_simple_type(st, None)?)));
        }

        self.parse_complex_body(derivation, def)
    }

    /// Parse the particle and attribute children of a complex type body
    fn parse_complex_body(&self, node: Node, mut def: TypeDefinition) -> Result<TypeDefinition> {
        let mut content = None;
        let mut attributes = Vec::new();
        let mut attribute_groups = Vec::new();
        let mut any_attribute = false;

        for child in element_children(node) {
            match child.tag_name().name() {
                xsd_elements::SEQUENCE | xsd_elements::CHOICE | xsd_elements::ALL => {
                    content = Some(self.parse_group_particle(child)?);
                }
                xsd_elements::GROUP => {
                    content = Some(self.parse_particle(child)?);
                }
                xsd_elements::ATTRIBUTE => {
                    attributes.push(Arc::new(self.parse_attribute(child, Scope::Local)?));
                }
                xsd_elements::ATTRIBUTE_GROUP => {
                    if let Some(reference) = child.attribute("ref") {
                        attribute_groups.push(self.resolve_qname(child, reference)?);
                    }
                }
                xsd_elements::ANY_ATTRIBUTE => any_attribute = true,
                _ => {}
            }
        }

        if let TypeKind::Complex(ref mut info) = def.kind {
            if content.is_some() {
                info.content = content;
            }
            info.attributes.extend(attributes);
            info.attribute_groups.extend(attribute_groups);
            info.any_attribute |= any_attribute;
        }

        Ok(def)
    }

    fn compositor(node: Node) -> Option<Compositor> {
        match node.tag_name().name() {
            xsd_elements::SEQUENCE => Some(Compositor::Sequence),
            xsd_elements::CHOICE => Some(Compositor::Choice),
            xsd_elements::ALL => Some(Compositor::All),
            _ => None,
        }
    }

    fn parse_group_particle(&self, node: Node) -> Result<Particle> {
        let compositor = Self::compositor(node)
            .ok_or_else(|| Error::Schema(format!("Unexpected model group '{}'", node.tag_name().name())))?;
        let mut group = ModelGroup::new(compositor);
        for child in element_children(node) {
            match child.tag_name().name() {
                xsd_elements::ELEMENT
                | xsd_elements::SEQUENCE
                | xsd_elements::CHOICE
                | xsd_elements::ALL
                | xsd_elements::GROUP
                | xsd_elements::ANY => group.particles.push(self.parse_particle(child)?),
                _ => {}
            }
        }
        Ok(Particle::group(group).with_occurs(parse_occurs(node)?))
    }

    fn parse_particle(&self, node: Node) -> Result<Particle> {
        let occurs = parse_occurs(node)?;
        let term = match node.tag_name().name() {
            xsd_elements::ELEMENT => Term::Element(Arc::new(self.parse_element(node, Scope::Local)?)),
            xsd_elements::GROUP => {
                let reference = node
                    .attribute("ref")
                    .ok_or_else(|| Error::Schema("Local xs:group without ref".to_string()))?;
                Term::GroupRef(self.resolve_qname(node, reference)?)
            }
            xsd_elements::ANY => Term::Any,
            _ => return self.parse_group_particle(node),
        };
        Ok(Particle::new(term).with_occurs(occurs))
    }

    fn parse_named_group(&self, node: Node) -> Result<ModelGroup> {
        let body = element_children(node)
            .find(|n| Self::compositor(*n).is_some())
            .ok_or_else(|| Error::Schema("xs:group without a model group".to_string()))?;
        match self.parse_group_particle(body)?.term {
            Term::Group(group) => Ok(group),
            _ => Err(Error::Schema("xs:group without a model group".to_string())),
        }
    }

    fn parse_attribute_group(&self, node: Node, name: QName) -> Result<AttributeGroup> {
        let mut group = AttributeGroup::new(name);
        for child in element_children(node) {
            match child.tag_name().name() {
                xsd_elements::ATTRIBUTE => {
                    group.attributes.push(Arc::new(self.parse_attribute(child, Scope::Local)?));
                }
                xsd_elements::ATTRIBUTE_GROUP => {
                    if let Some(reference) = child.attribute("ref") {
                        group.groups.push(self.resolve_qname(child, reference)?);
                    }
                }
                _ => {}
            }
        }
        Ok(group)
    }

    fn parse_simple_type(&self, node: Node, name: Option<QName>) -> Result<TypeDefinition> {
        let any_simple = TypeRef::Named(xs(XSD_ANY_SIMPLE_TYPE));
        let mut info = SimpleTypeInfo::default();
        let mut base = Some(any_simple.clone());

        if let Some(restriction) = child_named(node, xsd_elements::RESTRICTION) {
            if let Some(b) = restriction.attribute("base") {
                base = Some(TypeRef::Named(self.resolve_qname(restriction, b)?));
            } else if let Some(st) = child_named(restriction, xsd_elements::SIMPLE_TYPE) {
                base = Some(TypeRef::Anonymous(Arc::new(self.parse_simple_type(st, None)?)));
            }
            for facet in element_children(restriction) {
                match facet.tag_name().name() {
                    xsd_elements::WHITE_SPACE => {
                        info.white_space = facet.attribute("value").and_then(WhiteSpace::from_facet);
                    }
                    xsd_elements::ENUMERATION => {
                        if let Some(v) = facet.attribute("value") {
                            info.enumeration.push(v.to_string());
                        }
                    }
                    _ => {}
                }
            }
        } else if let Some(list) = child_named(node, xsd_elements::LIST) {
            info.variety = Variety::List;
            info.white_space = Some(WhiteSpace::Collapse);
            info.item_type = match list.attribute("itemType") {
                Some(item) => Some(TypeRef::Named(self.resolve_qname(list, item)?)),
                None => match child_named(list, xsd_elements::SIMPLE_TYPE) {
                    Some(st) => Some(TypeRef::Anonymous(Arc::new(self.parse_simple_type(st, None)?))),
                    None => None,
                },
            };
        } else if let Some(union) = child_named(node, xsd_elements::UNION) {
            info.variety = Variety::Union;
            if let Some(members) = union.attribute("memberTypes") {
                for member in members.split_whitespace() {
                    info.member_types.push(TypeRef::Named(self.resolve_qname(union, member)?));
                }
            }
            for st in element_children(union).filter(|n| n.tag_name().name() == xsd_elements::SIMPLE_TYPE) {
                info.member_types.push(TypeRef::Anonymous(Arc::new(self.parse_simple_type(st, None)?)));
            }
        }

        Ok(TypeDefinition::simple(name, base)
            .with_target_namespace(self.target_namespace.clone())
            .with_simple_info(info))
    }
}
