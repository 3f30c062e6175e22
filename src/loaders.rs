//! Resource and schema loading
//!
//! [`Loader`] reads raw resources under size limits. [`SchemaLoader`] turns
//! a location into a schema document, and [`SchemaResolver`] follows
//! includes and imports from a starting hint, asking [`LocationResolver`]s
//! for overrides before falling back to the hint itself.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use crate::schema::document::SchemaDocument;
use crate::schema::parsing::parse_schema;

/// Resource loader for schemas and documents
#[derive(Debug, Clone)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        match location {
            Location::Path(path) => {
                let metadata = fs::metadata(path).map_err(|e| {
                    Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
                })?;
                self.limits.check_xml_size(metadata.len() as usize)?;

                fs::read_to_string(path).map_err(|e| {
                    Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
                })
            }
            Location::Url(url) => Err(Error::Resource(format!(
                "no loader for remote location {}; register a LocationResolver mapping it to a local copy",
                url
            ))),
            Location::String(s) => {
                self.limits.check_xml_size(s.len())?;
                Ok(s.clone())
            }
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Location Resolvers ==========

/// Maps a namespace and location hint to the location actually loaded
pub trait LocationResolver: Send + Sync {
    /// Return an override location, or None to defer
    fn resolve(&self, namespace: Option<&str>, hint: Option<&str>) -> Option<Location>;
}

impl<F> LocationResolver for F
where
    F: Fn(Option<&str>, Option<&str>) -> Option<Location> + Send + Sync,
{
    fn resolve(&self, namespace: Option<&str>, hint: Option<&str>) -> Option<Location> {
        self(namespace, hint)
    }
}

/// Location overrides keyed by namespace or by hint
#[derive(Debug, Clone, Default)]
pub struct LocationMap {
    by_namespace: IndexMap<String, Location>,
    by_hint: IndexMap<String, Location>,
}

impl LocationMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `namespace` from `location`, whatever the hint says
    pub fn with_namespace(mut self, namespace: impl Into<String>, location: Location) -> Self {
        self.by_namespace.insert(namespace.into(), location);
        self
    }

    /// Load `location` whenever `hint` is referenced
    pub fn with_hint(mut self, hint: impl Into<String>, location: Location) -> Self {
        self.by_hint.insert(hint.into(), location);
        self
    }
}

impl LocationResolver for LocationMap {
    fn resolve(&self, namespace: Option<&str>, hint: Option<&str>) -> Option<Location> {
        hint.and_then(|h| self.by_hint.get(h))
            .or_else(|| namespace.and_then(|ns| self.by_namespace.get(ns)))
            .cloned()
    }
}

// ========== Schema Loaders ==========

/// Loads a schema document from a location
pub trait SchemaLoader: Send + Sync {
    /// Load the document at `location`, expected to define `namespace`
    fn load(&self, namespace: Option<&str>, location: &Location) -> Result<Arc<SchemaDocument>>;
}

/// Reads XSD text through a [`Loader`] and caches documents per location
#[derive(Debug, Default)]
pub struct XsdLoader {
    loader: Loader,
    cache: Mutex<HashMap<Location, Arc<SchemaDocument>>>,
}

impl XsdLoader {
    /// Create a loader with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.loader = self.loader.with_limits(limits);
        self
    }
}

impl SchemaLoader for XsdLoader {
    fn load(&self, namespace: Option<&str>, location: &Location) -> Result<Arc<SchemaDocument>> {
        if let Some(doc) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(location) {
            return Ok(Arc::clone(doc));
        }

        let text = self.loader.load(location)?;
        let source = match location {
            Location::String(_) => None,
            other => Some(other.clone()),
        };
        let doc = Arc::new(parse_schema(&text, source)?);

        if namespace.is_some() && doc.target_namespace.as_deref() != namespace {
            debug!(
                expected = ?namespace,
                found = ?doc.target_namespace,
                location = %location.as_str(),
                "schema target namespace differs from the requested namespace"
            );
        }

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.clone(), Arc::clone(&doc));
        Ok(doc)
    }
}

/// Follows includes and imports from a starting schema
#[derive(Clone)]
pub struct SchemaResolver {
    loader: Arc<dyn SchemaLoader>,
    resolvers: Vec<Arc<dyn LocationResolver>>,
    limits: Limits,
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("resolvers", &self.resolvers.len())
            .field("limits", &self.limits)
            .finish()
    }
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new(Arc::new(XsdLoader::new()))
    }
}

impl SchemaResolver {
    /// Create a resolver loading through `loader`
    pub fn new(loader: Arc<dyn SchemaLoader>) -> Self {
        Self {
            loader,
            resolvers: Vec::new(),
            limits: Limits::default(),
        }
    }

    /// Add a location resolver, consulted in registration order
    pub fn with_resolver(mut self, resolver: impl LocationResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Decide where a schema is loaded from
    pub fn locate(&self, namespace: Option<&str>, hint: Option<&str>, base: Option<&Location>) -> Result<Option<Location>> {
        if let Some(location) = self.resolvers.iter().find_map(|r| r.resolve(namespace, hint)) {
            trace!(location = %location.as_str(), "location overridden by resolver");
            return Ok(Some(location));
        }
        match (hint, base) {
            (Some(hint), Some(base)) => base.join(hint).map(Some),
            (Some(hint), None) => Location::parse(hint).map(Some),
            (None, _) => Ok(None),
        }
    }

    /// Load a schema and every schema it includes or imports
    ///
    /// Documents are returned in load order, the requested one first. Each
    /// location is loaded once even if referenced repeatedly.
    pub fn resolve(&self, namespace: Option<&str>, hint: &str, base: Option<&Location>) -> Result<Vec<Arc<SchemaDocument>>> {
        let start = self
            .locate(namespace, Some(hint), base)?
            .ok_or_else(|| Error::Resource(format!("cannot locate schema '{}'", hint)))?;
        self.resolve_location(namespace, start)
    }

    /// Load a schema from a known location plus everything it references
    pub fn resolve_location(&self, namespace: Option<&str>, start: Location) -> Result<Vec<Arc<SchemaDocument>>> {
        let mut queue = VecDeque::new();
        queue.push_back((namespace.map(str::to_string), start, 0usize));
        let mut seen = HashSet::new();
        let mut documents = Vec::new();

        while let Some((namespace, location, depth)) = queue.pop_front() {
            if !seen.insert(location.clone()) {
                continue;
            }
            self.limits.check_schema_depth(depth)?;

            let doc = self.loader.load(namespace.as_deref(), &location)?;
            debug!(location = %location.as_str(), depth, "loaded schema document");

            for include in &doc.includes {
                if let Some(next) = self.locate(doc.target_namespace.as_deref(), Some(include), Some(&location))? {
                    queue.push_back((doc.target_namespace.clone(), next, depth + 1));
                }
            }
            for import in &doc.imports {
                match self.locate(import.namespace.as_deref(), import.location.as_deref(), Some(&location))? {
                    Some(next) => queue.push_back((import.namespace.clone(), next, depth + 1)),
                    None => trace!(namespace = ?import.namespace, "import without location"),
                }
            }
            documents.push(doc);
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<root>test</root>").unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let content = Loader::new().load(&location).unwrap();
        assert!(content.contains("<root>test</root>"));
    }

    #[test]
    fn test_size_limit() {
        let location = Location::String("x".repeat(64));
        let limits = Limits {
            max_xml_size: 16,
            ..Limits::default()
        };
        assert!(matches!(
            Loader::new().with_limits(limits).load(&location),
            Err(Error::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_remote_locations_need_a_resolver() {
        let location = Location::parse("http://example.com/a.xsd").unwrap();
        assert!(matches!(Loader::new().load(&location), Err(Error::Resource(_))));
    }

    #[test]
    fn test_location_map() {
        let map = LocationMap::new()
            .with_namespace("urn:a", Location::String("a".into()))
            .with_hint("b.xsd", Location::String("b".into()));
        assert_eq!(map.resolve(Some("urn:a"), Some("x.xsd")), Some(Location::String("a".into())));
        assert_eq!(map.resolve(Some("urn:a"), Some("b.xsd")), Some(Location::String("b".into())));
        assert_eq!(map.resolve(Some("urn:c"), None), None);
    }

    #[test]
    fn test_resolve_follows_includes_and_imports() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("main.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
                 <xs:include schemaLocation="types.xsd"/>
                 <xs:import namespace="urn:other" schemaLocation="http://example.com/other.xsd"/>
                 <xs:element name="root" type="xs:string"/>
               </xs:schema>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("types.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
                 <xs:include schemaLocation="main.xsd"/>
                 <xs:simpleType name="Code"><xs:restriction base="xs:token"/></xs:simpleType>
               </xs:schema>"#,
        )
        .unwrap();
        let other = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:other">
                         <xs:element name="extra" type="xs:int"/>
                       </xs:schema>"#;

        let resolver = SchemaResolver::default()
            .with_resolver(LocationMap::new().with_namespace("urn:other", Location::String(other.into())));
        let main = Location::Path(dir.path().join("main.xsd"));
        let docs = resolver.resolve(Some("urn:main"), &main.as_str(), None).unwrap();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].element_count(), 1);
        assert_eq!(docs[1].type_count(), 1);
        assert_eq!(docs[2].target_namespace.as_deref(), Some("urn:other"));
    }

    #[test]
    fn test_include_depth_limit() {
        let dir = TempDir::new().unwrap();
        for i in 0..4 {
            fs::write(
                dir.path().join(format!("s{}.xsd", i)),
                format!(
                    r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:include schemaLocation="s{}.xsd"/></xs:schema>"#,
                    i + 1
                ),
            )
            .unwrap();
        }
        fs::write(
            dir.path().join("s4.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#,
        )
        .unwrap();

        let limits = Limits {
            max_schema_depth: 2,
            ..Limits::default()
        };
        let resolver = SchemaResolver::default().with_limits(limits);
        let start = Location::Path(dir.path().join("s0.xsd"));
        assert!(matches!(
            resolver.resolve_location(None, start),
            Err(Error::LimitExceeded(_))
        ));
    }
}
