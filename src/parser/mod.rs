//! Streaming parse driver
//!
//! A [`Parser`] holds everything shared between documents: the schema
//! index, the binding walker with its chain cache and the root resolution
//! context assembled from the binding configurations. It is `Sync`, so one
//! parser can bind documents on several threads at once; every document
//! gets its own [`ParseHandler`].

pub mod executors;
pub mod handler;
pub mod node;
pub mod sax;

use std::collections::HashSet;
use std::io::BufRead;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::binding::configuration::assemble;
use crate::binding::{BindingConfiguration, BindingWalker, Context};
use crate::config::ParserOptions;
use crate::error::{Error, Result};
use crate::loaders::SchemaResolver;
use crate::locations::Location;
use crate::schema::index::SchemaIndex;
use crate::value::Value;

pub use handler::{ElementResolver, ParseHandler, State};
pub use node::{normalize_mixed, InstanceComponent, Node, NodeKind};
pub use sax::{ContentHandler, SaxAttribute, SaxReader};

/// Binds XML documents to values
pub struct Parser {
    index: Arc<SchemaIndex>,
    walker: Arc<BindingWalker>,
    context: Arc<Context>,
    options: ParserOptions,
    resolver: SchemaResolver,
    element_resolvers: Vec<Arc<dyn ElementResolver>>,
    schema_locations: Vec<(String, Location)>,
    loaded: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("walker", &self.walker)
            .field("options", &self.options)
            .field("element_resolvers", &self.element_resolvers.len())
            .finish()
    }
}

impl Parser {
    /// Create a parser for one configuration with default options
    pub fn new(configuration: impl BindingConfiguration + 'static) -> Self {
        Self::with_options(vec![Arc::new(configuration)], ParserOptions::default())
    }

    /// Create a parser for several configurations
    pub fn with_options(configurations: Vec<Arc<dyn BindingConfiguration>>, options: ParserOptions) -> Self {
        let assembly = assemble(&configurations);
        let index = Arc::new(SchemaIndex::with_cache_capacity(
            assembly.schemas,
            options.table_cache_capacity,
        ));
        let walker = Arc::new(BindingWalker::with_capacity(
            Arc::clone(&index),
            Arc::new(assembly.registry),
            options.chain_cache_capacity,
        ));

        let mut context = assembly.context;
        context.register_arc(Arc::clone(&index));

        Self {
            resolver: SchemaResolver::default().with_limits(options.limits.clone()),
            index,
            walker,
            context: Arc::new(context),
            options,
            element_resolvers: Vec::new(),
            schema_locations: assembly.schema_locations,
            loaded: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the schema resolver used for xsi:schemaLocation hints
    pub fn with_schema_resolver(mut self, resolver: SchemaResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Add an element resolver
    pub fn with_element_resolver(mut self, resolver: impl ElementResolver + 'static) -> Self {
        self.element_resolvers.push(Arc::new(resolver));
        self
    }

    /// The schema index
    pub fn index(&self) -> &Arc<SchemaIndex> {
        &self.index
    }

    /// The binding walker
    pub fn walker(&self) -> &Arc<BindingWalker> {
        &self.walker
    }

    /// The root resolution context
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Parser options
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Registered element resolvers
    pub fn element_resolvers(&self) -> &[Arc<dyn ElementResolver>] {
        &self.element_resolvers
    }

    /// Parse a document and return the root element's value
    pub fn parse_str(&self, xml: &str) -> Result<Value> {
        Ok(self.parse_tree_str(xml)?.value_or_null())
    }

    /// Parse a document from a reader and return the root element's value
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<Value> {
        Ok(self.parse_tree_reader(reader)?.value_or_null())
    }

    /// Parse a document and return the root parse tree node
    pub fn parse_tree_str(&self, xml: &str) -> Result<Node> {
        let mut handler = ParseHandler::new(self);
        self.sax().parse_str(xml, &mut handler)?;
        handler
            .into_root()
            .ok_or_else(|| Error::Decode("document produced no root element".to_string()))
    }

    /// Parse a document from a reader and return the root parse tree node
    pub fn parse_tree_reader<R: BufRead>(&self, reader: R) -> Result<Node> {
        let mut handler = ParseHandler::new(self);
        self.sax().parse_reader(reader, &mut handler)?;
        handler
            .into_root()
            .ok_or_else(|| Error::Decode("document produced no root element".to_string()))
    }

    fn sax(&self) -> SaxReader {
        SaxReader::new().with_limits(self.options.limits.clone())
    }

    /// Load configured schema locations and document hints not loaded yet
    ///
    /// Namespaces already present in the index are not reloaded. Failures
    /// abort in strict mode and are logged otherwise.
    pub fn load_schemas(&self, hints: &[(Option<String>, String)]) -> Result<()> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);

        for (namespace, location) in &self.schema_locations {
            let key = location.as_str();
            if loaded.contains(&key) {
                continue;
            }
            let result = self.resolver.resolve_location(Some(namespace.as_str()), location.clone());
            self.add_loaded(&mut loaded, key, result)?;
        }

        for (namespace, hint) in hints {
            if loaded.contains(hint) {
                continue;
            }
            let present = self
                .index
                .documents()
                .iter()
                .any(|d| d.target_namespace.as_deref() == namespace.as_deref());
            if present {
                debug!(namespace = ?namespace, hint = %hint, "schema already provided");
                continue;
            }
            let result = self.resolver.resolve(namespace.as_deref(), hint, None);
            self.add_loaded(&mut loaded, hint.clone(), result)?;
        }
        Ok(())
    }

    fn add_loaded(
        &self,
        loaded: &mut HashSet<String>,
        key: String,
        result: Result<Vec<Arc<crate::schema::document::SchemaDocument>>>,
    ) -> Result<()> {
        match result {
            Ok(documents) => {
                for document in documents {
                    self.index.add_document(document);
                }
                loaded.insert(key);
                Ok(())
            }
            Err(e) if self.options.strict => Err(Error::Strict(format!("cannot resolve schema {}: {}", key, e))),
            Err(e) => {
                warn!(location = %key, error = %e, "schema could not be loaded");
                loaded.insert(key);
                Ok(())
            }
        }
    }
}
