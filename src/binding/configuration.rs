//! Binding configurations
//!
//! A configuration bundles everything needed to bind documents of one
//! namespace: the schema, the binding registrations and the values the
//! bindings expect in their resolution context. Configurations depend on
//! other configurations (most on the XML Schema one) and are applied
//! dependency-first, so a configuration can replace bindings registered by
//! the ones it builds on.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::context::Context;
use super::registry::BindingRegistry;
use super::Binding;
use crate::error::Result;
use crate::locations::Location;
use crate::namespaces::QName;
use crate::schema::document::SchemaDocument;

/// Bindings, schema and context setup for one namespace
pub trait BindingConfiguration: Send + Sync {
    /// Namespace this configuration binds
    fn namespace(&self) -> &str;

    /// Schema document, when it is built in memory
    fn schema(&self) -> Option<Arc<SchemaDocument>> {
        None
    }

    /// Schema location, when the schema is loaded on demand
    fn schema_location(&self) -> Option<Location> {
        None
    }

    /// Configurations this one builds on
    fn dependencies(&self) -> Vec<Arc<dyn BindingConfiguration>> {
        Vec::new()
    }

    /// Register the bindings of this configuration
    fn configure_bindings(&self, registry: &mut BindingRegistry);

    /// Register values the bindings look up in their context
    fn configure_context(&self, _context: &mut Context) {}
}

impl fmt::Debug for dyn BindingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingConfiguration({})", self.namespace())
    }
}

/// Order configurations dependency-first, each namespace once
///
/// The first configuration met for a namespace wins; later ones with the
/// same namespace are ignored, which also cuts dependency cycles.
pub fn resolve_configurations(roots: &[Arc<dyn BindingConfiguration>]) -> Vec<Arc<dyn BindingConfiguration>> {
    fn visit(
        config: &Arc<dyn BindingConfiguration>,
        seen: &mut HashSet<String>,
        ordered: &mut Vec<Arc<dyn BindingConfiguration>>,
    ) {
        if !seen.insert(config.namespace().to_string()) {
            return;
        }
        for dependency in config.dependencies() {
            visit(&dependency, seen, ordered);
        }
        ordered.push(Arc::clone(config));
    }

    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for root in roots {
        visit(root, &mut seen, &mut ordered);
    }
    ordered
}

/// Result of applying a set of configurations
#[derive(Debug, Default)]
pub struct Assembly {
    /// Merged binding registrations
    pub registry: BindingRegistry,
    /// Root resolution context
    pub context: Context,
    /// In-memory schema documents, dependency-first
    pub schemas: Vec<Arc<SchemaDocument>>,
    /// Namespaces whose schema must be loaded from a location
    pub schema_locations: Vec<(String, Location)>,
}

/// Apply configurations and their dependencies, dependency-first
pub fn assemble(roots: &[Arc<dyn BindingConfiguration>]) -> Assembly {
    let mut assembly = Assembly::default();
    for config in resolve_configurations(roots) {
        debug!(namespace = config.namespace(), "applying binding configuration");
        config.configure_bindings(&mut assembly.registry);
        config.configure_context(&mut assembly.context);
        if let Some(schema) = config.schema() {
            assembly.schemas.push(schema);
        } else if let Some(location) = config.schema_location() {
            assembly
                .schema_locations
                .push((config.namespace().to_string(), location));
        }
    }
    assembly
}

type ContextSetup = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Configuration assembled with builder methods
#[derive(Clone)]
pub struct Configuration {
    namespace: String,
    schema: Option<Arc<SchemaDocument>>,
    schema_location: Option<Location>,
    dependencies: Vec<Arc<dyn BindingConfiguration>>,
    registry: BindingRegistry,
    context_setup: Vec<ContextSetup>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("namespace", &self.namespace)
            .field("dependencies", &self.dependencies)
            .field("bindings", &self.registry.len())
            .finish()
    }
}

impl Configuration {
    /// Create a configuration depending on the XML Schema configuration
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::bare(namespace).with_dependency(Arc::new(crate::xs::XsConfiguration::new()))
    }

    /// Create a configuration without dependencies
    pub fn bare(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            schema: None,
            schema_location: None,
            dependencies: Vec::new(),
            registry: BindingRegistry::new(),
            context_setup: Vec::new(),
        }
    }

    /// Set the in-memory schema document
    pub fn with_schema(mut self, schema: Arc<SchemaDocument>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the schema location
    pub fn with_schema_location(mut self, location: Location) -> Self {
        self.schema_location = Some(location);
        self
    }

    /// Add a dependency
    pub fn with_dependency(mut self, dependency: Arc<dyn BindingConfiguration>) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Register a binding under its target name
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.registry.register(binding);
        self
    }

    /// Register a binding under an explicit name
    pub fn with_binding_as(mut self, name: QName, binding: Binding) -> Self {
        self.registry.register_as(name, binding);
        self
    }

    /// Register a binding factory
    pub fn with_factory<F>(mut self, name: QName, factory: F) -> Self
    where
        F: Fn(&Context) -> Result<Binding> + Send + Sync + 'static,
    {
        self.registry.register_factory(name, factory);
        self
    }

    /// Add a context setup step
    pub fn with_context<F>(mut self, setup: F) -> Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.context_setup.push(Arc::new(setup));
        self
    }
}

impl BindingConfiguration for Configuration {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn schema(&self) -> Option<Arc<SchemaDocument>> {
        self.schema.clone()
    }

    fn schema_location(&self) -> Option<Location> {
        self.schema_location.clone()
    }

    fn dependencies(&self) -> Vec<Arc<dyn BindingConfiguration>> {
        self.dependencies.clone()
    }

    fn configure_bindings(&self, registry: &mut BindingRegistry) {
        registry.merge(&self.registry);
    }

    fn configure_context(&self, context: &mut Context) {
        for setup in &self.context_setup {
            setup(context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtins::XSD_NAMESPACE;

    fn namespaces(configs: &[Arc<dyn BindingConfiguration>]) -> Vec<String> {
        configs.iter().map(|c| c.namespace().to_string()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let base: Arc<dyn BindingConfiguration> = Arc::new(Configuration::new("urn:base"));
        let app: Arc<dyn BindingConfiguration> =
            Arc::new(Configuration::new("urn:app").with_dependency(Arc::clone(&base)));

        let ordered = resolve_configurations(&[app, base]);
        assert_eq!(namespaces(&ordered), vec![XSD_NAMESPACE, "urn:base", "urn:app"]);
    }

    #[test]
    fn test_cycles_are_cut() {
        struct Loop(&'static str, &'static str);
        impl BindingConfiguration for Loop {
            fn namespace(&self) -> &str {
                self.0
            }
            fn dependencies(&self) -> Vec<Arc<dyn BindingConfiguration>> {
                vec![Arc::new(Loop(self.1, self.0))]
            }
            fn configure_bindings(&self, _registry: &mut BindingRegistry) {}
        }

        let ordered = resolve_configurations(&[Arc::new(Loop("urn:a", "urn:b"))]);
        assert_eq!(namespaces(&ordered), vec!["urn:b", "urn:a"]);
    }

    #[test]
    fn test_assemble_merges_bindings_and_context() {
        let config = Configuration::bare("urn:app")
            .with_schema(Arc::new(SchemaDocument::new(Some("urn:app".into()))))
            .with_context(|ctx| ctx.register(7u8));
        let assembly = assemble(&[Arc::new(config)]);

        assert_eq!(assembly.schemas.len(), 1);
        assert!(assembly.schema_locations.is_empty());
        assert_eq!(assembly.context.get::<u8>().as_deref(), Some(&7));

        let with_xs = assemble(&[Arc::new(Configuration::new("urn:app"))]);
        assert!(with_xs.registry.contains(&crate::schema::builtins::xs("int")));
    }
}
