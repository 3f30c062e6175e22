//! Binding resolution
//!
//! The [`BindingWalker`] computes, for an element or attribute declaration,
//! the ordered [`ExecutionChain`] of bindings that apply to it:
//!
//! 1. The declaration's type hierarchy is walked, most derived type first.
//!    Each type's binding key is looked up in the registry and found
//!    bindings are appended. An `Override` binding clears the list, is kept
//!    alone, and stops the walk.
//! 2. A binding registered under the declaration's own name is then put at
//!    the front of the list, or replaces the whole list if it is an
//!    `Override` binding.
//!
//! Chains are cached per (declaration, type, container) identity and schema
//! generation, in a bounded LRU; a dropped entry is recomputed identically.
//! Executing a chain visits non-`After` bindings in order and defers
//! `After` bindings to a stack that is unwound once the list is exhausted.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use tracing::{debug, trace};

use super::context::Context;
use super::registry::BindingRegistry;
use super::{Binding, ExecutionMode};
use crate::config::DEFAULT_CHAIN_CACHE_CAPACITY;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::schema::components::{ComponentId, Declaration, TypeDefinition};
use crate::schema::hierarchy::TypeWalker;
use crate::schema::index::SchemaIndex;

/// One resolved binding and the key it was found under
#[derive(Debug, Clone)]
pub struct ChainLink {
    /// Registry key the binding was loaded from
    pub key: QName,
    /// The binding as loaded at resolution time
    pub binding: Binding,
}

/// Receives the bindings of a chain in execution order
pub trait BindingVisitor {
    /// Visit one binding
    fn visit(&mut self, binding: &Binding) -> Result<()>;
}

impl<F> BindingVisitor for F
where
    F: FnMut(&Binding) -> Result<()>,
{
    fn visit(&mut self, binding: &Binding) -> Result<()> {
        self(binding)
    }
}

/// Ordered, immutable list of bindings resolved for one declaration
#[derive(Debug, Clone, Default)]
pub struct ExecutionChain {
    links: Vec<ChainLink>,
}

impl ExecutionChain {
    /// Create a chain from resolved links
    pub fn new(links: Vec<ChainLink>) -> Self {
        Self { links }
    }

    /// Links in resolution order
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Registry keys in resolution order
    pub fn keys(&self) -> Vec<QName> {
        self.links.iter().map(|l| l.key.clone()).collect()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Check for an empty chain
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Re-load every binding against `context`
    ///
    /// Factory registrations produce fresh bindings for the scope; keys no
    /// longer registered keep the binding loaded at resolution time.
    pub fn instantiate(&self, registry: &BindingRegistry, context: &Context) -> Result<ExecutionChain> {
        let links = self
            .links
            .iter()
            .map(|link| {
                let binding = registry
                    .load(&link.key, context)?
                    .unwrap_or_else(|| link.binding.clone());
                Ok(ChainLink {
                    key: link.key.clone(),
                    binding,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ExecutionChain { links })
    }

    /// Bindings in the order they execute
    pub fn execution_order(&self) -> Vec<&Binding> {
        let mut order = Vec::with_capacity(self.links.len());
        let mut deferred = Vec::new();
        for link in &self.links {
            if link.binding.execution_mode() == ExecutionMode::After {
                deferred.push(&link.binding);
            } else {
                order.push(&link.binding);
            }
        }
        while let Some(binding) = deferred.pop() {
            order.push(binding);
        }
        order
    }

    /// Visit the bindings in execution order
    pub fn execute<V: BindingVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        let mut deferred: Vec<&Binding> = Vec::new();
        for link in &self.links {
            if link.binding.execution_mode() == ExecutionMode::After {
                deferred.push(&link.binding);
            } else {
                visitor.visit(&link.binding)?;
            }
        }
        while let Some(binding) = deferred.pop() {
            visitor.visit(binding)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ChainKey {
    component: ComponentId,
    type_id: Option<ComponentId>,
    container: Option<ComponentId>,
    generation: u64,
}

/// Resolves and caches binding chains
pub struct BindingWalker {
    index: Arc<SchemaIndex>,
    registry: Arc<BindingRegistry>,
    cache: Mutex<LruCache<ChainKey, Arc<ExecutionChain>>>,
}

impl std::fmt::Debug for BindingWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingWalker")
            .field("registry", &self.registry)
            .field("cached_chains", &self.cached_chains())
            .finish()
    }
}

impl BindingWalker {
    /// Create a walker with the default cache capacity
    pub fn new(index: Arc<SchemaIndex>, registry: Arc<BindingRegistry>) -> Self {
        Self::with_capacity(index, registry, DEFAULT_CHAIN_CACHE_CAPACITY)
    }

    /// Create a walker with a custom cache capacity
    pub fn with_capacity(index: Arc<SchemaIndex>, registry: Arc<BindingRegistry>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            index,
            registry,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The schema index
    pub fn index(&self) -> &Arc<SchemaIndex> {
        &self.index
    }

    /// The binding registry
    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    /// Number of cached chains
    pub fn cached_chains(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop every cached chain
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Resolve the chain for a declaration with its declared type
    pub fn resolve(
        &self,
        declaration: &Declaration,
        container: Option<&TypeDefinition>,
        context: &Context,
    ) -> Result<Arc<ExecutionChain>> {
        self.resolve_with_type(declaration, None, container, context)
    }

    /// Resolve the chain for a declaration, optionally with a substituted type
    ///
    /// `type_definition` replaces the declared type (xsi:type); `container`
    /// is the type whose content model declared the component and names
    /// nested anonymous types.
    pub fn resolve_with_type(
        &self,
        declaration: &Declaration,
        type_definition: Option<&Arc<TypeDefinition>>,
        container: Option<&TypeDefinition>,
        context: &Context,
    ) -> Result<Arc<ExecutionChain>> {
        let key = ChainKey {
            component: declaration.id(),
            type_id: type_definition.map(|t| t.id),
            container: container.map(|c| c.id),
            generation: self.index.generation(),
        };

        if let Some(chain) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(Arc::clone(chain));
        }

        let chain = Arc::new(self.compute(declaration, type_definition, container, context)?);
        trace!(
            component = %declaration.name(),
            chain = ?chain.keys().iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            "resolved binding chain"
        );

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, Arc::clone(&chain));
        Ok(chain)
    }

    fn compute(
        &self,
        declaration: &Declaration,
        type_definition: Option<&Arc<TypeDefinition>>,
        container: Option<&TypeDefinition>,
        context: &Context,
    ) -> Result<ExecutionChain> {
        let declared_type = match type_definition {
            Some(def) => Some(Arc::clone(def)),
            None => match declaration {
                Declaration::Element(e) => self.index.element_type(e),
                Declaration::Attribute(a) => self.index.attribute_type(a),
            },
        };

        let mut links: Vec<ChainLink> = Vec::new();
        let mut overridden = false;
        let mut failure: Option<Error> = None;

        if let Some(ref start) = declared_type {
            let walker = TypeWalker::new(&self.index);
            walker.walk(start, |def| {
                let Some(key) = walker.binding_key(def, container) else {
                    debug!(type_name = %def.display_name(), "no binding key for anonymous type");
                    return true;
                };
                match self.registry.load(&key, context) {
                    Ok(Some(binding)) => {
                        let mode = binding.execution_mode();
                        if mode == ExecutionMode::Override {
                            links.clear();
                            links.push(ChainLink { key, binding });
                            overridden = true;
                            return false;
                        }
                        links.push(ChainLink { key, binding });
                        true
                    }
                    Ok(None) => true,
                    Err(e) => {
                        failure = Some(e);
                        false
                    }
                }
            });
        } else {
            debug!(component = %declaration.name(), "declaration type not found");
        }

        if let Some(e) = failure {
            return Err(e);
        }

        let own_name = declaration.name().clone();
        if let Some(binding) = self.registry.load(&own_name, context)? {
            if binding.execution_mode() == ExecutionMode::Override {
                links = vec![ChainLink { key: own_name, binding }];
            } else if !overridden && !links.iter().any(|l| l.key == own_name) {
                links.insert(0, ChainLink { key: own_name, binding });
            }
        }

        Ok(ExecutionChain::new(links))
    }

    /// Resolve a chain, instantiate it in `context` and execute it
    pub fn walk<V: BindingVisitor + ?Sized>(
        &self,
        declaration: &Declaration,
        type_definition: Option<&Arc<TypeDefinition>>,
        container: Option<&TypeDefinition>,
        context: &Context,
        visitor: &mut V,
    ) -> Result<()> {
        let chain = self.resolve_with_type(declaration, type_definition, container, context)?;
        chain.instantiate(&self.registry, context)?.execute(visitor)
    }
}
