//! Registration phase of a runtime.

use std::{fmt, sync::Arc};

use crate::{
    bindings,
    marshal::{DescriptorTable, ValueType},
    memory::{ManagedHeap, SharedHeap, StaticFieldStorage},
    redirect::{MethodSignature, RedirectContext, RedirectionTableBuilder},
    runtime::{Runtime, RuntimeConfig},
    typesystem::{TypeDefinition, TypeRegistryBuilder, TypeToken},
    Error, Result,
};

/// Registration phase of a [`Runtime`].
///
/// Types and redirections are registered here, single-threaded, at startup.
/// [`build`](Self::build) freezes both tables and hands out the shared,
/// read-only [`Runtime`].
///
/// # Example
///
/// ```rust
/// use crossbind::prelude::*;
///
/// let mut builder = Runtime::builder()?.config(RuntimeConfig::minimal());
/// let counter = builder.register_type(
///     TypeDefinition::class("Demo.Counter").static_field("hits", ElementType::I4),
/// )?;
/// let runtime = builder.build()?;
///
/// let hits = Slot::StaticFieldRef { type_token: counter, field: 0 };
/// assert_eq!(runtime.descriptors().resolve(&hits)?, Slot::from(0));
/// # Ok::<(), crossbind::Error>(())
/// ```
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    types: TypeRegistryBuilder,
    redirections: RedirectionTableBuilder,
    heap: Option<SharedHeap>,
}

impl RuntimeBuilder {
    /// Creates a builder with empty tables.
    #[must_use]
    pub fn new() -> Self {
        RuntimeBuilder {
            config: RuntimeConfig::default(),
            types: TypeRegistryBuilder::new(),
            redirections: RedirectionTableBuilder::new(),
            heap: None,
        }
    }

    /// Creates a builder with the built-in bindings registered.
    ///
    /// # Errors
    ///
    /// Propagates registration errors from [`bindings::initialize`].
    pub fn with_bindings() -> Result<Self> {
        let mut builder = Self::new();
        bindings::initialize(&mut builder.types, &builder.redirections)?;
        Ok(builder)
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses a host-provided object heap instead of a [`ManagedHeap`].
    ///
    /// `max_heap_objects` does not apply to a host heap.
    #[must_use]
    pub fn heap(mut self, heap: SharedHeap) -> Self {
        self.heap = Some(heap);
        self
    }

    /// The type registry being built.
    pub fn types(&mut self) -> &mut TypeRegistryBuilder {
        &mut self.types
    }

    /// The redirection table being built.
    #[must_use]
    pub fn redirections(&self) -> &RedirectionTableBuilder {
        &self.redirections
    }

    /// Registers a type definition.
    ///
    /// # Errors
    ///
    /// Same as [`TypeRegistryBuilder::register`].
    pub fn register_type(&mut self, definition: TypeDefinition) -> Result<TypeToken> {
        self.types.register(definition)
    }

    /// Registers the native value type `T`.
    ///
    /// # Errors
    ///
    /// Same as [`TypeRegistryBuilder::register_value_type`].
    pub fn register_value_type<T: ValueType>(&mut self) -> Result<TypeToken> {
        self.types.register_value_type::<T>()
    }

    /// Registers a redirection.
    ///
    /// # Errors
    ///
    /// Same as [`RedirectionTableBuilder::register`].
    pub fn register_redirection<F>(&self, signature: MethodSignature, trampoline: F) -> Result<()>
    where
        F: Fn(&mut RedirectContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.redirections.register_fn(signature, trampoline)
    }

    /// Freezes the tables and creates the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Error`] if the configured stack capacity is zero.
    pub fn build(self) -> Result<Runtime> {
        if self.config.stack_capacity == 0 {
            return Err(Error::Error(
                "stack capacity must be at least one slot".to_string(),
            ));
        }

        let heap = self
            .heap
            .unwrap_or_else(|| Arc::new(ManagedHeap::new(self.config.max_heap_objects)));
        let types = Arc::new(self.types.freeze());
        let redirections = self
            .redirections
            .freeze()
            .with_tracing(self.config.trace_redirections);

        log::debug!(
            "runtime built: {} type(s), {} redirection(s), frame capacity {}",
            types.len(),
            redirections.len(),
            self.config.stack_capacity
        );

        Ok(Runtime {
            descriptors: DescriptorTable::new(types, heap, Arc::new(StaticFieldStorage::new())),
            redirections,
            config: self.config,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("config", &self.config)
            .field("types", &self.types.len())
            .field("redirections", &self.redirections.len())
            .field("host_heap", &self.heap.is_some())
            .finish()
    }
}
