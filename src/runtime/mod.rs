//! Process-level wiring of the marshalling core.
//!
//! A [`Runtime`] owns the frozen type registry, the object heap, static
//! storage and the frozen redirection table, and hands out frames and
//! marshallers configured by its [`RuntimeConfig`]. It is built once at
//! startup through a [`RuntimeBuilder`] and then shared (typically behind an
//! `Arc`) by every interpreter thread; each thread creates its own frames.
//!
//! # Example
//!
//! ```rust
//! use crossbind::prelude::*;
//!
//! let runtime = Runtime::builder()?.build()?;
//! let jint = runtime.types().token_of::<ObscuredInt>()?;
//! let add = MethodSignature::new(
//!     jint,
//!     "op_Addition",
//!     [ElementType::ValueType(jint), ElementType::ValueType(jint)],
//! );
//!
//! let mut frame = runtime.new_frame();
//! runtime.marshaller().push_value(&mut frame, &ObscuredInt::new(40))?;
//! runtime.marshaller().push_value(&mut frame, &ObscuredInt::new(2))?;
//!
//! let outcome = runtime.invoke(&add, &mut frame)?;
//! assert!(outcome.is_redirected());
//!
//! let sum: ObscuredInt = runtime.marshaller().pop_value(&mut frame)?;
//! assert_eq!(sum.value(), 42);
//! # Ok::<(), crossbind::Error>(())
//! ```

mod builder;
mod config;

pub use builder::RuntimeBuilder;
pub use config::RuntimeConfig;

use crate::{
    marshal::{DescriptorTable, Marshaller},
    memory::{ObjectHeap, StackFrame, StaticFieldStorage},
    redirect::{MethodSignature, RedirectOutcome, RedirectionTable},
    typesystem::TypeRegistry,
    Result,
};

/// Frozen marshalling runtime.
#[derive(Debug)]
pub struct Runtime {
    descriptors: DescriptorTable,
    redirections: RedirectionTable,
    config: RuntimeConfig,
}

impl Runtime {
    /// Starts a builder with the built-in bindings registered.
    ///
    /// # Errors
    ///
    /// Same as [`RuntimeBuilder::with_bindings`].
    pub fn builder() -> Result<RuntimeBuilder> {
        RuntimeBuilder::with_bindings()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The frozen type registry.
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        self.descriptors.types()
    }

    /// The descriptor table.
    #[must_use]
    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    /// The object heap.
    #[must_use]
    pub fn heap(&self) -> &dyn ObjectHeap {
        self.descriptors.heap()
    }

    /// Static field storage.
    #[must_use]
    pub fn statics(&self) -> &StaticFieldStorage {
        self.descriptors.statics()
    }

    /// The frozen redirection table.
    #[must_use]
    pub fn redirections(&self) -> &RedirectionTable {
        &self.redirections
    }

    /// A marshaller honouring the configured write-back mode.
    #[must_use]
    pub fn marshaller(&self) -> Marshaller<'_> {
        Marshaller::new(&self.descriptors).with_strict_write_back(self.config.strict_write_back)
    }

    /// Creates an empty frame with the configured capacity.
    #[must_use]
    pub fn new_frame(&self) -> StackFrame {
        StackFrame::new(self.config.stack_capacity)
    }

    /// Creates a frame with `locals` local slots.
    ///
    /// # Errors
    ///
    /// Same as [`StackFrame::with_locals`].
    pub fn new_frame_with_locals(&self, locals: usize) -> Result<StackFrame> {
        StackFrame::with_locals(self.config.stack_capacity, locals)
    }

    /// Runs the redirection for `signature` on `frame`, if any.
    ///
    /// # Errors
    ///
    /// Same as [`RedirectionTable::invoke`].
    pub fn invoke(
        &self,
        signature: &MethodSignature,
        frame: &mut StackFrame,
    ) -> Result<RedirectOutcome> {
        self.redirections.invoke(signature, frame, self.marshaller())
    }
}
