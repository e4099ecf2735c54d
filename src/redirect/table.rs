//! Two-phase redirection table.

use std::{fmt, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap, ReadOnlyView};
use sha1::{Digest, Sha1};

use crate::{
    marshal::Marshaller,
    memory::StackFrame,
    redirect::{MethodSignature, RedirectContext, RedirectOutcome, Trampoline},
    MarshalError, Result,
};

/// Redirection table in its registration phase.
///
/// Registration takes `&self`, so per-type binding functions can share the
/// builder. [`freeze`](Self::freeze) consumes it and yields the read-only
/// [`RedirectionTable`].
///
/// # Example
///
/// ```rust
/// use crossbind::{ElementType, MarshalError, MethodSignature, RedirectionTableBuilder, TypeToken};
///
/// let builder = RedirectionTableBuilder::new();
/// let signature = MethodSignature::new(TypeToken::from_row(1), "Max", [ElementType::I4, ElementType::I4]);
///
/// builder.register_fn(signature.clone(), |ctx| {
///     let b: i32 = ctx.pop_scalar()?;
///     let a: i32 = ctx.pop_scalar()?;
///     ctx.push_scalar(a.max(b))
/// })?;
///
/// let duplicate = builder.register_fn(signature, |_| Ok(()));
/// assert!(matches!(
///     duplicate.unwrap_err().as_marshal(),
///     Some(MarshalError::DuplicateRedirection { .. })
/// ));
///
/// let table = builder.freeze();
/// assert_eq!(table.len(), 1);
/// # Ok::<(), crossbind::Error>(())
/// ```
pub struct RedirectionTableBuilder {
    entries: DashMap<MethodSignature, Trampoline>,
    order: boxcar::Vec<MethodSignature>,
}

impl RedirectionTableBuilder {
    /// Creates an empty table in the registration phase.
    #[must_use]
    pub fn new() -> Self {
        RedirectionTableBuilder {
            entries: DashMap::new(),
            order: boxcar::Vec::new(),
        }
    }

    /// Registers a trampoline for `signature`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::DuplicateRedirection`] if the signature is
    /// already registered. The first registration is kept.
    pub fn register(&self, signature: MethodSignature, trampoline: Trampoline) -> Result<()> {
        match self.entries.entry(signature) {
            Entry::Occupied(entry) => Err(MarshalError::DuplicateRedirection {
                signature: entry.key().to_string(),
            }
            .into()),
            Entry::Vacant(entry) => {
                log::debug!("registered redirection {}", entry.key());
                self.order.push(entry.key().clone());
                entry.insert(trampoline);
                Ok(())
            }
        }
    }

    /// Registers a closure as the trampoline for `signature`.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_fn<F>(&self, signature: MethodSignature, trampoline: F) -> Result<()>
    where
        F: Fn(&mut RedirectContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(signature, Arc::new(trampoline))
    }

    /// Returns `true` if `signature` is registered.
    #[must_use]
    pub fn contains(&self, signature: &MethodSignature) -> bool {
        self.entries.contains_key(signature)
    }

    /// Number of registered redirections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ends the registration phase.
    #[must_use]
    pub fn freeze(self) -> RedirectionTable {
        log::debug!("redirection table frozen with {} entries", self.entries.len());
        RedirectionTable {
            entries: self.entries.into_read_only(),
            order: self.order.iter().map(|(_, signature)| signature.clone()).collect(),
            trace: false,
        }
    }
}

impl Default for RedirectionTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RedirectionTableBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectionTableBuilder")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Frozen, read-only redirection table.
///
/// Lookups are lock-free and the table is shared by every interpreter thread.
pub struct RedirectionTable {
    entries: ReadOnlyView<MethodSignature, Trampoline>,
    order: Vec<MethodSignature>,
    trace: bool,
}

impl RedirectionTable {
    /// Logs every redirected invocation at trace level when enabled.
    #[must_use]
    pub fn with_tracing(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Number of registered redirections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `signature` is redirected.
    #[must_use]
    pub fn contains(&self, signature: &MethodSignature) -> bool {
        self.entries.contains_key(signature)
    }

    /// Registered signatures in registration order.
    pub fn signatures(&self) -> impl Iterator<Item = &MethodSignature> {
        self.order.iter()
    }

    /// SHA-1 digest over the registered signatures, in registration order.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 20] {
        let mut hasher = Sha1::new();
        for signature in &self.order {
            hasher.update(signature.to_string().as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let mut fingerprint = [0u8; 20];
        fingerprint.copy_from_slice(&digest);
        fingerprint
    }

    /// Runs the trampoline registered for `signature` on `frame`.
    ///
    /// Returns [`RedirectOutcome::NotRedirected`] for an unknown signature, in
    /// which case the frame is untouched and the interpreter executes the
    /// method's bytecode instead.
    ///
    /// # Errors
    ///
    /// - [`MarshalError::StackUnderflow`] if the frame holds fewer operands
    ///   than the signature's arity
    /// - any error the trampoline returns
    pub fn invoke(
        &self,
        signature: &MethodSignature,
        frame: &mut StackFrame,
        marshaller: Marshaller<'_>,
    ) -> Result<RedirectOutcome> {
        let Some(trampoline) = self.entries.get(signature) else {
            return Ok(RedirectOutcome::NotRedirected);
        };

        if frame.depth() < signature.arity() {
            return Err(MarshalError::StackUnderflow.into());
        }

        if self.trace {
            log::trace!(
                "redirect {} (depth {}, reserved {})",
                signature,
                frame.depth(),
                frame.reserved()
            );
        }

        let mut context = RedirectContext::new(signature, frame, marshaller);
        trampoline(&mut context)?;
        Ok(RedirectOutcome::Redirected { top: frame.top() })
    }
}

impl fmt::Debug for RedirectionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectionTable")
            .field("entries", &self.entries.len())
            .field("trace", &self.trace)
            .finish()
    }
}
