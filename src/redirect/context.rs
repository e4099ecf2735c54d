//! Trampolines and the context they run in.

use std::sync::Arc;

use crate::{
    marshal::{FieldCodec, FieldSink, FieldSource, Marshaller, ValueType},
    memory::StackFrame,
    redirect::MethodSignature,
    value::Slot,
    MarshalError, Result,
};

/// Native implementation of a redirected method.
///
/// A trampoline pops its operands (arguments in reverse order, then `this`
/// for instance methods) from the context's frame, performs the computation
/// and pushes its result, if any.
pub type Trampoline = Arc<dyn Fn(&mut RedirectContext<'_>) -> Result<()> + Send + Sync>;

/// Result of [`RedirectionTable::invoke`](crate::RedirectionTable::invoke).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// No trampoline is registered; the interpreter runs the bytecode.
    NotRedirected,
    /// The trampoline ran.
    Redirected {
        /// Top-of-stack position after the call.
        top: usize,
    },
}

impl RedirectOutcome {
    /// Returns `true` if a trampoline handled the call.
    #[must_use]
    pub fn is_redirected(&self) -> bool {
        matches!(self, RedirectOutcome::Redirected { .. })
    }
}

/// State handed to a [`Trampoline`].
///
/// Wraps the caller's frame and a [`Marshaller`] and offers typed pops and
/// pushes for the two operand shapes a redirected method sees: value types
/// (as value-type handles, boxes or references) and scalars (primitives or
/// object handles in a single slot).
///
/// # Example
///
/// ```rust
/// use crossbind::prelude::*;
///
/// fn max(ctx: &mut RedirectContext<'_>) -> crossbind::Result<()> {
///     let b: i32 = ctx.pop_scalar()?;
///     let a: i32 = ctx.pop_scalar()?;
///     ctx.push_scalar(a.max(b))
/// }
/// # let _ = max;
/// ```
pub struct RedirectContext<'a> {
    signature: &'a MethodSignature,
    frame: &'a mut StackFrame,
    marshaller: Marshaller<'a>,
}

impl<'a> RedirectContext<'a> {
    /// Creates a context for one invocation.
    pub fn new(
        signature: &'a MethodSignature,
        frame: &'a mut StackFrame,
        marshaller: Marshaller<'a>,
    ) -> Self {
        RedirectContext {
            signature,
            frame,
            marshaller,
        }
    }

    /// Signature being invoked.
    #[must_use]
    pub fn signature(&self) -> &MethodSignature {
        self.signature
    }

    /// The caller's frame.
    pub fn frame(&mut self) -> &mut StackFrame {
        &mut *self.frame
    }

    /// The marshaller.
    #[must_use]
    pub fn marshaller(&self) -> Marshaller<'a> {
        self.marshaller
    }

    /// Pops a value-type operand, see [`Marshaller::pop_value`].
    ///
    /// # Errors
    ///
    /// Same as [`Marshaller::pop_value`].
    pub fn pop<T: ValueType>(&mut self) -> Result<T> {
        self.marshaller.pop_value(self.frame)
    }

    /// Pushes a value-type result, see [`Marshaller::push_value`].
    ///
    /// # Errors
    ///
    /// Same as [`Marshaller::push_value`].
    pub fn push<T: ValueType>(&mut self, value: &T) -> Result<()> {
        self.marshaller.push_value(self.frame, value)
    }

    /// Pops a single-slot operand, resolving it first if it is a reference.
    ///
    /// # Errors
    ///
    /// [`MarshalError::StackUnderflow`], the resolution errors, or
    /// [`MarshalError::SlotTypeMismatch`] if the slot does not decode as `P`.
    pub fn pop_scalar<P: FieldCodec>(&mut self) -> Result<P> {
        let slot = self.frame.pop()?;
        let resolved = self.marshaller.resolve(&slot)?;
        P::load(&mut FieldSource::new(&[resolved]))
    }

    /// Pushes a single-slot result.
    ///
    /// # Errors
    ///
    /// [`MarshalError::StackOverflow`], or [`MarshalError::IndexOutOfRange`] if
    /// `P` does not fit in one slot.
    pub fn push_scalar<P: FieldCodec>(&mut self, value: P) -> Result<()> {
        let mut slot = [Slot::default()];
        value.store(&mut FieldSink::new(&mut slot))?;
        self.frame.push(slot[0])
    }

    /// Commits a value-type result to the `this` operand on top of the frame
    /// and pops it. Used by value-type constructors.
    ///
    /// # Errors
    ///
    /// Same as [`Marshaller::write_back`].
    pub fn construct<T: ValueType>(&mut self, value: &T) -> Result<()> {
        self.marshaller.write_back(self.frame, -1, value)?;
        self.frame.pop()?;
        Ok(())
    }

    /// Builds a [`MarshalError::TrampolineFailed`] for the current signature.
    #[must_use]
    pub fn fail(&self, message: impl Into<String>) -> crate::Error {
        MarshalError::TrampolineFailed {
            signature: self.signature.to_string(),
            message: message.into(),
        }
        .into()
    }
}
