//! Interpreter stack frame with operand and value-type regions.
//!
//! A [`StackFrame`] is a fixed-capacity window of [`Slot`]s owned by a single
//! interpreted call. The frame is split into three regions:
//!
//! ```text
//!  0          locals            top              capacity - reserved     capacity
//!  | locals... | operands...  -> |   free   | <- value-type spans... |
//! ```
//!
//! Locals sit at the frame base, operands grow upward from the end of the
//! locals, and value-type spans are reserved downward from the capacity end.
//! The two growing regions share the free space between them, so a push fails
//! with [`MarshalError::StackOverflow`] when `top + reserved == capacity`.
//!
//! Value-type spans are released in LIFO order. [`StackFrame::scoped_value_type`]
//! returns a [`ValueTypeScope`] guard that releases the span when dropped, so
//! early returns and `?` propagation cannot leak a reservation.

use std::ops::{Deref, DerefMut};

use crate::{
    typesystem::TypeDescriptor,
    value::{Slot, ValueTypeHandle},
    MarshalError, Result,
};

/// Operand stack of one interpreted call.
///
/// # Example
///
/// ```rust
/// use crossbind::{Slot, StackFrame};
///
/// let mut frame = StackFrame::new(4);
/// frame.push(Slot::from(1))?;
/// frame.push(Slot::from(2))?;
///
/// assert_eq!(frame.at(-1)?, Slot::from(2));
/// assert_eq!(frame.at(0)?, Slot::from(1));
/// assert_eq!(frame.pop()?, Slot::from(2));
/// assert_eq!(frame.depth(), 1);
/// # Ok::<(), crossbind::Error>(())
/// ```
#[derive(Debug)]
pub struct StackFrame {
    slots: Vec<Slot>,
    locals: usize,
    top: usize,
    reserved: usize,
    reservations: Vec<usize>,
}

impl StackFrame {
    /// Creates an empty frame holding at most `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        StackFrame {
            slots: vec![Slot::default(); capacity],
            locals: 0,
            top: 0,
            reserved: 0,
            reservations: Vec::new(),
        }
    }

    /// Creates a frame whose first `locals` slots form a locals area.
    ///
    /// Locals start as primitive zero and are addressed with
    /// [`local`](Self::local) and [`set_local`](Self::set_local); operands are
    /// pushed above them.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::StackOverflow`] if `locals` exceeds `capacity`.
    pub fn with_locals(capacity: usize, locals: usize) -> Result<Self> {
        if locals > capacity {
            return Err(MarshalError::StackOverflow { capacity }.into());
        }
        let mut frame = Self::new(capacity);
        frame.locals = locals;
        frame.top = locals;
        Ok(frame)
    }

    /// Total slot capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Absolute index one past the topmost operand.
    #[must_use]
    pub fn top(&self) -> usize {
        self.top
    }

    /// Number of operands above the locals area.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.top - self.locals
    }

    /// Returns `true` if no operands are on the stack.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top == self.locals
    }

    /// Number of locals.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.locals
    }

    /// Number of slots held by value-type reservations.
    #[must_use]
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Number of outstanding value-type reservations.
    #[must_use]
    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// Slots still available to pushes and reservations.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.capacity() - self.top - self.reserved
    }

    /// Pushes an operand.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::StackOverflow`] if the frame is full.
    pub fn push(&mut self, slot: Slot) -> Result<()> {
        if self.free_slots() == 0 {
            return Err(MarshalError::StackOverflow {
                capacity: self.capacity(),
            }
            .into());
        }
        self.slots[self.top] = slot;
        self.top += 1;
        Ok(())
    }

    /// Pops the topmost operand.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::StackUnderflow`] if no operands are on the stack.
    pub fn pop(&mut self) -> Result<Slot> {
        if self.is_empty() {
            return Err(MarshalError::StackUnderflow.into());
        }
        self.top -= 1;
        Ok(std::mem::take(&mut self.slots[self.top]))
    }

    /// Returns the topmost operand without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::StackUnderflow`] if no operands are on the stack.
    pub fn peek(&self) -> Result<Slot> {
        self.at(-1)
    }

    /// Reads a slot by offset.
    ///
    /// Negative offsets count back from the top (`-1` is the topmost operand);
    /// non-negative offsets count up from the frame base, locals included.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::StackUnderflow`] for a negative offset below the
    /// frame base, [`MarshalError::IndexOutOfRange`] for a non-negative offset
    /// at or above the top.
    pub fn at(&self, offset: isize) -> Result<Slot> {
        let index = self.index_of(offset)?;
        Ok(self.slots[index])
    }

    /// Overwrites a slot by offset, addressed as in [`at`](Self::at).
    ///
    /// # Errors
    ///
    /// Same as [`at`](Self::at).
    pub fn set_at(&mut self, offset: isize, slot: Slot) -> Result<()> {
        let index = self.index_of(offset)?;
        self.slots[index] = slot;
        Ok(())
    }

    /// Reads local `index`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::IndexOutOfRange`] if the frame has no such local.
    pub fn local(&self, index: usize) -> Result<Slot> {
        self.check_local(index)?;
        Ok(self.slots[index])
    }

    /// Writes local `index`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::IndexOutOfRange`] if the frame has no such local.
    pub fn set_local(&mut self, index: usize, slot: Slot) -> Result<()> {
        self.check_local(index)?;
        self.slots[index] = slot;
        Ok(())
    }

    /// Reserves a span for a value of type `descriptor` below the previous
    /// reservation and returns a [`Slot::ValueType`] handle to it.
    ///
    /// The span is initialised with the type's default slots, nested value
    /// types included.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::StackOverflow`] if the free region is smaller than
    /// the type's slot count.
    pub fn alloc_value_type(&mut self, descriptor: &TypeDescriptor) -> Result<Slot> {
        let slot_count = descriptor.slot_count;
        if slot_count > self.free_slots() {
            return Err(MarshalError::StackOverflow {
                capacity: self.capacity(),
            }
            .into());
        }

        let base = self.capacity() - self.reserved - slot_count;
        let span = &mut self.slots[base..base + slot_count];
        if descriptor.default_slots.len() == slot_count {
            span.copy_from_slice(&descriptor.default_slots);
        } else {
            span.fill(Slot::default());
        }

        self.reserved += slot_count;
        self.reservations.push(base);
        Ok(Slot::ValueType(ValueTypeHandle {
            type_token: descriptor.token,
            base,
            slot_count,
        }))
    }

    /// Releases the most recent value-type reservation.
    ///
    /// # Errors
    ///
    /// - [`MarshalError::UnsupportedSlotKind`] if `slot` is not a value-type handle
    /// - [`MarshalError::InvalidValueTypeRelease`] if `slot` is not the most
    ///   recent reservation (`expected` is the frame capacity when nothing is
    ///   reserved)
    pub fn free_value_type(&mut self, slot: &Slot) -> Result<()> {
        let Slot::ValueType(handle) = slot else {
            return Err(MarshalError::UnsupportedSlotKind {
                operation: "free value type",
                kind: slot.kind(),
            }
            .into());
        };

        self.check_release(handle)?;
        self.reservations.pop();
        self.reserved -= handle.slot_count;
        Ok(())
    }

    /// Checks that `handle` is the most recent reservation, without
    /// releasing it.
    ///
    /// # Errors
    ///
    /// [`MarshalError::InvalidValueTypeRelease`] as in
    /// [`free_value_type`](Self::free_value_type).
    pub fn check_release(&self, handle: &ValueTypeHandle) -> Result<()> {
        match self.reservations.last() {
            Some(&base) if base == handle.base => Ok(()),
            last => Err(MarshalError::InvalidValueTypeRelease {
                expected: last.copied().unwrap_or(self.capacity()),
                found: handle.base,
            }
            .into()),
        }
    }

    /// Reserves a value-type span that is released when the guard drops.
    ///
    /// # Errors
    ///
    /// Same as [`alloc_value_type`](Self::alloc_value_type).
    ///
    /// # Example
    ///
    /// ```rust
    /// use crossbind::{ElementType, StackFrame, TypeDefinition, TypeLookup, TypeRegistryBuilder};
    ///
    /// let mut types = TypeRegistryBuilder::new();
    /// let pair = types.register(
    ///     TypeDefinition::value_type("Demo.Pair")
    ///         .field("a", ElementType::I4)
    ///         .field("b", ElementType::I4),
    /// )?;
    /// let descriptor = types.require(pair)?;
    ///
    /// let mut frame = StackFrame::new(8);
    /// {
    ///     let scope = frame.scoped_value_type(&descriptor)?;
    ///     assert_eq!(scope.reserved(), 2);
    /// }
    /// assert_eq!(frame.reserved(), 0);
    /// # Ok::<(), crossbind::Error>(())
    /// ```
    pub fn scoped_value_type(&mut self, descriptor: &TypeDescriptor) -> Result<ValueTypeScope<'_>> {
        let handle = self.alloc_value_type(descriptor)?;
        Ok(ValueTypeScope {
            frame: self,
            handle,
        })
    }

    /// Returns the slots of a live value-type span.
    ///
    /// # Errors
    ///
    /// [`MarshalError::IndexOutOfRange`] if the handle does not lie inside the
    /// reserved region of this frame.
    pub fn value_span(&self, handle: &ValueTypeHandle) -> Result<&[Slot]> {
        self.check_span(handle)?;
        Ok(&self.slots[handle.base..handle.base + handle.slot_count])
    }

    /// Returns the slots of a live value-type span for writing.
    ///
    /// # Errors
    ///
    /// Same as [`value_span`](Self::value_span).
    pub fn value_span_mut(&mut self, handle: &ValueTypeHandle) -> Result<&mut [Slot]> {
        self.check_span(handle)?;
        Ok(&mut self.slots[handle.base..handle.base + handle.slot_count])
    }

    /// Returns `count` consecutive slots starting at absolute index `start`.
    ///
    /// The range may lie in the locals/operand region or inside a reservation.
    ///
    /// # Errors
    ///
    /// [`MarshalError::IndexOutOfRange`] if the range touches the free region.
    pub fn slots(&self, start: usize, count: usize) -> Result<&[Slot]> {
        self.check_range(start, count)?;
        Ok(&self.slots[start..start + count])
    }

    /// Mutable form of [`slots`](Self::slots).
    ///
    /// # Errors
    ///
    /// Same as [`slots`](Self::slots).
    pub fn slots_mut(&mut self, start: usize, count: usize) -> Result<&mut [Slot]> {
        self.check_range(start, count)?;
        Ok(&mut self.slots[start..start + count])
    }

    /// Returns `count` slots starting at absolute index `start` for writing,
    /// raising the top to cover them if they extend past it.
    ///
    /// This is how a value is laid out directly at a base-relative position
    /// (for example into locals, or at offset 0 of an empty frame). A range
    /// inside a value-type reservation is returned as is.
    ///
    /// # Errors
    ///
    /// - [`MarshalError::StackOverflow`] if the range would run into the
    ///   reserved region
    /// - [`MarshalError::IndexOutOfRange`] if a range starting inside the
    ///   reserved region runs past the capacity, or `start + count` overflows
    pub fn claim(&mut self, start: usize, count: usize) -> Result<&mut [Slot]> {
        let end = self.range_end(start, count)?;
        let reserved_start = self.capacity() - self.reserved;
        if start >= reserved_start && count > 0 {
            self.check_range(start, count)?;
        } else if end > reserved_start {
            return Err(MarshalError::StackOverflow {
                capacity: self.capacity(),
            }
            .into());
        } else if end > self.top {
            self.top = end;
        }
        Ok(&mut self.slots[start..end])
    }

    fn index_of(&self, offset: isize) -> Result<usize> {
        if offset < 0 {
            let back = offset.unsigned_abs();
            if back > self.top {
                return Err(MarshalError::StackUnderflow.into());
            }
            Ok(self.top - back)
        } else {
            let index = offset.unsigned_abs();
            if index >= self.top {
                return Err(MarshalError::IndexOutOfRange {
                    index,
                    length: self.top,
                }
                .into());
            }
            Ok(index)
        }
    }

    fn check_local(&self, index: usize) -> Result<()> {
        if index >= self.locals {
            return Err(MarshalError::IndexOutOfRange {
                index,
                length: self.locals,
            }
            .into());
        }
        Ok(())
    }

    fn check_span(&self, handle: &ValueTypeHandle) -> Result<()> {
        let reserved_start = self.capacity() - self.reserved;
        let end = self.range_end(handle.base, handle.slot_count)?;
        if handle.base < reserved_start || end > self.capacity() {
            return Err(MarshalError::IndexOutOfRange {
                index: handle.base,
                length: self.capacity(),
            }
            .into());
        }
        Ok(())
    }

    fn check_range(&self, start: usize, count: usize) -> Result<()> {
        let end = self.range_end(start, count)?;
        let in_stack = end <= self.top;
        let in_reserved = start >= self.capacity() - self.reserved && end <= self.capacity();
        if !(in_stack || in_reserved) {
            return Err(MarshalError::IndexOutOfRange {
                index: end.saturating_sub(1),
                length: self.capacity(),
            }
            .into());
        }
        Ok(())
    }

    fn range_end(&self, start: usize, count: usize) -> Result<usize> {
        start.checked_add(count).ok_or_else(|| {
            MarshalError::IndexOutOfRange {
                index: start,
                length: self.capacity(),
            }
            .into()
        })
    }
}

impl Drop for StackFrame {
    fn drop(&mut self) {
        if !self.reservations.is_empty() {
            log::warn!(
                "stack frame dropped with {} outstanding value-type reservation(s) ({} slot(s))",
                self.reservations.len(),
                self.reserved
            );
        }
    }
}

/// Guard over a value-type reservation.
///
/// Dereferences to the owning [`StackFrame`] so the span can be filled and
/// read while the guard is alive. Dropping the guard releases the span.
#[derive(Debug)]
pub struct ValueTypeScope<'frame> {
    frame: &'frame mut StackFrame,
    handle: Slot,
}

impl ValueTypeScope<'_> {
    /// The [`Slot::ValueType`] handle of the reserved span.
    #[must_use]
    pub fn handle(&self) -> Slot {
        self.handle
    }
}

impl Deref for ValueTypeScope<'_> {
    type Target = StackFrame;

    fn deref(&self) -> &StackFrame {
        self.frame
    }
}

impl DerefMut for ValueTypeScope<'_> {
    fn deref_mut(&mut self) -> &mut StackFrame {
        self.frame
    }
}

impl Drop for ValueTypeScope<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.frame.free_value_type(&self.handle) {
            log::warn!("value-type scope release failed: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::pair_descriptor,
        typesystem::{ElementType, TypeDefinition, TypeLookup, TypeRegistryBuilder},
    };

    #[test]
    fn test_overflow_at_capacity_plus_one() {
        for capacity in [0usize, 1, 8, 64] {
            let mut frame = StackFrame::new(capacity);
            for i in 0..capacity {
                frame.push(Slot::from(i as i64)).unwrap();
            }
            let err = frame.push(Slot::from(0)).unwrap_err();
            assert_eq!(
                err.as_marshal(),
                Some(&MarshalError::StackOverflow { capacity })
            );
            assert_eq!(frame.depth(), capacity);
        }
    }

    #[test]
    fn test_underflow() {
        let mut frame = StackFrame::new(2);
        assert!(matches!(
            frame.pop().unwrap_err().as_marshal(),
            Some(MarshalError::StackUnderflow)
        ));
        assert!(frame.peek().is_err());
    }

    #[test]
    fn test_offset_addressing() {
        let mut frame = StackFrame::new(8);
        for v in [10, 20, 30] {
            frame.push(Slot::from(v)).unwrap();
        }

        assert_eq!(frame.at(-1).unwrap(), Slot::from(30));
        assert_eq!(frame.at(-3).unwrap(), Slot::from(10));
        assert_eq!(frame.at(1).unwrap(), Slot::from(20));
        assert!(frame.at(-4).is_err());
        assert!(frame.at(3).is_err());

        frame.set_at(-2, Slot::from(25)).unwrap();
        assert_eq!(frame.at(1).unwrap(), Slot::from(25));
    }

    #[test]
    fn test_locals_below_operands() {
        let mut frame = StackFrame::with_locals(4, 2).unwrap();
        assert!(frame.is_empty());
        frame.set_local(1, Slot::from(7)).unwrap();
        frame.push(Slot::from(1)).unwrap();
        frame.push(Slot::from(2)).unwrap();

        assert_eq!(frame.local(1).unwrap(), Slot::from(7));
        assert!(frame.local(2).is_err());
        assert!(frame.push(Slot::from(3)).is_err());
        assert_eq!(frame.depth(), 2);

        frame.pop().unwrap();
        frame.pop().unwrap();
        assert!(frame.pop().is_err());
        assert!(StackFrame::with_locals(2, 3).is_err());
    }

    #[test]
    fn test_balanced_value_type_allocation() {
        let descriptor = pair_descriptor();
        let mut frame = StackFrame::new(8);
        frame.push(Slot::from(1)).unwrap();
        let top = frame.top();

        let handle = frame.alloc_value_type(&descriptor).unwrap();
        assert_eq!(frame.top(), top);
        assert_eq!(frame.reserved(), 2);
        frame.free_value_type(&handle).unwrap();

        assert_eq!(frame.top(), top);
        assert_eq!(frame.reserved(), 0);
        assert_eq!(frame.free_slots(), 7);
    }

    #[test]
    fn test_reservations_share_capacity_with_operands() {
        let descriptor = pair_descriptor();
        let mut frame = StackFrame::new(4);
        let handle = frame.alloc_value_type(&descriptor).unwrap();

        frame.push(Slot::from(1)).unwrap();
        frame.push(Slot::from(2)).unwrap();
        assert!(frame.push(Slot::from(3)).is_err());
        assert!(frame.alloc_value_type(&descriptor).is_err());

        frame.pop().unwrap();
        frame.pop().unwrap();
        frame.free_value_type(&handle).unwrap();
    }

    #[test]
    fn test_lifo_release_enforced() {
        let descriptor = pair_descriptor();
        let mut frame = StackFrame::new(8);
        let first = frame.alloc_value_type(&descriptor).unwrap();
        let second = frame.alloc_value_type(&descriptor).unwrap();

        let err = frame.free_value_type(&first).unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::InvalidValueTypeRelease {
                expected: 4,
                found: 6
            })
        );

        frame.free_value_type(&second).unwrap();
        frame.free_value_type(&first).unwrap();
        assert!(frame.free_value_type(&first).is_err());
        assert!(frame.free_value_type(&Slot::from(1)).is_err());
    }

    #[test]
    fn test_scope_releases_on_early_return() {
        fn fails_inside_scope(frame: &mut StackFrame) -> Result<()> {
            let descriptor = pair_descriptor();
            let mut scope = frame.scoped_value_type(&descriptor)?;
            scope.push(Slot::from(1))?;
            scope.pop()?;
            scope.pop()?;
            Ok(())
        }

        let mut frame = StackFrame::new(8);
        assert!(fails_inside_scope(&mut frame).is_err());
        assert_eq!(frame.reserved(), 0);
        assert_eq!(frame.reservation_count(), 0);
    }

    #[test]
    fn test_claim_raises_top() {
        let mut frame = StackFrame::new(8);
        frame.claim(0, 2).unwrap().copy_from_slice(&[Slot::from(4), Slot::from(2)]);
        assert_eq!(frame.depth(), 2);
        assert_eq!(frame.at(-1).unwrap(), Slot::from(2));

        frame.claim(0, 1).unwrap()[0] = Slot::from(3);
        assert_eq!(frame.depth(), 2);

        let descriptor = pair_descriptor();
        let handle = frame.alloc_value_type(&descriptor).unwrap();
        assert!(frame.claim(5, 2).is_err());
        assert_eq!(frame.claim(6, 2).unwrap().len(), 2);
        frame.free_value_type(&handle).unwrap();
    }

    #[test]
    fn test_ranges_past_address_space_rejected() {
        let mut frame = StackFrame::new(8);
        frame.push(Slot::from(1)).unwrap();

        for (start, count) in [(usize::MAX, 2), (usize::MAX - 1, 2), (1, usize::MAX)] {
            assert_eq!(
                frame.slots(start, count).unwrap_err().as_marshal(),
                Some(&MarshalError::IndexOutOfRange {
                    index: start,
                    length: 8
                })
            );
            assert!(frame.slots_mut(start, count).is_err());
            assert!(frame.claim(start, count).is_err());
        }
        assert_eq!(frame.depth(), 1);

        let forged = ValueTypeHandle {
            type_token: pair_descriptor().token,
            base: usize::MAX,
            slot_count: 2,
        };
        assert!(frame.value_span(&forged).is_err());
    }

    #[test]
    fn test_check_release_leaves_reservations() {
        let descriptor = pair_descriptor();
        let mut frame = StackFrame::new(8);
        let first = frame.alloc_value_type(&descriptor).unwrap();
        let second = frame.alloc_value_type(&descriptor).unwrap();
        let (Slot::ValueType(first_handle), Slot::ValueType(second_handle)) = (first, second)
        else {
            panic!("expected value-type handles");
        };

        assert!(frame.check_release(&first_handle).is_err());
        frame.check_release(&second_handle).unwrap();
        assert_eq!(frame.reservation_count(), 2);
        assert_eq!(frame.reserved(), 4);

        frame.free_value_type(&second).unwrap();
        frame.free_value_type(&first).unwrap();
    }

    #[test]
    fn test_nested_span_defaults() {
        let mut types = TypeRegistryBuilder::new();
        let inner = types
            .register(
                TypeDefinition::value_type("Test.Inner")
                    .field("a", ElementType::I4)
                    .field("target", ElementType::Object),
            )
            .unwrap();
        let outer = types
            .register(
                TypeDefinition::value_type("Test.Outer")
                    .field("tag", ElementType::I4)
                    .field("inner", ElementType::ValueType(inner)),
            )
            .unwrap();
        let descriptor = types.require(outer).unwrap();

        let mut frame = StackFrame::new(4);
        let slot = frame.alloc_value_type(&descriptor).unwrap();
        let Slot::ValueType(handle) = slot else {
            panic!("expected value-type handle");
        };
        assert_eq!(
            frame.value_span(&handle).unwrap(),
            &[Slot::from(0), Slot::from(0), Slot::Null]
        );
        frame.free_value_type(&slot).unwrap();
    }

    #[test]
    fn test_span_defaults_and_liveness() {
        let mut types = TypeRegistryBuilder::new();
        let token = types
            .register(
                TypeDefinition::value_type("Test.Mixed")
                    .field("count", ElementType::I4)
                    .field("target", ElementType::Object),
            )
            .unwrap();
        let descriptor = types.require(token).unwrap();

        let mut frame = StackFrame::new(4);
        let slot = frame.alloc_value_type(&descriptor).unwrap();
        let Slot::ValueType(handle) = slot else {
            panic!("expected value-type handle");
        };
        assert_eq!(frame.value_span(&handle).unwrap(), &[Slot::from(0), Slot::Null]);

        frame.value_span_mut(&handle).unwrap()[0] = Slot::from(5);
        assert_eq!(frame.slots(handle.base, 1).unwrap(), &[Slot::from(5)]);

        frame.free_value_type(&slot).unwrap();
        assert!(frame.value_span(&handle).is_err());
    }
}
