//! Copying native values to and from interpreter storage.

use crate::{
    marshal::{DescriptorTable, FieldSink, FieldSource, ValueType},
    memory::StackFrame,
    typesystem::{ElementType, TypeLookup, TypeToken},
    value::{HeapRef, Slot, ValueTypeHandle},
    MarshalError, Result,
};

/// Stateless value marshaller.
///
/// A `Marshaller` borrows the [`DescriptorTable`] and operates on frames
/// passed in explicitly, so it is `Copy` and can be used from any number of
/// interpreter threads at once as long as each thread owns its frame.
///
/// # Value Representation
///
/// - On a frame, a value occupies `slot_count` consecutive slots holding its
///   flattened fields in declaration order, either at a base-relative
///   position ([`copy_to_stack`](Self::copy_to_stack)) or in a reserved span
///   referenced by a [`Slot::ValueType`] operand ([`push_value`](Self::push_value)).
/// - On the heap, a value is a boxed object holding the same flattened slots.
///
/// # Example
///
/// ```rust
/// use crossbind::prelude::*;
///
/// let runtime = Runtime::builder()?.build()?;
/// let marshaller = runtime.marshaller();
/// let mut frame = runtime.new_frame();
///
/// let value = ObscuredInt::new(42);
/// marshaller.push_value(&mut frame, &value)?;
/// assert_eq!(frame.depth(), 1);
///
/// let popped: ObscuredInt = marshaller.pop_value(&mut frame)?;
/// assert_eq!(popped.value(), 42);
/// assert_eq!(frame.reserved(), 0);
/// # Ok::<(), crossbind::Error>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Marshaller<'a> {
    table: &'a DescriptorTable,
    strict_write_back: bool,
}

impl<'a> Marshaller<'a> {
    /// Creates a marshaller with strict write-back.
    #[must_use]
    pub fn new(table: &'a DescriptorTable) -> Self {
        Marshaller {
            table,
            strict_write_back: true,
        }
    }

    /// Sets whether a write-back to a primitive slot is an error (`true`) or
    /// a logged no-op (`false`).
    #[must_use]
    pub fn with_strict_write_back(mut self, strict: bool) -> Self {
        self.strict_write_back = strict;
        self
    }

    /// The descriptor table this marshaller resolves through.
    #[must_use]
    pub fn table(&self) -> &'a DescriptorTable {
        self.table
    }

    /// Token of the registered native type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::TypeNotFound`] if `T` is not registered.
    pub fn token_of<T: ValueType>(&self) -> Result<TypeToken> {
        self.table.types().token_of::<T>()
    }

    /// Resolves a reference slot, see [`DescriptorTable::resolve`].
    ///
    /// # Errors
    ///
    /// Same as [`DescriptorTable::resolve`].
    pub fn resolve(&self, slot: &Slot) -> Result<Slot> {
        self.table.resolve(slot)
    }

    /// Writes the fields of `value` into consecutive slots starting at the
    /// absolute frame index `offset`, raising the top if needed.
    ///
    /// # Errors
    ///
    /// [`MarshalError::TypeNotFound`] if `T` is not registered, or
    /// [`MarshalError::StackOverflow`] if the value does not fit.
    pub fn copy_to_stack<T: ValueType>(
        &self,
        value: &T,
        frame: &mut StackFrame,
        offset: usize,
    ) -> Result<()> {
        let slot_count = self.table.types().descriptor_of::<T>()?.slot_count;
        let slots = frame.claim(offset, slot_count)?;
        value.store(&mut FieldSink::new(slots))
    }

    /// Reads a `T` from consecutive slots starting at the absolute frame
    /// index `offset`.
    ///
    /// # Errors
    ///
    /// [`MarshalError::TypeNotFound`], [`MarshalError::IndexOutOfRange`] if the
    /// slots are not in use, or [`MarshalError::SlotTypeMismatch`].
    pub fn copy_from_stack<T: ValueType>(&self, frame: &StackFrame, offset: usize) -> Result<T> {
        let slot_count = self.table.types().descriptor_of::<T>()?.slot_count;
        let slots = frame.slots(offset, slot_count)?;
        T::load(&mut FieldSource::new(slots))
    }

    /// Writes `value` into the reserved span behind a [`Slot::ValueType`] handle.
    ///
    /// # Errors
    ///
    /// [`MarshalError::ValueTypeMismatch`] if the span holds another type,
    /// [`MarshalError::UnsupportedSlotKind`] if `handle` is not a value-type
    /// handle.
    pub fn copy_to_span<T: ValueType>(
        &self,
        value: &T,
        frame: &mut StackFrame,
        handle: &Slot,
    ) -> Result<()> {
        let handle = self.typed_handle::<T>(handle, "copy to span")?;
        let span = frame.value_span_mut(&handle)?;
        value.store(&mut FieldSink::new(span))
    }

    /// Reads a `T` from the reserved span behind a [`Slot::ValueType`] handle.
    ///
    /// # Errors
    ///
    /// Same as [`copy_to_span`](Self::copy_to_span).
    pub fn copy_from_span<T: ValueType>(&self, frame: &StackFrame, handle: &Slot) -> Result<T> {
        let handle = self.typed_handle::<T>(handle, "copy from span")?;
        let span = frame.value_span(&handle)?;
        T::load(&mut FieldSource::new(span))
    }

    /// Reserves a span for `value`, fills it, and returns its handle without
    /// pushing it.
    ///
    /// # Errors
    ///
    /// [`MarshalError::TypeNotFound`] or [`MarshalError::StackOverflow`].
    pub fn alloc_value<T: ValueType>(&self, frame: &mut StackFrame, value: &T) -> Result<Slot> {
        let descriptor = self.table.types().descriptor_of::<T>()?;
        let handle = frame.alloc_value_type(&descriptor)?;
        if let Err(error) = self.copy_to_span(value, frame, &handle) {
            frame.free_value_type(&handle)?;
            return Err(error);
        }
        Ok(handle)
    }

    /// Pushes `value` as a value-type operand.
    ///
    /// The fields are copied into a fresh reservation and its handle is
    /// pushed. The reservation is released when the operand is consumed by
    /// [`pop_value`](Self::pop_value).
    ///
    /// # Errors
    ///
    /// [`MarshalError::TypeNotFound`] or [`MarshalError::StackOverflow`].
    pub fn push_value<T: ValueType>(&self, frame: &mut StackFrame, value: &T) -> Result<()> {
        let handle = self.alloc_value(frame, value)?;
        if let Err(error) = frame.push(handle) {
            frame.free_value_type(&handle)?;
            return Err(error);
        }
        Ok(())
    }

    /// Pops a `T` operand.
    ///
    /// Accepts a value-type handle (the fields are copied out and the
    /// reservation released, even if the copy fails), a boxed object handle
    /// (unboxed), or a reference slot, which is resolved first and must lead
    /// to a boxed value. A never-written location declared with `T` reads as
    /// the default `T`.
    ///
    /// # Errors
    ///
    /// - [`MarshalError::StackUnderflow`] on an empty frame
    /// - [`MarshalError::ValueTypeMismatch`] if the operand holds another type
    /// - [`MarshalError::SlotTypeMismatch`] for primitive and null operands
    /// - [`MarshalError::InvalidValueTypeRelease`] if the operand's span is not
    ///   the most recent reservation; the operand stays on the frame
    pub fn pop_value<T: ValueType>(&self, frame: &mut StackFrame) -> Result<T> {
        let slot = frame.peek()?;
        if let Slot::ValueType(handle) = slot {
            frame.check_release(&handle)?;
        }
        frame.pop()?;

        match slot {
            Slot::ValueType(_) => {
                let value = self.copy_from_span(frame, &slot);
                frame.free_value_type(&slot)?;
                value
            }
            Slot::Object(heap_ref) => self.unbox_value(heap_ref),
            Slot::FieldRef { .. } | Slot::StaticFieldRef { .. } | Slot::ArrayRef { .. } => {
                match self.table.resolve(&slot)? {
                    Slot::Object(heap_ref) => self.unbox_value(heap_ref),
                    Slot::Null => self.default_at::<T>(&slot),
                    other => Err(MarshalError::SlotTypeMismatch {
                        expected: "value type",
                        found: other.describe(),
                    }
                    .into()),
                }
            }
            Slot::Primitive(_) | Slot::Null => Err(MarshalError::SlotTypeMismatch {
                expected: "value type",
                found: slot.describe(),
            }
            .into()),
        }
    }

    /// Copies `value` onto the heap as a boxed object.
    ///
    /// # Errors
    ///
    /// [`MarshalError::TypeNotFound`] or the heap's allocation errors.
    pub fn box_value<T: ValueType>(&self, value: &T) -> Result<HeapRef> {
        let descriptor = self.table.types().descriptor_of::<T>()?;
        let mut fields = vec![Slot::default(); descriptor.slot_count];
        value.store(&mut FieldSink::new(&mut fields))?;
        self.table.heap().alloc_boxed(descriptor.token, fields)
    }

    /// Copies a boxed `T` out of the heap.
    ///
    /// # Errors
    ///
    /// [`MarshalError::DanglingReference`], [`MarshalError::HeapObjectMismatch`]
    /// if the object is not boxed, or [`MarshalError::ValueTypeMismatch`].
    pub fn unbox_value<T: ValueType>(&self, heap_ref: HeapRef) -> Result<T> {
        let expected = self.token_of::<T>()?;
        let (found, fields) = self.table.heap().boxed_fields(heap_ref)?;
        if found != expected {
            return Err(MarshalError::ValueTypeMismatch { expected, found }.into());
        }
        T::load(&mut FieldSource::new(&fields))
    }

    /// Boxes the span behind a value-type handle using the registered layout.
    ///
    /// Used for the interpreter's `box` instruction, where no native type is
    /// known.
    ///
    /// # Errors
    ///
    /// [`MarshalError::UnsupportedSlotKind`] if `handle` is not a value-type
    /// handle, [`MarshalError::IndexOutOfRange`] for a released span, or the
    /// heap's allocation errors.
    pub fn box_span(&self, frame: &StackFrame, handle: &Slot) -> Result<HeapRef> {
        let Slot::ValueType(span_handle) = handle else {
            return Err(MarshalError::UnsupportedSlotKind {
                operation: "box",
                kind: handle.kind(),
            }
            .into());
        };
        let fields = frame.value_span(span_handle)?.to_vec();
        self.table
            .heap()
            .alloc_boxed(span_handle.type_token, fields)
    }

    /// Unboxes a heap value into a fresh reservation and pushes its handle.
    ///
    /// Used for the interpreter's `unbox` instruction.
    ///
    /// # Errors
    ///
    /// [`MarshalError::DanglingReference`], [`MarshalError::HeapObjectMismatch`],
    /// [`MarshalError::TypeNotFound`] or [`MarshalError::StackOverflow`].
    pub fn unbox_to_stack(&self, frame: &mut StackFrame, heap_ref: HeapRef) -> Result<Slot> {
        let (type_token, fields) = self.table.heap().boxed_fields(heap_ref)?;
        let descriptor = self.table.types().require(type_token)?;
        if fields.len() != descriptor.slot_count {
            return Err(MarshalError::IndexOutOfRange {
                index: fields.len(),
                length: descriptor.slot_count,
            }
            .into());
        }

        let slot = frame.alloc_value_type(&descriptor)?;
        let Slot::ValueType(handle) = slot else {
            return Err(MarshalError::UnsupportedSlotKind {
                operation: "unbox",
                kind: slot.kind(),
            }
            .into());
        };
        frame.value_span_mut(&handle)?.copy_from_slice(&fields);
        if let Err(error) = frame.push(slot) {
            frame.free_value_type(&slot)?;
            return Err(error);
        }
        Ok(slot)
    }

    /// Commits `value` to the location held by the frame slot at `offset`.
    ///
    /// The destination slot selects the storage:
    ///
    /// | Destination | Effect |
    /// |-------------|--------|
    /// | [`Slot::FieldRef`] | object field set to a new box of `value` |
    /// | [`Slot::StaticFieldRef`] | static field set to a new box of `value` |
    /// | [`Slot::ArrayRef`] | array element set to a new box of `value` |
    /// | [`Slot::ValueType`] | fields copied into the span |
    /// | [`Slot::Object`] / [`Slot::Null`] | frame slot replaced by a new box of `value` |
    /// | [`Slot::Primitive`] | error, or logged no-op when write-back is lenient |
    ///
    /// # Errors
    ///
    /// - [`MarshalError::UnsupportedSlotKind`] for primitive destinations
    ///   in strict mode
    /// - [`MarshalError::ValueTypeMismatch`] if the destination is declared
    ///   with, or holds, another value type
    /// - [`MarshalError::SlotTypeMismatch`] if the destination is declared
    ///   with a primitive type
    /// - the resolution errors of [`DescriptorTable::resolve`]
    pub fn write_back<T: ValueType>(
        &self,
        frame: &mut StackFrame,
        offset: isize,
        value: &T,
    ) -> Result<()> {
        let destination = frame.at(offset)?;
        match destination {
            Slot::FieldRef { .. } | Slot::StaticFieldRef { .. } | Slot::ArrayRef { .. } => {
                let token = self.token_of::<T>()?;
                match self.table.location_type(&destination)? {
                    ElementType::ValueType(declared) if declared == token => {}
                    ElementType::Object => {}
                    ElementType::ValueType(declared) => {
                        return Err(MarshalError::ValueTypeMismatch {
                            expected: declared,
                            found: token,
                        }
                        .into());
                    }
                    primitive => {
                        return Err(MarshalError::SlotTypeMismatch {
                            expected: primitive.as_str(),
                            found: "value type",
                        }
                        .into());
                    }
                }
                let boxed = self.box_value(value)?;
                self.table.store(&destination, Slot::Object(boxed))
            }
            Slot::ValueType(_) => self.copy_to_span(value, frame, &destination),
            Slot::Object(_) | Slot::Null => {
                let boxed = self.box_value(value)?;
                frame.set_at(offset, Slot::Object(boxed))
            }
            Slot::Primitive(_) => self.unsupported_write_back(&destination),
        }
    }

    /// Commits a single-slot value (primitive, object handle or null) to the
    /// location held by the frame slot at `offset`.
    ///
    /// Reference destinations are written through the descriptor table; an
    /// object or null destination is replaced on the frame.
    ///
    /// # Errors
    ///
    /// - [`MarshalError::UnsupportedSlotKind`] for value-type handle
    ///   destinations, and for primitive destinations in strict mode
    /// - the errors of [`DescriptorTable::store`]
    pub fn write_back_slot(&self, frame: &mut StackFrame, offset: isize, value: Slot) -> Result<()> {
        let destination = frame.at(offset)?;
        match destination {
            Slot::FieldRef { .. } | Slot::StaticFieldRef { .. } | Slot::ArrayRef { .. } => {
                self.table.store(&destination, value)
            }
            Slot::Object(_) | Slot::Null => frame.set_at(offset, value),
            Slot::ValueType(_) => Err(MarshalError::UnsupportedSlotKind {
                operation: "write back",
                kind: destination.kind(),
            }
            .into()),
            Slot::Primitive(_) => self.unsupported_write_back(&destination),
        }
    }

    fn unsupported_write_back(&self, destination: &Slot) -> Result<()> {
        if self.strict_write_back {
            return Err(MarshalError::UnsupportedSlotKind {
                operation: "write back",
                kind: destination.kind(),
            }
            .into());
        }
        log::warn!("write back to {} slot ignored", destination.kind());
        Ok(())
    }

    fn typed_handle<T: ValueType>(
        &self,
        handle: &Slot,
        operation: &'static str,
    ) -> Result<ValueTypeHandle> {
        let Slot::ValueType(span_handle) = handle else {
            return Err(MarshalError::UnsupportedSlotKind {
                operation,
                kind: handle.kind(),
            }
            .into());
        };
        let expected = self.token_of::<T>()?;
        if span_handle.type_token != expected {
            return Err(MarshalError::ValueTypeMismatch {
                expected,
                found: span_handle.type_token,
            }
            .into());
        }
        Ok(*span_handle)
    }

    /// Default `T` for a null location, if the location is declared with `T`.
    fn default_at<T: ValueType>(&self, location: &Slot) -> Result<T> {
        let expected = self.token_of::<T>()?;
        match self.table.location_type(location)? {
            ElementType::ValueType(declared) if declared == expected => {
                let descriptor = self.table.types().require(declared)?;
                T::load(&mut FieldSource::new(&descriptor.default_slots))
            }
            ElementType::ValueType(declared) => Err(MarshalError::ValueTypeMismatch {
                expected,
                found: declared,
            }
            .into()),
            _ => Err(MarshalError::SlotTypeMismatch {
                expected: "value type",
                found: "null",
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bindings::{ObscuredInt, Vector3},
        test::{test_table, TestFixture},
        value::SlotKind,
    };

    fn fixture() -> TestFixture {
        test_table()
    }

    #[test]
    fn test_copy_round_trip_at_offset_zero() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);

        let value = ObscuredInt {
            obscured: 42,
            key: 7,
        };
        marshaller.copy_to_stack(&value, &mut frame, 0).unwrap();
        assert_eq!(frame.depth(), 2);
        assert_eq!(frame.at(0).unwrap(), Slot::from(42));
        assert_eq!(frame.at(1).unwrap(), Slot::from(7));

        let back: ObscuredInt = marshaller.copy_from_stack(&frame, 0).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_copy_from_unused_slots_fails() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let frame = StackFrame::new(8);
        assert!(marshaller.copy_from_stack::<ObscuredInt>(&frame, 0).is_err());
    }

    #[test]
    fn test_push_pop_releases_span() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(16);

        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(-1.0, 0.5, 4.0);
        marshaller.push_value(&mut frame, &a).unwrap();
        marshaller.push_value(&mut frame, &b).unwrap();
        assert_eq!(frame.reserved(), 6);

        assert_eq!(marshaller.pop_value::<Vector3>(&mut frame).unwrap(), b);
        assert_eq!(marshaller.pop_value::<Vector3>(&mut frame).unwrap(), a);
        assert_eq!(frame.reserved(), 0);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_push_overflow_leaves_frame_balanced() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(3);

        let err = marshaller
            .push_value(&mut frame, &Vector3::new(0.0, 0.0, 0.0))
            .unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::StackOverflow { capacity: 3 })
        );
        assert_eq!(frame.reserved(), 0);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_pop_rejects_other_value_type() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);

        marshaller
            .push_value(&mut frame, &ObscuredInt::new(3))
            .unwrap();
        let err = marshaller.pop_value::<Vector3>(&mut frame).unwrap_err();
        assert!(matches!(
            err.as_marshal(),
            Some(MarshalError::ValueTypeMismatch { .. })
        ));

        frame.push(Slot::from(1)).unwrap();
        assert!(marshaller.pop_value::<Vector3>(&mut frame).is_err());
    }

    #[test]
    fn test_box_unbox() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);

        let value = ObscuredInt::new(-17);
        let boxed = marshaller.box_value(&value).unwrap();
        assert_eq!(marshaller.unbox_value::<ObscuredInt>(boxed).unwrap(), value);
        assert!(matches!(
            marshaller.unbox_value::<Vector3>(boxed).unwrap_err().as_marshal(),
            Some(MarshalError::ValueTypeMismatch { .. })
        ));

        let object = fixture.table.new_object(fixture.foo).unwrap();
        assert!(marshaller.unbox_value::<ObscuredInt>(object).is_err());
    }

    #[test]
    fn test_box_span_and_unbox_to_stack() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(16);

        let value = Vector3::new(1.0, 2.0, 3.0);
        let handle = marshaller.alloc_value(&mut frame, &value).unwrap();
        let boxed = marshaller.box_span(&frame, &handle).unwrap();
        frame.free_value_type(&handle).unwrap();
        assert_eq!(fixture.table.heap().type_of(boxed).unwrap(), fixture.vector);

        let pushed = marshaller.unbox_to_stack(&mut frame, boxed).unwrap();
        assert_eq!(frame.peek().unwrap(), pushed);
        assert_eq!(marshaller.pop_value::<Vector3>(&mut frame).unwrap(), value);
        assert!(marshaller.box_span(&frame, &Slot::from(1)).is_err());
    }

    #[test]
    fn test_pop_resolves_references() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);

        let array = fixture
            .table
            .new_array(ElementType::ValueType(fixture.obscured), 2)
            .unwrap();
        let boxed = marshaller.box_value(&ObscuredInt::new(5)).unwrap();
        let element = Slot::ArrayRef { array, index: 1 };
        fixture.table.store(&element, Slot::Object(boxed)).unwrap();

        frame.push(element).unwrap();
        assert_eq!(marshaller.pop_value::<ObscuredInt>(&mut frame).unwrap().value(), 5);

        // never written: reads as the default value
        frame.push(Slot::ArrayRef { array, index: 0 }).unwrap();
        assert_eq!(
            marshaller.pop_value::<ObscuredInt>(&mut frame).unwrap(),
            ObscuredInt::default()
        );

        frame.push(Slot::ArrayRef { array, index: 0 }).unwrap();
        assert!(matches!(
            marshaller.pop_value::<Vector3>(&mut frame).unwrap_err().as_marshal(),
            Some(MarshalError::ValueTypeMismatch { .. })
        ));

        let objects = fixture.table.new_array(ElementType::Object, 1).unwrap();
        frame.push(Slot::ArrayRef { array: objects, index: 0 }).unwrap();
        assert!(matches!(
            marshaller.pop_value::<ObscuredInt>(&mut frame).unwrap_err().as_marshal(),
            Some(MarshalError::SlotTypeMismatch {
                found: "null",
                ..
            })
        ));
    }

    #[test]
    fn test_unwritten_value_type_fields_read_as_default() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);

        let object = fixture.table.new_object(fixture.holder).unwrap();
        frame.push(Slot::FieldRef { object, field: 0 }).unwrap();
        assert_eq!(
            marshaller.pop_value::<ObscuredInt>(&mut frame).unwrap(),
            ObscuredInt::default()
        );

        frame
            .push(Slot::StaticFieldRef {
                type_token: fixture.holder,
                field: 0,
            })
            .unwrap();
        assert_eq!(
            marshaller.pop_value::<Vector3>(&mut frame).unwrap(),
            Vector3::default()
        );
        assert!(frame.is_empty());
    }

    #[test]
    fn test_out_of_order_pop_keeps_operand() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(16);

        marshaller.push_value(&mut frame, &ObscuredInt::new(5)).unwrap();
        let local = marshaller
            .alloc_value(&mut frame, &ObscuredInt::new(9))
            .unwrap();
        let err = marshaller.pop_value::<ObscuredInt>(&mut frame).unwrap_err();
        assert!(matches!(
            err.as_marshal(),
            Some(MarshalError::InvalidValueTypeRelease { .. })
        ));
        assert_eq!(frame.depth(), 1);
        assert_eq!(frame.reserved(), 4);

        frame.free_value_type(&local).unwrap();
        assert_eq!(marshaller.pop_value::<ObscuredInt>(&mut frame).unwrap().value(), 5);
        assert_eq!(frame.reserved(), 0);
    }

    #[test]
    fn test_copy_at_unaddressable_offset() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);
        let value = ObscuredInt::new(1);

        for offset in [usize::MAX, usize::MAX - 1] {
            assert!(matches!(
                marshaller
                    .copy_to_stack(&value, &mut frame, offset)
                    .unwrap_err()
                    .as_marshal(),
                Some(MarshalError::IndexOutOfRange { .. })
            ));
            assert!(matches!(
                marshaller
                    .copy_from_stack::<ObscuredInt>(&frame, offset)
                    .unwrap_err()
                    .as_marshal(),
                Some(MarshalError::IndexOutOfRange { .. })
            ));
        }
        assert!(frame.is_empty());
    }

    #[test]
    fn test_unbox_to_stack_rejects_class_object() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);

        let object = fixture.table.new_object(fixture.foo).unwrap();
        assert!(marshaller.unbox_to_stack(&mut frame, object).is_err());
        assert!(frame.is_empty());
        assert_eq!(frame.reserved(), 0);
    }

    #[test]
    fn test_write_back_to_static_field() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);

        let total = Slot::StaticFieldRef {
            type_token: fixture.foo,
            field: 1,
        };
        frame.push(total).unwrap();
        marshaller
            .write_back_slot(&mut frame, -1, Slot::from(99))
            .unwrap();

        let fresh = Slot::StaticFieldRef {
            type_token: fixture.foo,
            field: 1,
        };
        assert_eq!(marshaller.resolve(&fresh).unwrap(), Slot::from(99));
    }

    #[test]
    fn test_write_back_value_type_destinations() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(16);
        let value = ObscuredInt::new(11);

        // array element declared with the value type
        let array = fixture
            .table
            .new_array(ElementType::ValueType(fixture.obscured), 1)
            .unwrap();
        frame.push(Slot::ArrayRef { array, index: 0 }).unwrap();
        marshaller.write_back(&mut frame, -1, &value).unwrap();
        let stored = fixture
            .table
            .resolve(&Slot::ArrayRef { array, index: 0 })
            .unwrap();
        let Slot::Object(boxed) = stored else {
            panic!("expected boxed element, got {stored:?}");
        };
        assert_eq!(marshaller.unbox_value::<ObscuredInt>(boxed).unwrap(), value);

        // span on the frame
        let handle = marshaller
            .alloc_value(&mut frame, &ObscuredInt::new(0))
            .unwrap();
        frame.push(handle).unwrap();
        marshaller.write_back(&mut frame, -1, &value).unwrap();
        assert_eq!(
            marshaller.copy_from_span::<ObscuredInt>(&frame, &handle).unwrap(),
            value
        );

        // raw object slot on the frame
        frame.push(Slot::Null).unwrap();
        marshaller.write_back(&mut frame, -1, &value).unwrap();
        let Slot::Object(replaced) = frame.peek().unwrap() else {
            panic!("expected object slot");
        };
        assert_eq!(marshaller.unbox_value::<ObscuredInt>(replaced).unwrap(), value);
    }

    #[test]
    fn test_write_back_checks_declared_type() {
        let fixture = fixture();
        let marshaller = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);

        frame
            .push(Slot::StaticFieldRef {
                type_token: fixture.foo,
                field: 1,
            })
            .unwrap();
        let err = marshaller
            .write_back(&mut frame, -1, &ObscuredInt::new(1))
            .unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::SlotTypeMismatch {
                expected: "int32",
                found: "value type"
            })
        );

        let array = fixture
            .table
            .new_array(ElementType::ValueType(fixture.obscured), 1)
            .unwrap();
        frame.push(Slot::ArrayRef { array, index: 0 }).unwrap();
        assert!(matches!(
            marshaller
                .write_back(&mut frame, -1, &Vector3::new(0.0, 0.0, 0.0))
                .unwrap_err()
                .as_marshal(),
            Some(MarshalError::ValueTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_write_back_to_primitive_slot() {
        let fixture = fixture();
        let strict = Marshaller::new(&fixture.table);
        let mut frame = StackFrame::new(8);
        frame.push(Slot::from(5)).unwrap();

        let err = strict
            .write_back(&mut frame, -1, &ObscuredInt::new(1))
            .unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::UnsupportedSlotKind {
                operation: "write back",
                kind: SlotKind::Primitive
            })
        );

        let lenient = strict.with_strict_write_back(false);
        lenient
            .write_back_slot(&mut frame, -1, Slot::from(9))
            .unwrap();
        assert_eq!(frame.peek().unwrap(), Slot::from(5));
    }
}
