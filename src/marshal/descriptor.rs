//! Resolution of reference slots to their terminal storage.

use std::{fmt, sync::Arc};

use crate::{
    memory::{ObjectHeap, SharedHeap, StaticFieldStorage},
    typesystem::{ElementType, FieldDescriptor, TypeLookup, TypeRegistry, TypeToken},
    value::{HeapRef, Slot},
    MarshalError, Result,
};

/// Maps reference slots to the storage they name.
///
/// The table ties together the frozen [`TypeRegistry`], the host
/// [`ObjectHeap`] and the [`StaticFieldStorage`]. Resolution is a pure lookup:
/// it never allocates and never changes any storage.
///
/// # Reference Kinds
///
/// | Slot | Storage |
/// |------|---------|
/// | [`Slot::FieldRef`] | slot `field.offset` of the object, located via the object's type |
/// | [`Slot::StaticFieldRef`] | static storage of `(type, field)`, default if never written |
/// | [`Slot::ArrayRef`] | element `index` of the array |
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use crossbind::{
///     DescriptorTable, ElementType, ManagedHeap, Slot, StaticFieldStorage, TypeDefinition,
///     TypeRegistryBuilder,
/// };
///
/// let mut types = TypeRegistryBuilder::new();
/// let foo = types.register(
///     TypeDefinition::class("Demo.Foo")
///         .static_field("count", ElementType::I4)
///         .static_field("total", ElementType::I4),
/// )?;
///
/// let table = DescriptorTable::new(
///     Arc::new(types.freeze()),
///     Arc::new(ManagedHeap::unbounded()),
///     Arc::new(StaticFieldStorage::new()),
/// );
///
/// let total = Slot::StaticFieldRef { type_token: foo, field: 1 };
/// table.store(&total, Slot::from(99))?;
/// assert_eq!(table.resolve(&total)?, Slot::from(99));
/// # Ok::<(), crossbind::Error>(())
/// ```
#[derive(Clone)]
pub struct DescriptorTable {
    types: Arc<TypeRegistry>,
    heap: SharedHeap,
    statics: Arc<StaticFieldStorage>,
}

impl DescriptorTable {
    /// Creates a table over the given registry, heap and static storage.
    #[must_use]
    pub fn new(
        types: Arc<TypeRegistry>,
        heap: SharedHeap,
        statics: Arc<StaticFieldStorage>,
    ) -> Self {
        DescriptorTable {
            types,
            heap,
            statics,
        }
    }

    /// The frozen type registry.
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The host object heap.
    #[must_use]
    pub fn heap(&self) -> &dyn ObjectHeap {
        self.heap.as_ref()
    }

    /// Static field storage.
    #[must_use]
    pub fn statics(&self) -> &StaticFieldStorage {
        &self.statics
    }

    /// Resolves `slot` to a terminal slot.
    ///
    /// Terminal slots are returned unchanged. Reference slots yield the
    /// current contents of the storage they name, which is always terminal,
    /// so `resolve(resolve(s)) == resolve(s)`.
    ///
    /// # Errors
    ///
    /// - [`MarshalError::DanglingReference`] if the referenced object is gone
    /// - [`MarshalError::IndexOutOfRange`] for an array index past the end
    /// - [`MarshalError::TypeNotFound`] / [`MarshalError::FieldNotFound`] if the
    ///   referenced type or field is not registered
    pub fn resolve(&self, slot: &Slot) -> Result<Slot> {
        match *slot {
            Slot::Primitive(_) | Slot::Object(_) | Slot::Null | Slot::ValueType(_) => Ok(*slot),
            Slot::FieldRef { object, field } => {
                let offset = self.instance_field(object, field)?.offset;
                self.heap.get_field(object, offset)
            }
            Slot::StaticFieldRef { type_token, field } => {
                let descriptor = self.static_field(type_token, field)?;
                Ok(self.statics.get_or(
                    type_token,
                    field,
                    Slot::default_for(&descriptor.element_type),
                ))
            }
            Slot::ArrayRef { array, index } => self.heap.get_element(array, index),
        }
    }

    /// Writes `value` into the storage named by the reference slot `location`.
    ///
    /// # Errors
    ///
    /// - [`MarshalError::UnsupportedSlotKind`] if `location` is terminal, or
    ///   `value` is a reference or stack value-type handle
    /// - the resolution errors of [`resolve`](Self::resolve)
    pub fn store(&self, location: &Slot, value: Slot) -> Result<()> {
        match *location {
            Slot::FieldRef { object, field } => {
                let offset = self.instance_field(object, field)?.offset;
                self.heap.set_field(object, offset, value)
            }
            Slot::StaticFieldRef { type_token, field } => {
                self.static_field(type_token, field)?;
                self.statics.set(type_token, field, value)
            }
            Slot::ArrayRef { array, index } => self.heap.set_element(array, index, value),
            other => Err(MarshalError::UnsupportedSlotKind {
                operation: "store",
                kind: other.kind(),
            }
            .into()),
        }
    }

    /// Declared type of the storage named by a reference slot.
    ///
    /// # Errors
    ///
    /// [`MarshalError::UnsupportedSlotKind`] for terminal slots, otherwise the
    /// resolution errors of [`resolve`](Self::resolve).
    pub fn location_type(&self, location: &Slot) -> Result<ElementType> {
        match *location {
            Slot::FieldRef { object, field } => {
                Ok(self.instance_field(object, field)?.element_type)
            }
            Slot::StaticFieldRef { type_token, field } => {
                Ok(self.static_field(type_token, field)?.element_type)
            }
            Slot::ArrayRef { array, .. } => self.heap.element_type(array),
            other => Err(MarshalError::UnsupportedSlotKind {
                operation: "location type",
                kind: other.kind(),
            }
            .into()),
        }
    }

    /// Allocates a class object with every field at its default.
    ///
    /// # Errors
    ///
    /// [`MarshalError::TypeNotFound`], [`MarshalError::HeapObjectMismatch`] if
    /// the type is a value type, or the heap's allocation errors.
    pub fn new_object(&self, type_token: TypeToken) -> Result<HeapRef> {
        let descriptor = self.types.require(type_token)?;
        if descriptor.is_value_type() {
            return Err(MarshalError::HeapObjectMismatch {
                expected: "class",
                found: "value type",
            }
            .into());
        }
        self.heap
            .alloc_object(type_token, descriptor.default_slots.clone())
    }

    /// Allocates an array of `length` default elements.
    ///
    /// Value-type elements hold boxed handles and start as null; a null
    /// element reads as the type's default value through
    /// [`Marshaller::pop_value`](crate::Marshaller::pop_value).
    ///
    /// # Errors
    ///
    /// The heap's allocation errors.
    pub fn new_array(&self, element_type: ElementType, length: usize) -> Result<HeapRef> {
        self.heap
            .alloc_array(element_type, vec![Slot::default_for(&element_type); length])
    }

    fn instance_field(&self, object: HeapRef, field: u32) -> Result<FieldDescriptor> {
        let type_token = self.heap.type_of(object)?;
        let descriptor = self.types.require(type_token)?;
        let field_descriptor = descriptor
            .field(field)
            .ok_or(MarshalError::FieldNotFound {
                type_token,
                index: field,
            })?;
        if field_descriptor.slot_count != 1 {
            return Err(MarshalError::SlotTypeMismatch {
                expected: "single-slot field",
                found: "inline value type",
            }
            .into());
        }
        Ok(field_descriptor.clone())
    }

    fn static_field(&self, type_token: TypeToken, field: u32) -> Result<FieldDescriptor> {
        let descriptor = self.types.require(type_token)?;
        descriptor
            .static_field(field)
            .cloned()
            .ok_or_else(|| {
                MarshalError::FieldNotFound {
                    type_token,
                    index: field,
                }
                .into()
            })
    }
}

impl fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorTable")
            .field("types", &self.types)
            .field("statics", &self.statics.len())
            .finish_non_exhaustive()
    }
}
