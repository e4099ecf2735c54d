//! Object heap seam and the reference managed heap.
//!
//! The marshalling core never owns heap objects. It reaches them through the
//! [`ObjectHeap`] trait, which an embedding interpreter implements over its own
//! object table. [`ManagedHeap`] is the implementation used by the
//! [`Runtime`](crate::Runtime) and by the tests.
//!
//! # Object Layout
//!
//! - **Objects** - class instances, one slot per declared field
//! - **Arrays** - single-dimensional arrays with a declared element type
//! - **Boxed values** - value types copied to the heap, flattened field slots
//!
//! # Memory Limits
//!
//! [`ManagedHeap`] enforces a maximum number of live objects. Allocation beyond
//! the limit returns [`MarshalError::HeapLimitExceeded`].
//!
//! # Object References
//!
//! Objects are referenced via [`HeapRef`]. There is no garbage collection:
//! objects live until [`ManagedHeap::free`] is called, after which every
//! reference to them is dangling.

use std::{fmt, sync::Arc};

use dashmap::DashMap;

use crate::{
    memory::ensure_storable,
    typesystem::{ElementType, TypeToken},
    utils::IdAllocator,
    value::{HeapRef, Slot},
    MarshalError, Result,
};

/// Shared handle to an object heap.
pub type SharedHeap = Arc<dyn ObjectHeap>;

/// Access to the host's object heap.
///
/// Implementations must be safe for concurrent use: several interpreter
/// threads resolve references through the same heap. Field offsets are slot
/// offsets into the object's layout (declaration index for class objects,
/// flattened offset for boxed values).
pub trait ObjectHeap: Send + Sync {
    /// Returns `true` if `heap_ref` names a live object.
    fn contains(&self, heap_ref: HeapRef) -> bool;

    /// Returns the type of a class object or boxed value.
    ///
    /// # Errors
    ///
    /// [`MarshalError::DanglingReference`] for a missing object,
    /// [`MarshalError::HeapObjectMismatch`] for arrays.
    fn type_of(&self, heap_ref: HeapRef) -> Result<TypeToken>;

    /// Reads the slot at `offset` of an object or boxed value.
    ///
    /// # Errors
    ///
    /// [`MarshalError::DanglingReference`], [`MarshalError::HeapObjectMismatch`]
    /// for arrays, or [`MarshalError::IndexOutOfRange`] for a bad offset.
    fn get_field(&self, heap_ref: HeapRef, offset: usize) -> Result<Slot>;

    /// Writes the slot at `offset` of an object or boxed value.
    ///
    /// # Errors
    ///
    /// As [`get_field`](Self::get_field), plus
    /// [`MarshalError::UnsupportedSlotKind`] for reference and stack-handle slots.
    fn set_field(&self, heap_ref: HeapRef, offset: usize, value: Slot) -> Result<()>;

    /// Returns the number of elements of an array.
    ///
    /// # Errors
    ///
    /// [`MarshalError::DanglingReference`] or [`MarshalError::HeapObjectMismatch`].
    fn array_length(&self, heap_ref: HeapRef) -> Result<usize>;

    /// Returns the declared element type of an array.
    ///
    /// # Errors
    ///
    /// [`MarshalError::DanglingReference`] or [`MarshalError::HeapObjectMismatch`].
    fn element_type(&self, heap_ref: HeapRef) -> Result<ElementType>;

    /// Reads an array element.
    ///
    /// # Errors
    ///
    /// [`MarshalError::DanglingReference`], [`MarshalError::HeapObjectMismatch`]
    /// or [`MarshalError::IndexOutOfRange`].
    fn get_element(&self, heap_ref: HeapRef, index: usize) -> Result<Slot>;

    /// Writes an array element.
    ///
    /// # Errors
    ///
    /// As [`get_element`](Self::get_element), plus
    /// [`MarshalError::UnsupportedSlotKind`] for reference and stack-handle slots.
    fn set_element(&self, heap_ref: HeapRef, index: usize, value: Slot) -> Result<()>;

    /// Allocates a class object with the given field slots.
    ///
    /// # Errors
    ///
    /// [`MarshalError::HeapLimitExceeded`] or
    /// [`MarshalError::UnsupportedSlotKind`] for a non-storable field value.
    fn alloc_object(&self, type_token: TypeToken, fields: Vec<Slot>) -> Result<HeapRef>;

    /// Allocates an array with the given elements.
    ///
    /// # Errors
    ///
    /// As [`alloc_object`](Self::alloc_object).
    fn alloc_array(&self, element_type: ElementType, elements: Vec<Slot>) -> Result<HeapRef>;

    /// Allocates a boxed value type holding the given flattened field slots.
    ///
    /// # Errors
    ///
    /// As [`alloc_object`](Self::alloc_object).
    fn alloc_boxed(&self, type_token: TypeToken, fields: Vec<Slot>) -> Result<HeapRef>;

    /// Returns the type and a copy of the field slots of a boxed value.
    ///
    /// # Errors
    ///
    /// [`MarshalError::DanglingReference`] or [`MarshalError::HeapObjectMismatch`]
    /// if the object is not a boxed value.
    fn boxed_fields(&self, heap_ref: HeapRef) -> Result<(TypeToken, Vec<Slot>)>;
}

/// Object stored on the [`ManagedHeap`].
#[derive(Clone, Debug, PartialEq)]
pub enum HeapObject {
    /// A class instance.
    Object {
        /// Type of the object.
        type_token: TypeToken,
        /// One slot per declared field.
        fields: Vec<Slot>,
    },
    /// A single-dimensional array.
    Array {
        /// Declared element type.
        element_type: ElementType,
        /// The array elements.
        elements: Vec<Slot>,
    },
    /// A boxed value type.
    Boxed {
        /// Type of the boxed value.
        type_token: TypeToken,
        /// Flattened field slots.
        fields: Vec<Slot>,
    },
}

impl HeapObject {
    /// Short name of the object kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            HeapObject::Object { .. } => "object",
            HeapObject::Array { .. } => "array",
            HeapObject::Boxed { .. } => "boxed value",
        }
    }

    fn field_slots(&self) -> Result<&Vec<Slot>> {
        match self {
            HeapObject::Object { fields, .. } | HeapObject::Boxed { fields, .. } => Ok(fields),
            HeapObject::Array { .. } => Err(MarshalError::HeapObjectMismatch {
                expected: "object",
                found: self.kind(),
            }
            .into()),
        }
    }

    fn field_slots_mut(&mut self) -> Result<&mut Vec<Slot>> {
        let kind = self.kind();
        match self {
            HeapObject::Object { fields, .. } | HeapObject::Boxed { fields, .. } => Ok(fields),
            HeapObject::Array { .. } => Err(MarshalError::HeapObjectMismatch {
                expected: "object",
                found: kind,
            }
            .into()),
        }
    }

    fn elements(&self) -> Result<&Vec<Slot>> {
        match self {
            HeapObject::Array { elements, .. } => Ok(elements),
            other => Err(MarshalError::HeapObjectMismatch {
                expected: "array",
                found: other.kind(),
            }
            .into()),
        }
    }

    fn elements_mut(&mut self) -> Result<&mut Vec<Slot>> {
        let kind = self.kind();
        match self {
            HeapObject::Array { elements, .. } => Ok(elements),
            _ => Err(MarshalError::HeapObjectMismatch {
                expected: "array",
                found: kind,
            }
            .into()),
        }
    }
}

impl fmt::Display for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapObject::Object { type_token, fields } => {
                write!(f, "object {type_token} [{} field(s)]", fields.len())
            }
            HeapObject::Array {
                element_type,
                elements,
            } => write!(f, "{element_type}[{}]", elements.len()),
            HeapObject::Boxed { type_token, fields } => {
                write!(f, "boxed {type_token} [{} slot(s)]", fields.len())
            }
        }
    }
}

/// Reference object heap.
///
/// Objects are stored in a concurrent map keyed by id, so reads and writes
/// from several interpreter threads only contend on the same object.
///
/// # Example
///
/// ```rust
/// use crossbind::{ElementType, ManagedHeap, ObjectHeap, Slot};
///
/// let heap = ManagedHeap::new(16);
/// let array = heap.alloc_array(ElementType::I4, vec![Slot::from(1), Slot::from(2)])?;
///
/// heap.set_element(array, 1, Slot::from(5))?;
/// assert_eq!(heap.get_element(array, 1)?, Slot::from(5));
/// assert!(heap.get_element(array, 2).is_err());
/// # Ok::<(), crossbind::Error>(())
/// ```
pub struct ManagedHeap {
    objects: DashMap<u64, HeapObject>,
    ids: IdAllocator,
    max_objects: usize,
}

impl ManagedHeap {
    /// Creates a heap holding at most `max_objects` live objects (0 = unlimited).
    #[must_use]
    pub fn new(max_objects: usize) -> Self {
        ManagedHeap {
            objects: DashMap::new(),
            ids: IdAllocator::default(),
            max_objects,
        }
    }

    /// Creates a heap without an object limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if no objects are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Configured object limit (0 = unlimited).
    #[must_use]
    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    /// Returns a copy of the object behind `heap_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::DanglingReference`] if the object does not exist.
    pub fn get(&self, heap_ref: HeapRef) -> Result<HeapObject> {
        self.objects
            .get(&heap_ref.id())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| dangling(heap_ref))
    }

    /// Destroys an object. Any remaining reference to it becomes dangling.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::DanglingReference`] if the object does not exist.
    pub fn free(&self, heap_ref: HeapRef) -> Result<()> {
        self.objects
            .remove(&heap_ref.id())
            .map(|_| ())
            .ok_or_else(|| dangling(heap_ref))
    }

    fn alloc(&self, object: HeapObject) -> Result<HeapRef> {
        if self.max_objects > 0 && self.objects.len() >= self.max_objects {
            return Err(MarshalError::HeapLimitExceeded {
                limit: self.max_objects,
            }
            .into());
        }

        let id = self.ids.next();
        self.objects.insert(id, object);
        Ok(HeapRef::new(id))
    }

    fn with_object<R>(
        &self,
        heap_ref: HeapRef,
        f: impl FnOnce(&HeapObject) -> Result<R>,
    ) -> Result<R> {
        let entry = self
            .objects
            .get(&heap_ref.id())
            .ok_or_else(|| dangling(heap_ref))?;
        f(entry.value())
    }

    fn with_object_mut<R>(
        &self,
        heap_ref: HeapRef,
        f: impl FnOnce(&mut HeapObject) -> Result<R>,
    ) -> Result<R> {
        let mut entry = self
            .objects
            .get_mut(&heap_ref.id())
            .ok_or_else(|| dangling(heap_ref))?;
        f(entry.value_mut())
    }
}

impl Default for ManagedHeap {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for ManagedHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedHeap")
            .field("object_count", &self.objects.len())
            .field("max_objects", &self.max_objects)
            .finish()
    }
}

impl ObjectHeap for ManagedHeap {
    fn contains(&self, heap_ref: HeapRef) -> bool {
        self.objects.contains_key(&heap_ref.id())
    }

    fn type_of(&self, heap_ref: HeapRef) -> Result<TypeToken> {
        self.with_object(heap_ref, |object| match object {
            HeapObject::Object { type_token, .. } | HeapObject::Boxed { type_token, .. } => {
                Ok(*type_token)
            }
            HeapObject::Array { .. } => Err(MarshalError::HeapObjectMismatch {
                expected: "object",
                found: object.kind(),
            }
            .into()),
        })
    }

    fn get_field(&self, heap_ref: HeapRef, offset: usize) -> Result<Slot> {
        self.with_object(heap_ref, |object| {
            let fields = object.field_slots()?;
            fields.get(offset).copied().ok_or_else(|| {
                MarshalError::IndexOutOfRange {
                    index: offset,
                    length: fields.len(),
                }
                .into()
            })
        })
    }

    fn set_field(&self, heap_ref: HeapRef, offset: usize, value: Slot) -> Result<()> {
        ensure_storable(&value, "store field")?;
        self.with_object_mut(heap_ref, |object| {
            let fields = object.field_slots_mut()?;
            let length = fields.len();
            let target = fields
                .get_mut(offset)
                .ok_or(MarshalError::IndexOutOfRange {
                    index: offset,
                    length,
                })?;
            *target = value;
            Ok(())
        })
    }

    fn array_length(&self, heap_ref: HeapRef) -> Result<usize> {
        self.with_object(heap_ref, |object| Ok(object.elements()?.len()))
    }

    fn element_type(&self, heap_ref: HeapRef) -> Result<ElementType> {
        self.with_object(heap_ref, |object| match object {
            HeapObject::Array { element_type, .. } => Ok(*element_type),
            other => Err(MarshalError::HeapObjectMismatch {
                expected: "array",
                found: other.kind(),
            }
            .into()),
        })
    }

    fn get_element(&self, heap_ref: HeapRef, index: usize) -> Result<Slot> {
        self.with_object(heap_ref, |object| {
            let elements = object.elements()?;
            elements.get(index).copied().ok_or_else(|| {
                MarshalError::IndexOutOfRange {
                    index,
                    length: elements.len(),
                }
                .into()
            })
        })
    }

    fn set_element(&self, heap_ref: HeapRef, index: usize, value: Slot) -> Result<()> {
        ensure_storable(&value, "store element")?;
        self.with_object_mut(heap_ref, |object| {
            let elements = object.elements_mut()?;
            let length = elements.len();
            let target = elements
                .get_mut(index)
                .ok_or(MarshalError::IndexOutOfRange { index, length })?;
            *target = value;
            Ok(())
        })
    }

    fn alloc_object(&self, type_token: TypeToken, fields: Vec<Slot>) -> Result<HeapRef> {
        for field in &fields {
            ensure_storable(field, "allocate object")?;
        }
        self.alloc(HeapObject::Object { type_token, fields })
    }

    fn alloc_array(&self, element_type: ElementType, elements: Vec<Slot>) -> Result<HeapRef> {
        for element in &elements {
            ensure_storable(element, "allocate array")?;
        }
        self.alloc(HeapObject::Array {
            element_type,
            elements,
        })
    }

    fn alloc_boxed(&self, type_token: TypeToken, fields: Vec<Slot>) -> Result<HeapRef> {
        for field in &fields {
            ensure_storable(field, "box value")?;
        }
        self.alloc(HeapObject::Boxed { type_token, fields })
    }

    fn boxed_fields(&self, heap_ref: HeapRef) -> Result<(TypeToken, Vec<Slot>)> {
        self.with_object(heap_ref, |object| match object {
            HeapObject::Boxed { type_token, fields } => Ok((*type_token, fields.clone())),
            other => Err(MarshalError::HeapObjectMismatch {
                expected: "boxed value",
                found: other.kind(),
            }
            .into()),
        })
    }
}

fn dangling(heap_ref: HeapRef) -> crate::Error {
    MarshalError::DanglingReference {
        reference_id: heap_ref.id(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SlotKind;

    fn token() -> TypeToken {
        TypeToken::from_row(1)
    }

    #[test]
    fn test_object_fields() {
        let heap = ManagedHeap::new(8);
        let obj = heap
            .alloc_object(token(), vec![Slot::from(1), Slot::Null])
            .unwrap();

        assert_eq!(heap.type_of(obj).unwrap(), token());
        assert_eq!(heap.get_field(obj, 0).unwrap(), Slot::from(1));
        heap.set_field(obj, 1, Slot::from(HeapRef::new(99))).unwrap();
        assert_eq!(heap.get_field(obj, 1).unwrap(), Slot::Object(HeapRef::new(99)));
        assert!(heap.get_field(obj, 2).is_err());
    }

    #[test]
    fn test_array_bounds() {
        let heap = ManagedHeap::unbounded();
        let array = heap
            .alloc_array(ElementType::I8, vec![Slot::from(0i64); 3])
            .unwrap();

        assert_eq!(heap.array_length(array).unwrap(), 3);
        assert_eq!(heap.element_type(array).unwrap(), ElementType::I8);
        let err = heap.set_element(array, 3, Slot::from(1i64)).unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::IndexOutOfRange {
                index: 3,
                length: 3
            })
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let heap = ManagedHeap::unbounded();
        let array = heap.alloc_array(ElementType::I4, vec![]).unwrap();
        let err = heap.get_field(array, 0).unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::HeapObjectMismatch {
                expected: "object",
                found: "array"
            })
        );

        let obj = heap.alloc_object(token(), vec![]).unwrap();
        assert!(heap.boxed_fields(obj).is_err());
        assert!(heap.array_length(obj).is_err());
    }

    #[test]
    fn test_free_makes_reference_dangling() {
        let heap = ManagedHeap::unbounded();
        let obj = heap.alloc_boxed(token(), vec![Slot::from(7)]).unwrap();
        assert!(heap.contains(obj));

        heap.free(obj).unwrap();
        assert!(!heap.contains(obj));
        let err = heap.get_field(obj, 0).unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::DanglingReference {
                reference_id: obj.id()
            })
        );
        assert!(heap.free(obj).is_err());
    }

    #[test]
    fn test_object_limit() {
        let heap = ManagedHeap::new(2);
        heap.alloc_object(token(), vec![]).unwrap();
        let second = heap.alloc_object(token(), vec![]).unwrap();
        let err = heap.alloc_object(token(), vec![]).unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::HeapLimitExceeded { limit: 2 })
        );

        heap.free(second).unwrap();
        assert!(heap.alloc_object(token(), vec![]).is_ok());
    }

    #[test]
    fn test_reference_slots_not_storable() {
        let heap = ManagedHeap::unbounded();
        let obj = heap.alloc_object(token(), vec![Slot::Null]).unwrap();
        let reference = Slot::FieldRef {
            object: obj,
            field: 0,
        };

        let err = heap.set_field(obj, 0, reference).unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::UnsupportedSlotKind {
                operation: "store field",
                kind: SlotKind::FieldReference
            })
        );
        assert!(heap.alloc_array(ElementType::Object, vec![reference]).is_err());
    }

    #[test]
    fn test_ids_not_reused() {
        let heap = ManagedHeap::unbounded();
        let first = heap.alloc_object(token(), vec![]).unwrap();
        heap.free(first).unwrap();
        let second = heap.alloc_object(token(), vec![]).unwrap();
        assert_ne!(first, second);
    }
}
