//! Tagged stack and field slots.

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

use crate::{
    typesystem::{ElementType, TypeToken},
    MarshalError, Result,
};

/// Discriminant of a [`Slot`].
///
/// The first three kinds are *terminal*: they directly hold a value or an
/// object handle. The reference kinds name a storage location that has to be
/// resolved through the [`DescriptorTable`](crate::DescriptorTable).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum SlotKind {
    /// Raw 8-byte primitive storage.
    Primitive,
    /// Handle to a heap object, or null.
    ObjectHandle,
    /// Handle to a value-type span on the current frame.
    ValueTypeHandle,
    /// Instance field of a heap object.
    FieldReference,
    /// Static field of a registered type.
    StaticFieldReference,
    /// Element of a heap array.
    ArrayReference,
}

impl SlotKind {
    /// Returns `true` for kinds that hold a value rather than a location.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SlotKind::Primitive | SlotKind::ObjectHandle | SlotKind::ValueTypeHandle
        )
    }
}

/// Reference to a heap-allocated object.
///
/// `HeapRef` is an opaque handle that identifies an object on an
/// [`ObjectHeap`](crate::ObjectHeap). The marshalling core never owns the
/// object; it only observes it through the heap, and resolving a handle to a
/// destroyed object fails with [`MarshalError::DanglingReference`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(pub(crate) u64);

impl HeapRef {
    /// Creates a new heap reference with the given ID.
    #[must_use]
    pub fn new(id: u64) -> Self {
        HeapRef(id)
    }

    /// Returns the internal ID of this heap reference.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HeapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapRef({})", self.0)
    }
}

/// Raw 8-byte primitive storage.
///
/// The bit pattern is preserved exactly, so floats round-trip including NaN
/// payloads. Narrow integers are sign-extended on the way in and truncated on
/// the way out, matching the interpreter's stack widening rules.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Primitive(u64);

impl Primitive {
    /// All-zero primitive (`0`, `0.0`, `false`).
    pub const ZERO: Primitive = Primitive(0);

    /// Creates a primitive from its raw bits.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Primitive(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Stores a 32-bit integer (sign-extended).
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_i32(value: i32) -> Self {
        Primitive(value as i64 as u64)
    }

    /// Stores a 64-bit integer.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_i64(value: i64) -> Self {
        Primitive(value as u64)
    }

    /// Stores a 32-bit float.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Primitive(u64::from(value.to_bits()))
    }

    /// Stores a 64-bit float.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Primitive(value.to_bits())
    }

    /// Stores a boolean as 0 or 1.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        Primitive(value as u64)
    }

    /// Stores a character as its code point.
    #[must_use]
    pub const fn from_char(value: char) -> Self {
        Primitive(value as u64)
    }

    /// Reads the low 32 bits as a signed integer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_i32(&self) -> i32 {
        self.0 as u32 as i32
    }

    /// Reads the bits as a signed 64-bit integer.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    /// Reads the low 32 bits as a float.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    /// Reads the bits as a 64-bit float.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Non-zero is `true`.
    #[must_use]
    pub const fn as_bool(&self) -> bool {
        self.0 != 0
    }

    /// Reads the low 32 bits as a code point, if valid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_char(&self) -> Option<char> {
        char::from_u32(self.0 as u32)
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive(0x{:016x})", self.0)
    }
}

/// Handle to a value-type span reserved on a [`StackFrame`](crate::StackFrame).
///
/// The span starts at `base` and is `slot_count` slots long; the slots hold the
/// value's flattened fields in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueTypeHandle {
    /// Type of the value held in the span.
    pub type_token: TypeToken,
    /// Absolute frame index of the first field slot.
    pub base: usize,
    /// Number of slots in the span.
    pub slot_count: usize,
}

/// One stack or field location.
///
/// A slot is either terminal (a primitive, an object handle, null, or a
/// value-type span handle) or a reference naming another storage location.
/// Reference slots never hold a value themselves; storing one into a heap
/// object or static field is rejected, which keeps resolution single-step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Raw primitive value.
    Primitive(Primitive),
    /// Handle to a heap object.
    Object(HeapRef),
    /// Null object handle.
    Null,
    /// Value type stored on the current frame.
    ValueType(ValueTypeHandle),
    /// Instance field `field` (declaration index) of `object`.
    FieldRef {
        /// Owning object.
        object: HeapRef,
        /// Declaration index of the field.
        field: u32,
    },
    /// Static field `field` (declaration index) of `type_token`.
    StaticFieldRef {
        /// Owning type.
        type_token: TypeToken,
        /// Declaration index of the static field.
        field: u32,
    },
    /// Element `index` of `array`.
    ArrayRef {
        /// The array object.
        array: HeapRef,
        /// Element index.
        index: usize,
    },
}

impl Slot {
    /// Returns the slot's kind tag.
    #[must_use]
    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::Primitive(_) => SlotKind::Primitive,
            Slot::Object(_) | Slot::Null => SlotKind::ObjectHandle,
            Slot::ValueType(_) => SlotKind::ValueTypeHandle,
            Slot::FieldRef { .. } => SlotKind::FieldReference,
            Slot::StaticFieldRef { .. } => SlotKind::StaticFieldReference,
            Slot::ArrayRef { .. } => SlotKind::ArrayReference,
        }
    }

    /// Returns `true` if the slot holds a value rather than a location.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Returns `true` for [`Slot::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Slot::Null)
    }

    /// Default contents of a location of the given type.
    ///
    /// Value types default to a null handle here: inline value-type storage
    /// takes the descriptor's default slots, and boxed storage is created on
    /// first write. Until then the location reads as the default value.
    #[must_use]
    pub fn default_for(element_type: &ElementType) -> Slot {
        if element_type.is_primitive() {
            Slot::Primitive(Primitive::ZERO)
        } else {
            Slot::Null
        }
    }

    /// Short description of the slot contents, for error messages.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Slot::Primitive(_) => "primitive",
            Slot::Object(_) => "object",
            Slot::Null => "null",
            Slot::ValueType(_) => "value type",
            Slot::FieldRef { .. } => "field reference",
            Slot::StaticFieldRef { .. } => "static field reference",
            Slot::ArrayRef { .. } => "array reference",
        }
    }

    /// Returns the primitive payload.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::SlotTypeMismatch`] for any other kind.
    pub fn as_primitive(&self) -> Result<Primitive> {
        match self {
            Slot::Primitive(value) => Ok(*value),
            other => Err(MarshalError::SlotTypeMismatch {
                expected: "primitive",
                found: other.describe(),
            }
            .into()),
        }
    }

    /// Returns the object handle, `None` for null.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::SlotTypeMismatch`] for non-object kinds.
    pub fn as_object(&self) -> Result<Option<HeapRef>> {
        match self {
            Slot::Object(heap_ref) => Ok(Some(*heap_ref)),
            Slot::Null => Ok(None),
            other => Err(MarshalError::SlotTypeMismatch {
                expected: "object",
                found: other.describe(),
            }
            .into()),
        }
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Primitive(Primitive::ZERO)
    }
}

impl From<Primitive> for Slot {
    fn from(value: Primitive) -> Self {
        Slot::Primitive(value)
    }
}

impl From<i32> for Slot {
    fn from(value: i32) -> Self {
        Slot::Primitive(Primitive::from_i32(value))
    }
}

impl From<i64> for Slot {
    fn from(value: i64) -> Self {
        Slot::Primitive(Primitive::from_i64(value))
    }
}

impl From<f32> for Slot {
    fn from(value: f32) -> Self {
        Slot::Primitive(Primitive::from_f32(value))
    }
}

impl From<f64> for Slot {
    fn from(value: f64) -> Self {
        Slot::Primitive(Primitive::from_f64(value))
    }
}

impl From<bool> for Slot {
    fn from(value: bool) -> Self {
        Slot::Primitive(Primitive::from_bool(value))
    }
}

impl From<HeapRef> for Slot {
    fn from(value: HeapRef) -> Self {
        Slot::Object(value)
    }
}

impl From<Option<HeapRef>> for Slot {
    fn from(value: Option<HeapRef>) -> Self {
        value.map_or(Slot::Null, Slot::Object)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Primitive(value) => write!(f, "{}", value.as_i64()),
            Slot::Object(heap_ref) => write!(f, "{heap_ref}"),
            Slot::Null => write!(f, "null"),
            Slot::ValueType(handle) => write!(
                f,
                "valuetype {} @{}[{}]",
                handle.type_token, handle.base, handle.slot_count
            ),
            Slot::FieldRef { object, field } => write!(f, "&{object}.field{field}"),
            Slot::StaticFieldRef { type_token, field } => {
                write!(f, "&{type_token}::static{field}")
            }
            Slot::ArrayRef { array, index } => write!(f, "&{array}[{index}]"),
        }
    }
}
