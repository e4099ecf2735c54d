//! Field-level encoding of native values into slots.
//!
//! Every native type that can appear as a field of a marshalled value
//! implements [`FieldCodec`]. A codec writes its value into consecutive slots
//! through a [`FieldSink`] and reads it back through a [`FieldSource`]; a value
//! type's codec simply visits its fields in declaration order, which yields the
//! flattened layout the [`TypeRegistryBuilder`](crate::TypeRegistryBuilder)
//! computes for it.
//!
//! [`ValueType`] marks codecs that are registered types in their own right.
//! Implementations are normally generated by [`value_type!`](crate::value_type).

use crate::{
    typesystem::{ElementType, TypeDefinition, TypeLookup},
    value::{HeapRef, Primitive, Slot},
    MarshalError, Result,
};

/// Write cursor over a run of slots.
#[derive(Debug)]
pub struct FieldSink<'a> {
    slots: &'a mut [Slot],
    position: usize,
}

impl<'a> FieldSink<'a> {
    /// Creates a cursor at the start of `slots`.
    pub fn new(slots: &'a mut [Slot]) -> Self {
        FieldSink { slots, position: 0 }
    }

    /// Writes the next slot.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::IndexOutOfRange`] if the run is exhausted.
    pub fn put(&mut self, slot: Slot) -> Result<()> {
        let length = self.slots.len();
        let target = self
            .slots
            .get_mut(self.position)
            .ok_or(MarshalError::IndexOutOfRange {
                index: self.position,
                length,
            })?;
        *target = slot;
        self.position += 1;
        Ok(())
    }

    /// Number of slots written so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Read cursor over a run of slots.
#[derive(Debug)]
pub struct FieldSource<'a> {
    slots: &'a [Slot],
    position: usize,
}

impl<'a> FieldSource<'a> {
    /// Creates a cursor at the start of `slots`.
    #[must_use]
    pub fn new(slots: &'a [Slot]) -> Self {
        FieldSource { slots, position: 0 }
    }

    /// Reads the next slot.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::IndexOutOfRange`] if the run is exhausted.
    pub fn take(&mut self) -> Result<Slot> {
        let slot = self.slots.get(self.position).copied().ok_or(
            MarshalError::IndexOutOfRange {
                index: self.position,
                length: self.slots.len(),
            },
        )?;
        self.position += 1;
        Ok(slot)
    }

    /// Reads the next slot as a primitive.
    ///
    /// # Errors
    ///
    /// As [`take`](Self::take), or [`MarshalError::SlotTypeMismatch`].
    pub fn take_primitive(&mut self) -> Result<Primitive> {
        self.take()?.as_primitive()
    }

    /// Number of slots read so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Conversion between a native field value and its slot representation.
pub trait FieldCodec: Sized {
    /// Declared type of a field holding `Self`.
    ///
    /// # Errors
    ///
    /// Value types return [`MarshalError::TypeNotFound`] if they are not
    /// registered in `lookup` yet.
    fn element_type(lookup: &impl TypeLookup) -> Result<ElementType>;

    /// Writes `self` into the sink.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::IndexOutOfRange`] if the sink is too short.
    fn store(&self, sink: &mut FieldSink<'_>) -> Result<()>;

    /// Reads a value from the source.
    ///
    /// # Errors
    ///
    /// [`MarshalError::IndexOutOfRange`] if the source is too short,
    /// [`MarshalError::SlotTypeMismatch`] if a slot holds the wrong kind.
    fn load(source: &mut FieldSource<'_>) -> Result<Self>;
}

/// A native type registered as an interpreter value type.
///
/// The field layout returned by [`definition`](Self::definition) and the
/// order in which [`FieldCodec::store`] visits fields must agree, since the
/// interpreter's bytecode addresses fields by position.
pub trait ValueType: FieldCodec + Send + Sync + 'static {
    /// Full interpreter-side type name.
    const TYPE_NAME: &'static str;

    /// Layout of the type. Nested value types are resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::TypeNotFound`] if a nested value type is not
    /// registered yet.
    fn definition(lookup: &impl TypeLookup) -> Result<TypeDefinition>;
}

macro_rules! primitive_codec {
    ($ty:ty, $element:expr, $to:expr, $from:expr) => {
        impl FieldCodec for $ty {
            fn element_type(_lookup: &impl TypeLookup) -> Result<ElementType> {
                Ok($element)
            }

            fn store(&self, sink: &mut FieldSink<'_>) -> Result<()> {
                sink.put(Slot::Primitive($to(*self)))
            }

            fn load(source: &mut FieldSource<'_>) -> Result<Self> {
                let primitive = source.take_primitive()?;
                Ok($from(&primitive))
            }
        }
    };
}

primitive_codec!(i32, ElementType::I4, Primitive::from_i32, Primitive::as_i32);
primitive_codec!(i64, ElementType::I8, Primitive::from_i64, Primitive::as_i64);
primitive_codec!(f32, ElementType::R4, Primitive::from_f32, Primitive::as_f32);
primitive_codec!(f64, ElementType::R8, Primitive::from_f64, Primitive::as_f64);
primitive_codec!(bool, ElementType::Boolean, Primitive::from_bool, Primitive::as_bool);

impl FieldCodec for char {
    fn element_type(_lookup: &impl TypeLookup) -> Result<ElementType> {
        Ok(ElementType::Char)
    }

    fn store(&self, sink: &mut FieldSink<'_>) -> Result<()> {
        sink.put(Slot::Primitive(Primitive::from_char(*self)))
    }

    fn load(source: &mut FieldSource<'_>) -> Result<Self> {
        source.take_primitive()?.as_char().ok_or_else(|| {
            MarshalError::SlotTypeMismatch {
                expected: "char",
                found: "invalid code point",
            }
            .into()
        })
    }
}

impl FieldCodec for Option<HeapRef> {
    fn element_type(_lookup: &impl TypeLookup) -> Result<ElementType> {
        Ok(ElementType::Object)
    }

    fn store(&self, sink: &mut FieldSink<'_>) -> Result<()> {
        sink.put(Slot::from(*self))
    }

    fn load(source: &mut FieldSource<'_>) -> Result<Self> {
        source.take()?.as_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::TypeRegistryBuilder;

    #[test]
    fn test_primitive_codecs() {
        let mut slots = [Slot::default(); 5];
        let mut sink = FieldSink::new(&mut slots);
        (-3i32).store(&mut sink).unwrap();
        (1i64 << 40).store(&mut sink).unwrap();
        0.25f32.store(&mut sink).unwrap();
        true.store(&mut sink).unwrap();
        'x'.store(&mut sink).unwrap();
        assert_eq!(sink.position(), 5);

        let mut source = FieldSource::new(&slots);
        assert_eq!(i32::load(&mut source).unwrap(), -3);
        assert_eq!(i64::load(&mut source).unwrap(), 1i64 << 40);
        assert_eq!(f32::load(&mut source).unwrap(), 0.25);
        assert!(bool::load(&mut source).unwrap());
        assert_eq!(char::load(&mut source).unwrap(), 'x');
        assert!(i32::load(&mut source).is_err());
    }

    #[test]
    fn test_sink_bounds() {
        let mut slots = [Slot::default(); 1];
        let mut sink = FieldSink::new(&mut slots);
        1i32.store(&mut sink).unwrap();
        let err = 2i32.store(&mut sink).unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::IndexOutOfRange {
                index: 1,
                length: 1
            })
        );
    }

    #[test]
    fn test_object_codec() {
        let slots = [Slot::Null, Slot::Object(HeapRef::new(4)), Slot::from(1)];
        let mut source = FieldSource::new(&slots);
        assert_eq!(Option::<HeapRef>::load(&mut source).unwrap(), None);
        assert_eq!(
            Option::<HeapRef>::load(&mut source).unwrap(),
            Some(HeapRef::new(4))
        );
        assert!(Option::<HeapRef>::load(&mut source).is_err());
    }

    #[test]
    fn test_primitive_load_rejects_object() {
        let slots = [Slot::Null];
        let err = i32::load(&mut FieldSource::new(&slots)).unwrap_err();
        assert_eq!(
            err.as_marshal(),
            Some(&MarshalError::SlotTypeMismatch {
                expected: "primitive",
                found: "null"
            })
        );
    }

    #[test]
    fn test_element_types() {
        let types = TypeRegistryBuilder::new();
        assert_eq!(i32::element_type(&types).unwrap(), ElementType::I4);
        assert_eq!(f64::element_type(&types).unwrap(), ElementType::R8);
        assert_eq!(
            Option::<HeapRef>::element_type(&types).unwrap(),
            ElementType::Object
        );
    }
}
