//! Static field storage.
//!
//! Static fields are keyed by `(type, declaration index)` and persist for the
//! lifetime of the [`Runtime`](crate::Runtime). A field that was never written
//! reads as the default value of its declared type; the default is supplied
//! by the caller, which knows the field's [`ElementType`](crate::ElementType).

use dashmap::DashMap;

use crate::{memory::ensure_storable, typesystem::TypeToken, value::Slot, Result};

/// Storage for static fields.
///
/// # Example
///
/// ```rust
/// use crossbind::{Slot, StaticFieldStorage, TypeToken};
///
/// let statics = StaticFieldStorage::new();
/// let foo = TypeToken::from_row(1);
///
/// statics.set(foo, 1, Slot::from(99))?;
/// assert_eq!(statics.get(foo, 1), Some(Slot::from(99)));
/// assert_eq!(statics.get_or(foo, 0, Slot::Null), Slot::Null);
/// # Ok::<(), crossbind::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct StaticFieldStorage {
    fields: DashMap<(TypeToken, u32), Slot>,
}

impl StaticFieldStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        StaticFieldStorage {
            fields: DashMap::new(),
        }
    }

    /// Returns the stored value, `None` if the field was never written.
    #[must_use]
    pub fn get(&self, type_token: TypeToken, field: u32) -> Option<Slot> {
        self.fields
            .get(&(type_token, field))
            .map(|entry| *entry.value())
    }

    /// Returns the stored value or `default`.
    #[must_use]
    pub fn get_or(&self, type_token: TypeToken, field: u32, default: Slot) -> Slot {
        self.get(type_token, field).unwrap_or(default)
    }

    /// Stores a value.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::UnsupportedSlotKind`](crate::MarshalError::UnsupportedSlotKind)
    /// for reference slots and stack value-type handles.
    pub fn set(&self, type_token: TypeToken, field: u32, value: Slot) -> Result<()> {
        ensure_storable(&value, "store static field")?;
        self.fields.insert((type_token, field), value);
        Ok(())
    }

    /// Returns `true` if the field has been written.
    #[must_use]
    pub fn contains(&self, type_token: TypeToken, field: u32) -> bool {
        self.fields.contains_key(&(type_token, field))
    }

    /// Resets a field to its default by forgetting the stored value.
    pub fn remove(&self, type_token: TypeToken, field: u32) -> Option<Slot> {
        self.fields.remove(&(type_token, field)).map(|(_, v)| v)
    }

    /// Number of written fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Forgets all stored values.
    pub fn clear(&self) {
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueTypeHandle;

    #[test]
    fn test_set_get_remove() {
        let statics = StaticFieldStorage::new();
        let foo = TypeToken::from_row(3);

        assert!(statics.is_empty());
        statics.set(foo, 0, Slot::from(1.5f64)).unwrap();
        assert!(statics.contains(foo, 0));
        assert!(!statics.contains(foo, 1));
        assert_eq!(statics.remove(foo, 0), Some(Slot::from(1.5f64)));
        assert_eq!(statics.get_or(foo, 0, Slot::from(0)), Slot::from(0));
    }

    #[test]
    fn test_fields_are_keyed_by_type() {
        let statics = StaticFieldStorage::new();
        statics.set(TypeToken::from_row(1), 0, Slot::from(1)).unwrap();
        statics.set(TypeToken::from_row(2), 0, Slot::from(2)).unwrap();
        assert_eq!(statics.get(TypeToken::from_row(1), 0), Some(Slot::from(1)));
        assert_eq!(statics.len(), 2);
        statics.clear();
        assert!(statics.is_empty());
    }

    #[test]
    fn test_stack_handles_rejected() {
        let statics = StaticFieldStorage::new();
        let handle = Slot::ValueType(ValueTypeHandle {
            type_token: TypeToken::from_row(1),
            base: 4,
            slot_count: 2,
        });
        assert!(statics.set(TypeToken::from_row(1), 0, handle).is_err());
    }
}
