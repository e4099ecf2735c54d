//! Two-phase type registry.
//!
//! Types are registered single-threaded during startup through a
//! [`TypeRegistryBuilder`]. [`TypeRegistryBuilder::freeze`] consumes the builder
//! and yields a [`TypeRegistry`], which has no mutation API and can be shared
//! across interpreter threads for lock-free lookups.
//!
//! # Layout Computation
//!
//! When a value type is registered its fields are laid out in declaration
//! order. Primitive and object fields take one slot; a field whose type is
//! another value type is expanded inline and takes that type's full slot
//! count. Nested value types therefore have to be registered before the types
//! that embed them.
//!
//! Class (reference type) instances live on the object heap with one slot per
//! declared field. Value-type fields of a class hold a boxed handle.

use std::{any::TypeId, sync::Arc};

use crossbeam_skiplist::SkipMap;
use dashmap::{DashMap, ReadOnlyView};
use sha1::{Digest, Sha1};

use crate::{
    marshal::ValueType,
    typesystem::{
        ElementType, FieldDescriptor, TypeDefinition, TypeDescriptor, TypeFlags, TypeToken,
    },
    utils::IdAllocator,
    value::Slot,
    MarshalError, Result,
};

/// Read access shared by the open and the frozen registry.
///
/// Value-type layouts are computed against this trait so that
/// [`ValueType::definition`] can refer to nested types that are already
/// registered.
pub trait TypeLookup {
    /// Returns the descriptor registered under `token`.
    fn descriptor(&self, token: TypeToken) -> Option<Arc<TypeDescriptor>>;

    /// Returns the token registered under a full type name.
    fn resolve_name(&self, name: &str) -> Option<TypeToken>;

    /// Returns the token bound to a native Rust type.
    fn native_token(&self, type_id: TypeId) -> Option<TypeToken>;

    /// Returns the descriptor registered under `token`, or an error.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::TypeNotFound`] if nothing is registered under `token`.
    fn require(&self, token: TypeToken) -> Result<Arc<TypeDescriptor>> {
        self.descriptor(token).ok_or_else(|| {
            MarshalError::TypeNotFound {
                name: token.to_string(),
            }
            .into()
        })
    }

    /// Returns the token bound to the native type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::TypeNotFound`] if `T` has not been registered.
    fn token_of<T: 'static>(&self) -> Result<TypeToken>
    where
        Self: Sized,
    {
        self.native_token(TypeId::of::<T>()).ok_or_else(|| {
            MarshalError::TypeNotFound {
                name: std::any::type_name::<T>().to_string(),
            }
            .into()
        })
    }

    /// Returns the descriptor bound to the native type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::TypeNotFound`] if `T` has not been registered.
    fn descriptor_of<T: 'static>(&self) -> Result<Arc<TypeDescriptor>>
    where
        Self: Sized,
    {
        let token = self.token_of::<T>()?;
        self.require(token)
    }

    /// Number of slots a value of `element_type` occupies inline.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::TypeNotFound`] for an unregistered value type.
    fn inline_slot_count(&self, element_type: &ElementType) -> Result<usize> {
        match element_type {
            ElementType::ValueType(token) => Ok(self.require(*token)?.slot_count),
            _ => Ok(1),
        }
    }
}

/// Type registry in its open, registration phase.
///
/// # Example
///
/// ```rust
/// use crossbind::{ElementType, TypeDefinition, TypeLookup, TypeRegistryBuilder};
///
/// let mut builder = TypeRegistryBuilder::new();
/// let inner = builder.register(
///     TypeDefinition::value_type("Demo.Pair")
///         .field("a", ElementType::I4)
///         .field("b", ElementType::I4),
/// )?;
/// let outer = builder.register(
///     TypeDefinition::value_type("Demo.Wrapper")
///         .field("tag", ElementType::I8)
///         .field("pair", ElementType::ValueType(inner)),
/// )?;
///
/// let registry = builder.freeze();
/// assert_eq!(registry.require(outer)?.slot_count, 3);
/// # Ok::<(), crossbind::Error>(())
/// ```
#[derive(Debug)]
pub struct TypeRegistryBuilder {
    types: SkipMap<TypeToken, Arc<TypeDescriptor>>,
    by_name: DashMap<String, TypeToken>,
    by_native: DashMap<TypeId, TypeToken>,
    rows: IdAllocator,
}

impl TypeRegistryBuilder {
    /// Creates an empty registry in the registration phase.
    #[must_use]
    pub fn new() -> Self {
        TypeRegistryBuilder {
            types: SkipMap::new(),
            by_name: DashMap::new(),
            by_native: DashMap::new(),
            rows: IdAllocator::starting_at(1),
        }
    }

    /// Registers a type definition and computes its layout.
    ///
    /// # Errors
    ///
    /// - [`MarshalError::DuplicateType`] if the name (or the bound native type)
    ///   is already registered
    /// - [`MarshalError::TypeNotFound`] if a field refers to a value type that
    ///   is not registered yet, or to a registered type that is not a value type
    pub fn register(&mut self, definition: TypeDefinition) -> Result<TypeToken> {
        if self.by_name.contains_key(&definition.name) {
            return Err(MarshalError::DuplicateType {
                name: definition.name,
            }
            .into());
        }
        if let Some(binding) = definition.native {
            if self.by_native.contains_key(&binding.type_id) {
                return Err(MarshalError::DuplicateType {
                    name: binding.rust_name.to_string(),
                }
                .into());
            }
        }

        let is_value_type = definition.flags.contains(TypeFlags::VALUE_TYPE);
        let (fields, slot_count) = self.layout(&definition.fields, is_value_type)?;
        let default_slots = self.default_slots(&fields, is_value_type)?;
        let (static_fields, _) = self.layout(&definition.static_fields, false)?;

        let row = u32::try_from(self.rows.next()).map_err(|_| {
            crate::Error::Error(format!("type table full while registering {}", definition.name))
        })?;
        let token = TypeToken::from_row(row);
        let descriptor = Arc::new(TypeDescriptor {
            token,
            name: definition.name,
            flags: definition.flags,
            fields,
            static_fields,
            native: definition.native,
            slot_count,
            default_slots,
        });

        log::debug!(
            "registered {} with {} slot(s), {} static field(s)",
            descriptor,
            descriptor.slot_count,
            descriptor.static_fields.len()
        );

        self.by_name.insert(descriptor.name.clone(), token);
        if let Some(binding) = descriptor.native {
            self.by_native.insert(binding.type_id, token);
        }
        self.types.insert(token, descriptor);
        Ok(token)
    }

    /// Registers the native value type `T` using its generated definition.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_value_type<T: ValueType>(&mut self) -> Result<TypeToken> {
        let definition = T::definition(&*self)?.bind_native::<T>();
        self.register(definition)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Ends the registration phase.
    #[must_use]
    pub fn freeze(self) -> TypeRegistry {
        log::debug!("type registry frozen with {} type(s)", self.types.len());
        TypeRegistry {
            types: self.types,
            by_name: self.by_name.into_read_only(),
            by_native: self.by_native.into_read_only(),
        }
    }

    fn layout(
        &self,
        declared: &[(String, ElementType)],
        inline: bool,
    ) -> Result<(Vec<FieldDescriptor>, usize)> {
        let mut fields = Vec::with_capacity(declared.len());
        let mut offset = 0usize;

        for (index, (name, element_type)) in declared.iter().enumerate() {
            if let ElementType::ValueType(token) = element_type {
                let nested = self.require(*token)?;
                if !nested.is_value_type() {
                    return Err(MarshalError::TypeNotFound {
                        name: format!("value type {token} ({})", nested.name),
                    }
                    .into());
                }
            }

            let slot_count = if inline {
                self.inline_slot_count(element_type)?
            } else {
                1
            };
            fields.push(FieldDescriptor {
                name: name.clone(),
                index: u32::try_from(index).unwrap_or(u32::MAX),
                offset,
                slot_count,
                element_type: *element_type,
            });
            offset += slot_count;
        }

        Ok((fields, offset))
    }

    fn default_slots(&self, fields: &[FieldDescriptor], inline: bool) -> Result<Vec<Slot>> {
        let mut slots = Vec::with_capacity(fields.len());
        for field in fields {
            match field.element_type {
                ElementType::ValueType(token) if inline => {
                    slots.extend_from_slice(&self.require(token)?.default_slots);
                }
                element_type => slots.push(Slot::default_for(&element_type)),
            }
        }
        Ok(slots)
    }
}

impl Default for TypeRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeLookup for TypeRegistryBuilder {
    fn descriptor(&self, token: TypeToken) -> Option<Arc<TypeDescriptor>> {
        self.types.get(&token).map(|entry| entry.value().clone())
    }

    fn resolve_name(&self, name: &str) -> Option<TypeToken> {
        self.by_name.get(name).map(|entry| *entry.value())
    }

    fn native_token(&self, type_id: TypeId) -> Option<TypeToken> {
        self.by_native.get(&type_id).map(|entry| *entry.value())
    }
}

/// Frozen, read-only type registry.
///
/// All lookups are lock-free; the registry is `Send + Sync` and is normally
/// shared behind an `Arc` by every interpreter thread.
pub struct TypeRegistry {
    types: SkipMap<TypeToken, Arc<TypeDescriptor>>,
    by_name: ReadOnlyView<String, TypeToken>,
    by_native: ReadOnlyView<TypeId, TypeToken>,
}

impl TypeRegistry {
    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates over all descriptors in token order.
    pub fn iter(&self) -> impl Iterator<Item = Arc<TypeDescriptor>> + '_ {
        self.types.iter().map(|entry| entry.value().clone())
    }

    /// SHA-1 digest over every registered layout, in token order.
    ///
    /// Two registries built from the same bindings produce the same
    /// fingerprint, which lets a generated binding set be checked against the
    /// runtime it is loaded into.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 20] {
        let mut hasher = Sha1::new();
        for descriptor in self.iter() {
            hasher.update(descriptor.token.value().to_le_bytes());
            hasher.update(descriptor.name.as_bytes());
            hasher.update(descriptor.flags.bits().to_le_bytes());
            for field in descriptor.fields.iter().chain(&descriptor.static_fields) {
                hasher.update(field.name.as_bytes());
                hasher.update(field.element_type.to_string().as_bytes());
            }
        }
        let digest = hasher.finalize();
        let mut fingerprint = [0u8; 20];
        fingerprint.copy_from_slice(&digest);
        fingerprint
    }
}

impl TypeLookup for TypeRegistry {
    fn descriptor(&self, token: TypeToken) -> Option<Arc<TypeDescriptor>> {
        self.types.get(&token).map(|entry| entry.value().clone())
    }

    fn resolve_name(&self, name: &str) -> Option<TypeToken> {
        self.by_name.get(name).copied()
    }

    fn native_token(&self, type_id: TypeId) -> Option<TypeToken> {
        self.by_native.get(&type_id).copied()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("type_count", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::register_test_types;
    use rayon::prelude::*;

    #[test]
    fn test_register_value_type_layout() {
        let mut builder = TypeRegistryBuilder::new();
        let token = builder
            .register(
                TypeDefinition::value_type("Test.Pair")
                    .field("obscured", ElementType::I4)
                    .field("key", ElementType::I4),
            )
            .unwrap();

        let descriptor = builder.require(token).unwrap();
        assert!(descriptor.is_value_type());
        assert_eq!(descriptor.slot_count, 2);
        assert_eq!(descriptor.field(1).unwrap().name, "key");
        assert_eq!(descriptor.field(1).unwrap().offset, 1);
        assert_eq!(token, TypeToken::from_row(1));
    }

    #[test]
    fn test_nested_value_type_is_flattened() {
        let mut builder = TypeRegistryBuilder::new();
        let inner = builder
            .register(
                TypeDefinition::value_type("Test.Inner")
                    .field("a", ElementType::I4)
                    .field("b", ElementType::R8),
            )
            .unwrap();
        let outer = builder
            .register(
                TypeDefinition::value_type("Test.Outer")
                    .field("head", ElementType::I4)
                    .field("inner", ElementType::ValueType(inner))
                    .field("tail", ElementType::Object),
            )
            .unwrap();

        let descriptor = builder.require(outer).unwrap();
        assert_eq!(descriptor.slot_count, 4);
        let offsets: Vec<_> = descriptor.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 1, 3]);
        assert_eq!(descriptor.field(1).unwrap().slot_count, 2);
        assert_eq!(
            descriptor.default_slots,
            vec![Slot::from(0), Slot::from(0), Slot::from(0), Slot::Null]
        );
    }

    #[test]
    fn test_class_fields_take_one_slot() {
        let mut builder = TypeRegistryBuilder::new();
        let inner = builder
            .register(
                TypeDefinition::value_type("Test.Inner")
                    .field("a", ElementType::I4)
                    .field("b", ElementType::I4),
            )
            .unwrap();
        let class = builder
            .register(
                TypeDefinition::class("Test.Holder")
                    .field("value", ElementType::ValueType(inner))
                    .field("count", ElementType::I4),
            )
            .unwrap();

        let descriptor = builder.require(class).unwrap();
        assert!(!descriptor.is_value_type());
        assert_eq!(descriptor.slot_count, 2);
        assert_eq!(descriptor.field(1).unwrap().offset, 1);
        assert_eq!(descriptor.default_slots, vec![Slot::Null, Slot::from(0)]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut builder = TypeRegistryBuilder::new();
        builder.register(TypeDefinition::class("Test.A")).unwrap();
        let err = builder.register(TypeDefinition::class("Test.A")).unwrap_err();

        assert!(matches!(
            err.as_marshal(),
            Some(MarshalError::DuplicateType { name }) if name == "Test.A"
        ));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_unregistered_nested_type_rejected() {
        let mut builder = TypeRegistryBuilder::new();
        let err = builder
            .register(
                TypeDefinition::value_type("Test.Broken")
                    .field("missing", ElementType::ValueType(TypeToken::from_row(42))),
            )
            .unwrap_err();

        assert!(matches!(
            err.as_marshal(),
            Some(MarshalError::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_class_cannot_be_embedded_inline() {
        let mut builder = TypeRegistryBuilder::new();
        let class = builder.register(TypeDefinition::class("Test.Ref")).unwrap();
        let err = builder
            .register(
                TypeDefinition::value_type("Test.Embeds")
                    .field("bad", ElementType::ValueType(class)),
            )
            .unwrap_err();

        assert!(matches!(
            err.as_marshal(),
            Some(MarshalError::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_frozen_lookups() {
        let registry = register_test_types().freeze();

        let token = registry.resolve_name("Test.Foo").unwrap();
        let descriptor = registry.require(token).unwrap();
        assert_eq!(descriptor.static_fields.len(), 2);
        assert!(registry.resolve_name("Test.Missing").is_none());
    }

    #[test]
    fn test_frozen_registry_parallel_reads() {
        let registry = register_test_types().freeze();
        let tokens: Vec<TypeToken> = registry.iter().map(|d| d.token).collect();

        let found = tokens
            .par_iter()
            .map(|token| registry.descriptor(*token).is_some())
            .filter(|present| *present)
            .count();
        assert_eq!(found, tokens.len());
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let first = register_test_types().freeze();
        let second = register_test_types().freeze();
        assert_eq!(first.fingerprint(), second.fingerprint());

        let mut builder = register_test_types();
        builder.register(TypeDefinition::class("Test.Extra")).unwrap();
        assert_ne!(first.fingerprint(), builder.freeze().fingerprint());
    }
}
