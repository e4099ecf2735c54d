//! Type layouts: definitions submitted for registration and the descriptors
//! the registry produces from them.

use std::{any::TypeId, fmt};

use bitflags::bitflags;

use crate::{
    typesystem::{ElementType, TypeToken},
    value::Slot,
};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    /// Type attributes recorded at registration
    pub struct TypeFlags: u32 {
        /// Type has value semantics and is stored inline
        const VALUE_TYPE = 0x0001;
        /// Type cannot be derived from
        const SEALED = 0x0002;
        /// A native marshaller is bound to the type
        const NATIVE_BOUND = 0x0004;
    }
}

/// Unregistered type layout, submitted to
/// [`TypeRegistryBuilder::register`](crate::TypeRegistryBuilder::register).
///
/// Fields are kept in declaration order; that order is the positional layout
/// the interpreter's bytecode addresses.
///
/// # Example
///
/// ```rust
/// use crossbind::{ElementType, TypeDefinition};
///
/// let point = TypeDefinition::value_type("Demo.Point")
///     .field("x", ElementType::I4)
///     .field("y", ElementType::I4);
///
/// let counter = TypeDefinition::class("Demo.Counter")
///     .field("count", ElementType::I8)
///     .static_field("instances", ElementType::I4);
/// # let _ = (point, counter);
/// ```
#[derive(Clone, Debug)]
pub struct TypeDefinition {
    pub(crate) name: String,
    pub(crate) flags: TypeFlags,
    pub(crate) fields: Vec<(String, ElementType)>,
    pub(crate) static_fields: Vec<(String, ElementType)>,
    pub(crate) native: Option<NativeBinding>,
}

impl TypeDefinition {
    /// Starts a value-type definition (sealed, stored inline).
    #[must_use]
    pub fn value_type(name: impl Into<String>) -> Self {
        Self::with_flags(name, TypeFlags::VALUE_TYPE | TypeFlags::SEALED)
    }

    /// Starts a reference-type definition.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_flags(name, TypeFlags::empty())
    }

    fn with_flags(name: impl Into<String>, flags: TypeFlags) -> Self {
        TypeDefinition {
            name: name.into(),
            flags,
            fields: Vec::new(),
            static_fields: Vec::new(),
            native: None,
        }
    }

    /// Appends an instance field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, element_type: ElementType) -> Self {
        self.fields.push((name.into(), element_type));
        self
    }

    /// Appends a static field.
    #[must_use]
    pub fn static_field(mut self, name: impl Into<String>, element_type: ElementType) -> Self {
        self.static_fields.push((name.into(), element_type));
        self
    }

    /// Marks the type as sealed.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.flags |= TypeFlags::SEALED;
        self
    }

    /// Binds a native Rust type to this definition.
    #[must_use]
    pub(crate) fn bind_native<T: 'static>(mut self) -> Self {
        self.flags |= TypeFlags::NATIVE_BOUND;
        self.native = Some(NativeBinding {
            type_id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
        });
        self
    }

    /// Full name of the type being defined.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Link between a registered type and the native Rust type that marshals it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeBinding {
    /// Rust type identity.
    pub type_id: TypeId,
    /// Rust type path, for diagnostics.
    pub rust_name: &'static str,
}

/// A single field in a registered type layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Declaration index, used by field and static-field references.
    pub index: u32,
    /// First slot of the field within the flattened layout.
    ///
    /// For value types this accounts for nested value types expanded inline.
    /// For class instances every field takes exactly one slot, so the offset
    /// equals the declaration index.
    pub offset: usize,
    /// Number of slots the field occupies in the flattened layout.
    pub slot_count: usize,
    /// Declared type.
    pub element_type: ElementType,
}

/// Registered, immutable type layout.
///
/// Produced by the [`TypeRegistryBuilder`](crate::TypeRegistryBuilder) and shared
/// read-only through the frozen [`TypeRegistry`](crate::TypeRegistry).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Token assigned at registration.
    pub token: TypeToken,
    /// Full name (`Namespace.Name`).
    pub name: String,
    /// Type attributes.
    pub flags: TypeFlags,
    /// Instance fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Static fields in declaration order.
    pub static_fields: Vec<FieldDescriptor>,
    /// Native type bound to this descriptor, if any.
    pub native: Option<NativeBinding>,
    /// Total flattened slot count of an instance.
    pub slot_count: usize,
    /// Contents of a freshly created instance, one entry per slot.
    ///
    /// Nested value types are expanded with their own defaults, so an inline
    /// object field is null wherever it sits in the layout.
    pub default_slots: Vec<Slot>,
}

impl TypeDescriptor {
    /// Returns `true` if instances are stored inline.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.flags.contains(TypeFlags::VALUE_TYPE)
    }

    /// Returns the instance field with the given declaration index.
    #[must_use]
    pub fn field(&self, index: u32) -> Option<&FieldDescriptor> {
        self.fields.get(index as usize)
    }

    /// Returns the instance field with the given name.
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the static field with the given declaration index.
    #[must_use]
    pub fn static_field(&self, index: u32) -> Option<&FieldDescriptor> {
        self.static_fields.get(index as usize)
    }

    /// Returns `true` if `T` is the native type bound to this descriptor.
    #[must_use]
    pub fn is_bound_to<T: 'static>(&self) -> bool {
        self.native
            .is_some_and(|binding| binding.type_id == TypeId::of::<T>())
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_value_type() {
            "valuetype"
        } else {
            "class"
        };
        write!(f, "{kind} {} ({})", self.name, self.token)
    }
}
