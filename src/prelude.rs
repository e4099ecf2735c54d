//! # crossbind Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the crossbind library. Import this module to get quick access to the essential
//! types for marshalling values and registering redirections.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all crossbind operations
pub use crate::Error;

/// Detailed marshalling failures
pub use crate::MarshalError;

/// The result type used throughout crossbind
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Process-level runtime and its builder and configuration
pub use crate::runtime::{Runtime, RuntimeBuilder, RuntimeConfig};

// ================================================================================================
// Type System
// ================================================================================================

/// Type identities, layouts and registries
pub use crate::typesystem::{
    ElementType, TypeDefinition, TypeDescriptor, TypeLookup, TypeRegistry, TypeRegistryBuilder,
    TypeToken,
};

// ================================================================================================
// Slots and Storage
// ================================================================================================

/// Slot representation
pub use crate::value::{HeapRef, Primitive, Slot, SlotKind};

/// Frames, heap and static storage
pub use crate::memory::{ManagedHeap, ObjectHeap, StackFrame, StaticFieldStorage};

// ================================================================================================
// Marshalling
// ================================================================================================

/// Descriptor table, marshaller and codecs
pub use crate::marshal::{DescriptorTable, FieldCodec, Marshaller, ValueType};

/// Value type declaration macro
pub use crate::value_type;

// ================================================================================================
// Redirection
// ================================================================================================

/// Method redirection
pub use crate::redirect::{
    MethodSignature, RedirectContext, RedirectOutcome, RedirectionTable, RedirectionTableBuilder,
};

// ================================================================================================
// Built-in Bindings
// ================================================================================================

/// Built-in value types
pub use crate::bindings::{ObscuredInt, Vector3};
