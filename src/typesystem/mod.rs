//! Type identities and layouts.
//!
//! Every type the marshalling core works with is described by a
//! [`TypeDescriptor`]: an ordered list of fields with their declared
//! [`ElementType`], the flattened slot offsets derived from it, and the native
//! Rust type bound to it (if any). Descriptors are created once during startup
//! by a [`TypeRegistryBuilder`] and are read-only afterwards.
//!
//! # Key Components
//!
//! - [`TypeToken`] - Identity of a registered type
//! - [`ElementType`] - Declared type of a field, element or parameter
//! - [`TypeDefinition`] - Layout submitted for registration
//! - [`TypeDescriptor`] / [`FieldDescriptor`] - Registered, immutable layouts
//! - [`TypeRegistryBuilder`] / [`TypeRegistry`] - Open and frozen registry phases
//! - [`TypeLookup`] - Read access shared by both phases

mod descriptor;
mod element;
mod registry;
mod token;

pub use descriptor::{FieldDescriptor, NativeBinding, TypeDefinition, TypeDescriptor, TypeFlags};
pub use element::ElementType;
pub use registry::{TypeLookup, TypeRegistry, TypeRegistryBuilder};
pub use token::TypeToken;
