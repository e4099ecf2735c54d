// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # crossbind
//!
//! Typed value marshalling between native Rust code and an embedded bytecode
//! interpreter's stack frames, heap objects and static fields.
//!
//! An interpreter that runs .NET-style bytecode keeps every value in untyped
//! 8-byte [`Slot`]s. Native code wants real structs. `crossbind` sits on that
//! boundary: it knows the flattened layout of every registered value type,
//! resolves reference slots (instance fields, static fields, array elements)
//! to the storage they name, copies values in both directions, and lets hot
//! methods be redirected to native trampolines that run directly on the
//! caller's frame.
//!
//! ## Features
//!
//! - **Declarative value types** - [`value_type!`] generates the layout and the field codec from one declaration
//! - **Frame-local value storage** - value types live in LIFO spans reserved at the top of each [`StackFrame`]
//! - **Reference resolution** - [`DescriptorTable`] reads and writes through field, static-field and array references
//! - **Boxing** - values move to and from heap boxes with [`Marshaller::box_value`] and [`Marshaller::unbox_value`]
//! - **Write-back** - [`Marshaller::write_back`] commits a result to the location a caller handed in
//! - **Method redirection** - frozen, lock-free [`RedirectionTable`] of native trampolines
//!
//! ## Quick Start
//!
//! ```rust
//! use crossbind::prelude::*;
//!
//! let runtime = Runtime::builder()?.build()?;
//! let marshaller = runtime.marshaller();
//! let mut frame = runtime.new_frame();
//!
//! marshaller.push_value(&mut frame, &Vector3::new(1.0, 2.0, 3.0))?;
//! let boxed = marshaller.box_value(&Vector3::new(4.0, 5.0, 6.0))?;
//! let unboxed: Vector3 = marshaller.unbox_value(boxed)?;
//!
//! let top: Vector3 = marshaller.pop_value(&mut frame)?;
//! assert_eq!(top.dot(&unboxed), 32.0);
//! # Ok::<(), crossbind::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`typesystem`] - Type tokens, element types, layouts and the type registry
//! - [`value`] - The [`Slot`] tagged union
//! - [`memory`] - Stack frames, the object heap and static field storage
//! - [`marshal`] - Descriptor table, field codecs and the marshaller
//! - [`redirect`] - Method signatures, trampolines and the redirection table
//! - [`bindings`] - Built-in value types and their redirections
//! - [`runtime`] - Configuration and process-level wiring
//!
//! ## Thread Safety
//!
//! Registration happens once, single-threaded, through [`RuntimeBuilder`].
//! Afterwards the registry and the redirection table are frozen and shared
//! read-only; the heap and static storage are concurrent maps. A
//! [`StackFrame`] belongs to exactly one interpreter thread.

#[macro_use]
pub(crate) mod macros;

pub(crate) mod error;
pub(crate) mod utils;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use crossbind::prelude::*;
///
/// let runtime = Runtime::builder()?.build()?;
/// let token = runtime.types().token_of::<ObscuredInt>()?;
/// assert!(runtime.types().require(token)?.is_value_type());
/// # Ok::<(), crossbind::Error>(())
/// ```
pub mod prelude;

/// Type identities, element types, layouts and the type registry.
pub mod typesystem;

/// The slot representation shared by frames, heap objects and static storage.
pub mod value;

/// Stack frames, the object heap and static field storage.
pub mod memory;

/// Descriptor table, field codecs and the value marshaller.
pub mod marshal;

/// Redirection of methods to native trampolines.
pub mod redirect;

/// Built-in value types and their redirections.
pub mod bindings;

/// Runtime configuration and wiring.
pub mod runtime;

/// `crossbind` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `crossbind` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Detailed marshalling failures, wrapped by [`Error::Marshal`].
pub use error::MarshalError;

pub use bindings::{ObscuredInt, Vector3};
pub use marshal::{DescriptorTable, FieldCodec, FieldSink, FieldSource, Marshaller, ValueType};
pub use memory::{
    HeapObject, ManagedHeap, ObjectHeap, SharedHeap, StackFrame, StaticFieldStorage,
    ValueTypeScope,
};
pub use redirect::{
    MethodSignature, RedirectContext, RedirectOutcome, RedirectionTable, RedirectionTableBuilder,
    Trampoline,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use typesystem::{
    ElementType, FieldDescriptor, NativeBinding, TypeDefinition, TypeDescriptor, TypeFlags,
    TypeLookup, TypeRegistry, TypeRegistryBuilder, TypeToken,
};
pub use utils::IdAllocator;
pub use value::{HeapRef, Primitive, Slot, SlotKind, ValueTypeHandle};
