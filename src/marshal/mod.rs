//! Moving values between native code and interpreter storage.
//!
//! This module contains the two halves of the marshalling boundary: the
//! [`DescriptorTable`], which resolves reference slots to the storage they
//! name, and the [`Marshaller`], which copies native values into and out of
//! stack frames, heap boxes and referenced locations.
//!
//! # Key Components
//!
//! - [`DescriptorTable`] - Resolves and stores through field, static-field and array references
//! - [`Marshaller`] - Stateless copy, push/pop, box/unbox and write-back of values
//! - [`FieldCodec`] / [`ValueType`] - Per-type field encoding, generated by [`value_type!`](crate::value_type)
//! - [`FieldSink`] / [`FieldSource`] - Cursors over the flattened slots of a value
//!
//! # Thread Safety
//!
//! [`DescriptorTable`] is `Send + Sync`: the registry is frozen and the heap
//! and static storage are concurrent maps. [`Marshaller`] holds only a shared
//! borrow of the table.

mod codec;
mod descriptor;
mod marshaller;

pub use codec::{FieldCodec, FieldSink, FieldSource, ValueType};
pub use descriptor::DescriptorTable;
pub use marshaller::Marshaller;
