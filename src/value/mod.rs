//! Slot representation shared by stack frames, heap objects and static storage.
//!
//! A [`Slot`] is a tagged union describing one location: a raw primitive, an
//! object handle, a handle to a value-type span on the current frame, or a
//! reference to an instance field, static field or array element that has to
//! be resolved before use.
//!
//! # Key Components
//!
//! - [`Slot`] / [`SlotKind`] - Tagged slot and its discriminant
//! - [`Primitive`] - Raw 8-byte primitive storage
//! - [`HeapRef`] - Observing handle to a heap object
//! - [`ValueTypeHandle`] - Handle to a reserved value-type span

mod slot;

pub use slot::{HeapRef, Primitive, Slot, SlotKind, ValueTypeHandle};
