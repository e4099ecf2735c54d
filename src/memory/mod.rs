//! Storage the marshalling core reads from and writes to.
//!
//! # Key Components
//!
//! - [`StackFrame`] - Operand stack of one interpreted call, with value-type spans
//! - [`ValueTypeScope`] - Guard releasing a value-type span on drop
//! - [`ObjectHeap`] - Seam to the host's object heap
//! - [`ManagedHeap`] - Reference heap with objects, arrays and boxed values
//! - [`StaticFieldStorage`] - Static fields keyed by type and field index
//!
//! # Storable Slots
//!
//! Heap objects and static fields only hold terminal, frame-independent slots:
//! primitives, object handles and null. Reference slots and stack value-type
//! handles are rejected with [`MarshalError::UnsupportedSlotKind`], which keeps
//! reference resolution a single step.

mod frame;
mod heap;
mod statics;

pub use frame::{StackFrame, ValueTypeScope};
pub use heap::{HeapObject, ManagedHeap, ObjectHeap, SharedHeap};
pub use statics::StaticFieldStorage;

use crate::{value::Slot, MarshalError, Result};

/// Checks that `slot` may be stored in a heap object or static field.
pub(crate) fn ensure_storable(slot: &Slot, operation: &'static str) -> Result<()> {
    match slot {
        Slot::Primitive(_) | Slot::Object(_) | Slot::Null => Ok(()),
        other => Err(MarshalError::UnsupportedSlotKind {
            operation,
            kind: other.kind(),
        }
        .into()),
    }
}
