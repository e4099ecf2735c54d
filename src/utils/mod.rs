//! Small shared helpers.

mod id;

pub use id::IdAllocator;
