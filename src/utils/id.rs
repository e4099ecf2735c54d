//! Scoped unique-id allocation.
//!
//! Every component that hands out identifiers (the type registry for type
//! tokens, the heap for object ids) owns its own [`IdAllocator`]. Ids are only
//! unique within that component and its lifetime; there is no process-wide
//! counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomically incremented id source owned by a single component.
///
/// # Example
///
/// ```rust
/// use crossbind::IdAllocator;
///
/// let ids = IdAllocator::starting_at(1);
/// assert_eq!(ids.next(), 1);
/// assert_eq!(ids.next(), 2);
/// assert_eq!(ids.peek(), 3);
/// ```
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Creates an allocator whose first id is `first`.
    #[must_use]
    pub const fn starting_at(first: u64) -> Self {
        IdAllocator {
            next: AtomicU64::new(first),
        }
    }

    /// Returns a fresh id.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the id the next call to [`next`](Self::next) will produce.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids() {
        let ids = IdAllocator::default();
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = IdAllocator::starting_at(100);
        let allocated: Vec<u64> = (0..1000).into_par_iter().map(|_| ids.next()).collect();
        let unique: HashSet<u64> = allocated.iter().copied().collect();

        assert_eq!(unique.len(), 1000);
        assert_eq!(ids.peek(), 1100);
    }
}
