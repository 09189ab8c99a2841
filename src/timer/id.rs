//! Timer id allocation
//!
//! A monotonic 64-bit counter that never hands out the reserved zero id.

use std::sync::atomic::{AtomicU64, Ordering};

use super::types::INVALID_TIMER_ID;

const FIRST_ID: u64 = 1;

/// Monotonic, non-zero id source.
///
/// Collisions after a full wrap of the 64-bit space are not checked.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Creates an allocator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(FIRST_ID)
    }

    /// Creates an allocator whose first id is `next` (zero is bumped to 1).
    #[must_use]
    pub const fn starting_at(next: u64) -> Self {
        let next = if next == INVALID_TIMER_ID { FIRST_ID } else { next };
        Self {
            next: AtomicU64::new(next),
        }
    }

    /// Returns the current id and advances the counter, skipping zero on wrap.
    pub fn allocate(&self) -> u64 {
        let step = |current: u64| {
            let next = current.wrapping_add(1);
            Some(if next == INVALID_TIMER_ID { FIRST_ID } else { next })
        };
        // The closure never declines, so both arms carry the previous value.
        match self.next.fetch_update(Ordering::AcqRel, Ordering::Acquire, step) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Rewinds the counter so the next id is 1.
    pub fn reset(&self) {
        self.next.store(FIRST_ID, Ordering::Release);
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
