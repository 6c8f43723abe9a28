//! Sequential user id assignment.

use shared::{UserId, FIRST_USER_ID};
use std::sync::atomic::{AtomicU16, Ordering};

/// Hands out user ids in order, starting at a base value and wrapping back
/// to that base after `u16::MAX`.
///
/// Ids are not reclaimed on disconnect. Once the counter wraps, a new
/// client may receive an id that a long-lived client still holds; this is
/// accepted behavior.
#[derive(Debug)]
pub struct UserIdAllocator {
    base: UserId,
    next: AtomicU16,
}

impl UserIdAllocator {
    pub fn new(base: UserId) -> Self {
        Self::starting_at(base, base)
    }

    /// Allocator whose next id is `next` but which still wraps to `base`.
    pub fn starting_at(base: UserId, next: UserId) -> Self {
        Self {
            base,
            next: AtomicU16::new(next),
        }
    }

    /// Returns the next id and advances the counter in one atomic step.
    pub fn allocate(&self) -> UserId {
        let base = self.base;
        let previous = self.next.fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| {
            Some(if id == UserId::MAX { base } else { id + 1 })
        });
        // The closure always returns Some, so both arms hold the prior value.
        match previous {
            Ok(id) | Err(id) => id,
        }
    }
}

impl Default for UserIdAllocator {
    fn default() -> Self {
        Self::new(FIRST_USER_ID)
    }
}
