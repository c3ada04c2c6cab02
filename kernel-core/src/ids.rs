//! Identifier types shared across the kernel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A kernel-assigned process identifier. Monotonic within a single boot;
/// never reused (spec.md §9 Open Question: the counter restarts at
/// `max(persisted pid) + 1` after a restart, see [`PidAllocator::restore`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(pub u64);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates monotonically increasing PIDs for one kernel uptime.
#[derive(Debug)]
pub struct PidAllocator {
    next: AtomicU64,
}

impl PidAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    /// Seed the allocator from the highest PID found in durable storage.
    pub fn restore(max_persisted: Option<u64>) -> Self {
        let next = max_persisted.map(|p| p + 1).unwrap_or(1);
        Self { next: AtomicU64::new(next) }
    }

    pub fn allocate(&self) -> Pid {
        Pid(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A TTY session id, unique per kernel uptime.
pub type TtyId = uuid::Uuid;

/// A user id.
pub type UserId = uuid::Uuid;

/// An org id.
pub type OrgId = uuid::Uuid;

/// A team id.
pub type TeamId = uuid::Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_is_monotonic() {
        let alloc = PidAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(b.0 > a.0);
    }

    #[test]
    fn restore_continues_past_max() {
        let alloc = PidAllocator::restore(Some(41));
        assert_eq!(alloc.allocate(), Pid(42));
    }

    #[test]
    fn restore_with_no_rows_starts_at_one() {
        let alloc = PidAllocator::restore(None);
        assert_eq!(alloc.allocate(), Pid(1));
    }
}
