use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StoreId(u64);

impl StoreId {
    pub fn new(id: u64) -> Self {
        StoreId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RegionId(u64);

impl RegionId {
    pub fn new(id: u64) -> Self {
        RegionId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PeerId(u64);

impl PeerId {
    pub fn new(id: u64) -> Self {
        PeerId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// IdAllocator hands out simulator-owned ids from a bounded range. Stores, regions and peers all
/// share the one counter, so any id it returns is globally unique.
///
/// The control plane is told about `limit()` at bootstrap so that the ids it allocates start above
/// this range and can never collide with ours.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
    limit: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("Id allocator exhausted at {limit}")]
pub struct IdExhausted {
    pub limit: u64,
}

impl IdAllocator {
    /// `new()` creates an allocator whose first id is `max_used + 1` and which can hand out at
    /// most `budget` ids.
    pub fn new(max_used: u64, budget: u64) -> Self {
        IdAllocator {
            next: AtomicU64::new(max_used + 1),
            limit: max_used.saturating_add(budget),
        }
    }

    pub fn alloc(&self) -> Result<u64, IdExhausted> {
        self.alloc_many(1)
    }

    /// Reserve `count` consecutive ids atomically and return the first one. Either all ids are
    /// reserved, or none are.
    pub fn alloc_many(&self, count: u64) -> Result<u64, IdExhausted> {
        let mut current = self.next.load(Ordering::Acquire);
        loop {
            let end = current.saturating_add(count);
            if end > self.limit.saturating_add(1) {
                return Err(IdExhausted { limit: self.limit });
            }
            match self
                .next
                .compare_exchange_weak(current, end, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(current),
                Err(observed) => current = observed,
            }
        }
    }

    /// Highest id this allocator may ever return.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        (self.limit + 1).saturating_sub(self.next.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_monotonic_and_bounded() {
        let ids = IdAllocator::new(10, 3);
        assert_eq!(11, ids.alloc().unwrap());
        assert_eq!(12, ids.alloc().unwrap());
        assert_eq!(13, ids.alloc().unwrap());
        assert!(ids.alloc().is_err());
        assert_eq!(0, ids.remaining());
    }

    #[test]
    fn alloc_many_is_all_or_nothing() {
        let ids = IdAllocator::new(0, 5);
        assert_eq!(1, ids.alloc_many(4).unwrap());
        assert!(ids.alloc_many(2).is_err());
        // Failed reservation must not consume the last id.
        assert_eq!(5, ids.alloc().unwrap());
    }
}
