//! Recycling allocator for entity references.

use crate::EntityRef;
use core::marker::PhantomData;
use std::collections::BTreeSet;

/// An allocator handing out the smallest unused entity reference.
///
/// Tables whose entries are deleted and recreated (subject-graph nodes)
/// cannot use a push-only [`PrimaryMap`](crate::PrimaryMap) alone: deleted
/// ids must be reused so the id space, and every side table indexed by it,
/// stays dense. An `IdPool` tracks the released ids below its high-water
/// mark in an ordered set, so `take` and `release` are O(log n) and `take`
/// always returns the smallest id available.
#[derive(Clone, Debug)]
pub struct IdPool<K>
where
    K: EntityRef,
{
    /// Ids below `next` that have been released.
    free: BTreeSet<u32>,
    /// The smallest id never handed out.
    next: u32,
    unused: PhantomData<K>,
}

impl<K> IdPool<K>
where
    K: EntityRef + Ord,
{
    /// Create a new empty pool.
    pub fn new() -> Self {
        Self {
            free: BTreeSet::new(),
            next: 0,
            unused: PhantomData,
        }
    }

    /// Allocate the smallest unused id.
    pub fn take(&mut self) -> K {
        if let Some(&id) = self.free.iter().next() {
            self.free.remove(&id);
            K::new(id as usize)
        } else {
            let id = self.next;
            self.next += 1;
            K::new(id as usize)
        }
    }

    /// Return a previously taken id to the pool.
    ///
    /// Panics if `k` was never taken or is already free.
    pub fn release(&mut self, k: K) {
        let id = k.index() as u32;
        assert!(id < self.next, "released an id that was never allocated");
        let fresh = self.free.insert(id);
        assert!(fresh, "id released twice");
    }

    /// Is `k` currently allocated?
    pub fn is_live(&self, k: K) -> bool {
        let id = k.index() as u32;
        id < self.next && !self.free.contains(&id)
    }

    /// Number of ids currently allocated.
    pub fn len(&self) -> usize {
        self.next as usize - self.free.len()
    }

    /// Is the pool empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One past the largest id ever allocated. Side tables indexed by ids
    /// from this pool should be sized to this bound.
    pub fn bound(&self) -> usize {
        self.next as usize
    }

    /// Forget all allocations.
    pub fn clear(&mut self) {
        self.free.clear();
        self.next = 0;
    }
}

impl<K> Default for IdPool<K>
where
    K: EntityRef + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
