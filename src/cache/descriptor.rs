//! Descriptor allocation
//!
//! Bindless descriptor slots are allocated from a fixed-capacity segment.
//! Each slot carries a generation that is bumped on release, so stale
//! [`VersionedBindlessHandle`]s from a previous occupant never validate
//! against the current one.

use parking_lot::Mutex;

use crate::core::{BindlessIndex, Generation, VersionedBindlessHandle};
use crate::errors::{EmberError, Result};

/// An allocated descriptor slot. The registry takes ownership of the handle
/// when a view is registered under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHandle {
    handle: VersionedBindlessHandle,
}

impl DescriptorHandle {
    #[inline]
    #[must_use]
    pub const fn new(handle: VersionedBindlessHandle) -> Self {
        Self { handle }
    }

    #[inline]
    #[must_use]
    pub const fn bindless(self) -> VersionedBindlessHandle {
        self.handle
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> BindlessIndex {
        self.handle.index()
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.handle.is_valid()
    }
}

/// Allocator of bindless descriptor slots.
pub trait DescriptorAllocator: Send + Sync {
    /// Allocates a slot. Fails when the segment is exhausted; the registry
    /// surfaces the failure without leaking anything.
    fn allocate(&self) -> Result<DescriptorHandle>;

    /// Returns a slot to the free list and bumps its generation.
    fn release(&self, index: BindlessIndex);

    /// Number of slots still available.
    fn remaining(&self) -> u32;

    /// Number of slots currently allocated.
    fn allocated(&self) -> u32;
}

struct SegmentState {
    next: u32,
    free_list: Vec<u32>,
    generations: Vec<Generation>,
    allocated: u32,
}

/// Fixed-capacity descriptor segment with free-list reuse.
pub struct FixedDescriptorAllocator {
    base_index: u32,
    capacity: u32,
    state: Mutex<SegmentState>,
}

impl FixedDescriptorAllocator {
    #[must_use]
    pub fn new(base_index: u32, capacity: u32) -> Self {
        Self {
            base_index,
            capacity,
            state: Mutex::new(SegmentState {
                next: 0,
                free_list: Vec::new(),
                generations: vec![Generation(0); capacity as usize],
                allocated: 0,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    fn slot_of(&self, index: BindlessIndex) -> Option<u32> {
        let raw = index.get();
        if raw < self.base_index || raw >= self.base_index + self.capacity {
            return None;
        }
        Some(raw - self.base_index)
    }
}

impl DescriptorAllocator for FixedDescriptorAllocator {
    fn allocate(&self) -> Result<DescriptorHandle> {
        let mut state = self.state.lock();
        let slot = if let Some(slot) = state.free_list.pop() {
            slot
        } else if state.next < self.capacity {
            let slot = state.next;
            state.next += 1;
            slot
        } else {
            return Err(EmberError::DescriptorAllocationFailed(format!(
                "segment exhausted ({} slots)",
                self.capacity
            )));
        };
        state.allocated += 1;
        let generation = state.generations[slot as usize];
        Ok(DescriptorHandle::new(VersionedBindlessHandle::new(
            BindlessIndex(self.base_index + slot),
            generation,
        )))
    }

    fn release(&self, index: BindlessIndex) {
        let Some(slot) = self.slot_of(index) else {
            log::warn!("descriptor release outside segment: {index}");
            return;
        };
        let mut state = self.state.lock();
        if state.free_list.contains(&slot) {
            log::warn!("double release of descriptor {index}");
            return;
        }
        state.generations[slot as usize] = state.generations[slot as usize].next();
        state.free_list.push(slot);
        state.allocated = state.allocated.saturating_sub(1);
    }

    fn remaining(&self) -> u32 {
        let state = self.state.lock();
        (self.capacity - state.next) + state.free_list.len() as u32
    }

    fn allocated(&self) -> u32 {
        self.state.lock().allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_distinct_slots_until_exhausted() {
        let alloc = FixedDescriptorAllocator::new(100, 3);
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        let c = alloc.allocate().unwrap();
        assert_ne!(a.index(), b.index());
        assert_ne!(b.index(), c.index());
        assert_eq!(alloc.remaining(), 0);
        assert!(alloc.allocate().is_err());
    }

    #[test]
    fn release_bumps_generation_on_reuse() {
        let alloc = FixedDescriptorAllocator::new(0, 1);
        let first = alloc.allocate().unwrap();
        alloc.release(first.index());
        let second = alloc.allocate().unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.bindless(), second.bindless());
        assert_eq!(second.bindless().generation(), first.bindless().generation().next());
    }

    #[test]
    fn counts_track_allocate_and_release() {
        let alloc = FixedDescriptorAllocator::new(0, 4);
        assert_eq!(alloc.remaining(), 4);
        let a = alloc.allocate().unwrap();
        let _b = alloc.allocate().unwrap();
        assert_eq!(alloc.allocated(), 2);
        assert_eq!(alloc.remaining(), 2);
        alloc.release(a.index());
        assert_eq!(alloc.allocated(), 1);
        assert_eq!(alloc.remaining(), 3);
    }
}
