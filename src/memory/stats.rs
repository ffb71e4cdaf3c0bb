//! Per-pool diagnostic counters.
//!
//! Counters are plain fields updated under the pool's `RefCell` borrow; a
//! [`PoolStats`] is a copy taken at one instant. Do NOT use these values for
//! allocation decisions.

use super::size_class::NUM_FREE_LISTS;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Counters {
    pub refills: usize,
    pub scavenges: usize,
    pub chunks_acquired: usize,
    pub large_live: usize,
    pub large_live_bytes: usize,
}

impl Counters {
    pub fn large_acquired(&mut self, size: usize) {
        self.large_live += 1;
        self.large_live_bytes += size;
    }

    pub fn large_released(&mut self, size: usize) {
        self.large_live = self.large_live.saturating_sub(1);
        self.large_live_bytes = self.large_live_bytes.saturating_sub(size);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Total bytes ever obtained from the system heap for pool growth.
    pub heap_size: usize,
    /// Growth regions obtained from the system heap.
    pub chunks_acquired: usize,
    /// Bytes left in the current pool region.
    pub region_remaining: usize,
    /// Number of `refill` calls.
    pub refills: usize,
    /// Blocks taken from a larger class after the system heap refused growth.
    pub scavenges: usize,
    /// Outstanding allocations above the size-class ceiling.
    pub large_live: usize,
    pub large_live_bytes: usize,
    /// Blocks currently parked on each free list.
    pub free_blocks: [usize; NUM_FREE_LISTS],
}

impl PoolStats {
    /// Bytes parked on free lists across all classes.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.free_blocks
            .iter()
            .enumerate()
            .map(|(idx, &n)| n * super::size_class::class_size(idx))
            .sum()
    }
}
