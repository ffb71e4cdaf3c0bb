//! Segregated free-list pool allocator.
//!
//! Small requests (`1..=MAX_BYTES` bytes) are rounded up to a multiple of
//! `ALIGN` and served from one of `NUM_FREE_LISTS` per-size free lists that
//! are refilled in batches from a bump region. Everything larger goes
//! straight to the system heap. See [`PoolAllocator`] and [`TypedAllocator`].

// public module: contains implementation details (hidden via pub(crate))
pub mod memory;

// allocators
pub use memory::heap::{PlatformHeap, SystemHeap};
pub use memory::pool::{DEFAULT_REFILL_BATCH, PoolAllocator, PoolConfig};
pub use memory::region::RegionState;
pub use memory::typed::TypedAllocator;

// size classes
pub use memory::size_class::{ALIGN, MAX_BYTES, NUM_FREE_LISTS, class_index, class_size, round_up};

// object lifetime
pub use memory::construct::{construct, destroy, destroy_range, uninitialized_copy, uninitialized_fill};

// stats/errors
pub use memory::error::PoolError;
pub use memory::stats::PoolStats;
