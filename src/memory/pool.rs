use super::error::PoolError;
use super::free_list::{FreeListTable, Slot};
use super::heap::{PlatformHeap, SystemHeap};
use super::ledger::{BlockClass, BlockLedger};
use super::region::{PoolRegion, RegionState};
use super::size_class::{ALIGN, MAX_BYTES, NUM_FREE_LISTS, class_index, class_size, round_up};
use super::stats::{Counters, PoolStats};
use super::typed::TypedAllocator;
use std::cell::RefCell;
use std::ptr::NonNull;

/// Blocks requested per refill unless configured otherwise.
pub const DEFAULT_REFILL_BATCH: usize = 20;

/// Configuration for `PoolAllocator`. All fields have sensible defaults.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Blocks of one class requested from the pool region when its free list
    /// runs dry. The region may supply fewer. Default: 20.
    pub refill_batch: usize,

    /// Tag every block with its size class and live/free state and panic on
    /// mismatched sizes, double frees and foreign pointers.
    /// Default: on in debug builds, off in release builds.
    pub validate: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            refill_batch: DEFAULT_REFILL_BATCH,
            validate: cfg!(debug_assertions),
        }
    }
}

impl PoolConfig {
    fn check(&self) -> Result<(), PoolError> {
        if self.refill_batch == 0 {
            return Err(PoolError::InvalidConfig(
                "refill_batch must be at least 1".to_string(),
            ));
        }
        // Largest growth request before the history term: 2 * 128 * batch.
        if self.refill_batch.checked_mul(2 * MAX_BYTES).is_none() {
            return Err(PoolError::InvalidConfig(format!(
                "refill_batch {} overflows the growth request size",
                self.refill_batch
            )));
        }
        Ok(())
    }
}

/// Mutable pool state: free lists, current region, growth history.
pub(crate) struct PoolState {
    free_lists: FreeListTable,
    region: PoolRegion,
    /// Bytes ever obtained from the heap for growth. Never decreases.
    heap_size: usize,
    /// Every growth region obtained from the heap, released on drop.
    chunks: Vec<(NonNull<u8>, usize)>,
    counters: Counters,
    ledger: Option<BlockLedger>,
}

impl PoolState {
    fn new(validate: bool) -> Self {
        Self {
            free_lists: FreeListTable::new(),
            region: PoolRegion::new(),
            heap_size: 0,
            chunks: Vec::new(),
            counters: Counters::default(),
            ledger: validate.then(BlockLedger::new),
        }
    }

    /// Park a block that was never handed out on the list of `class`.
    fn stash(&mut self, block: NonNull<u8>, class: usize) {
        // Safety: block comes out of the current region, which only holds
        // unused memory, and spans exactly class_size(class) bytes.
        unsafe { self.free_lists.push(class, block) };
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.on_stash(block, class);
        }
    }

    /// Replenish the empty list of `class` with up to `batch` blocks and
    /// return one of them for the caller.
    pub fn refill<H: SystemHeap>(
        &mut self,
        heap: &H,
        class: usize,
        batch: usize,
    ) -> Result<NonNull<u8>, PoolError> {
        debug_assert!(self.free_lists.is_empty(class));
        let size = class_size(class);
        let (chunk, count) = self.chunk_alloc(heap, size, batch)?;
        debug_assert!(count >= 1);
        self.counters.refills += 1;

        if count > 1 {
            // Safety: chunk_alloc handed over count * size unused bytes.
            let rest = unsafe { chunk.add(size) };
            // Safety: [rest, chunk + count * size) is unused and ALIGN-aligned.
            unsafe { self.free_lists.push_run(class, rest, count - 1) };
            if let Some(ledger) = self.ledger.as_mut() {
                for i in 1..count {
                    // Safety: i < count, inside the chunk.
                    ledger.on_stash(unsafe { chunk.add(i * size) }, class);
                }
            }
        }
        Ok(chunk)
    }

    /// Carve up to `requested` blocks of `block_size` bytes from the pool
    /// region, growing it from the heap (or from a larger free block) when it
    /// cannot supply even one. Returns the first block and the count obtained.
    ///
    /// # Errors
    ///
    /// `OutOfMemory` when the heap refuses growth and no larger class has a
    /// free block; `CapacityOverflow` if the growth size overflows.
    pub fn chunk_alloc<H: SystemHeap>(
        &mut self,
        heap: &H,
        block_size: usize,
        requested: usize,
    ) -> Result<(NonNull<u8>, usize), PoolError> {
        debug_assert!(block_size > 0 && block_size.is_multiple_of(ALIGN) && requested > 0);
        let total = block_size
            .checked_mul(requested)
            .ok_or(PoolError::CapacityOverflow)?;

        loop {
            let left = self.region.remaining();
            if left >= total {
                return Ok((self.region.bump(total), requested));
            }
            if left >= block_size {
                let count = left / block_size;
                return Ok((self.region.bump(count * block_size), count));
            }

            // Less than one block left: park the fragment on its exact class
            // before the region is replaced.
            if let Some((fragment, len)) = self.region.take_rest() {
                debug_assert!(len.is_multiple_of(ALIGN));
                self.stash(fragment, class_index(len));
            }

            let wanted = total
                .checked_mul(2)
                .and_then(|bytes| bytes.checked_add(round_up(self.heap_size >> 4)))
                .ok_or(PoolError::CapacityOverflow)?;

            match heap.acquire(wanted) {
                Ok(base) => {
                    self.heap_size = self.heap_size.saturating_add(wanted);
                    self.chunks.push((base, wanted));
                    self.counters.chunks_acquired += 1;
                    // Safety: base is a fresh heap block of `wanted` bytes,
                    // released only when the pool drops.
                    unsafe { self.region.install(base, wanted) };
                }
                Err(_err) => {
                    if let Some((block, len)) = self.scavenge(class_index(block_size)) {
                        // Safety: the block was free and is now owned by the region.
                        unsafe { self.region.install(block, len) };
                        continue;
                    }
                    #[cfg(debug_assertions)]
                    eprintln!(
                        "[segpool] out of memory: heap refused {wanted} bytes ({_err}) and no \
                         free block above {block_size} bytes is left to scavenge",
                    );
                    return Err(PoolError::OutOfMemory {
                        block_size,
                        requested: wanted,
                    });
                }
            }
        }
    }

    /// Take one free block from the lowest non-empty class above `class`,
    /// up to and including the largest class.
    fn scavenge(&mut self, class: usize) -> Option<(NonNull<u8>, usize)> {
        let donor = self.free_lists.first_nonempty_above(class)?;
        let block = self.free_lists.pop(donor)?;
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.on_scavenge(block);
        }
        self.counters.scavenges += 1;
        #[cfg(debug_assertions)]
        eprintln!(
            "[segpool] heap growth refused; scavenged a {}-byte block for {}-byte blocks",
            class_size(donor),
            class_size(class),
        );
        Some((block, class_size(donor)))
    }
}

/// Segregated free-list allocator.
///
/// Requests of `1..=MAX_BYTES` bytes are rounded up to a multiple of
/// [`ALIGN`] and served from one of [`NUM_FREE_LISTS`] LIFO free lists,
/// refilled in batches from a bump region grown from the system heap.
/// Larger requests go straight to the heap.
///
/// All operations take `&self`, so any number of [`TypedAllocator`]s can
/// share one pool. The pool is single-threaded (`!Sync`).
///
/// Freed blocks are never returned to the heap while the pool lives; dropping
/// the pool releases every region it grew. Pointers into those regions dangle
/// afterwards. Large blocks still outstanding at drop are the caller's to free.
pub struct PoolAllocator<H: SystemHeap = PlatformHeap> {
    heap: H,
    config: PoolConfig,
    state: RefCell<PoolState>,
}

// Safety: the pool exclusively owns its regions and free lists; moving it to
// another thread moves that ownership along. It stays !Sync via RefCell.
unsafe impl<H: SystemHeap + Send> Send for PoolAllocator<H> {}

impl PoolAllocator<PlatformHeap> {
    /// Create a pool over the C runtime heap with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_heap(PlatformHeap)
    }

    /// Create a pool over the C runtime heap with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is rejected.
    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_heap_and_config(PlatformHeap, config)
    }
}

impl Default for PoolAllocator<PlatformHeap> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: SystemHeap> PoolAllocator<H> {
    pub fn with_heap(heap: H) -> Self {
        let config = PoolConfig::default();
        Self {
            heap,
            state: RefCell::new(PoolState::new(config.validate)),
            config,
        }
    }

    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is rejected.
    pub fn with_heap_and_config(heap: H, config: PoolConfig) -> Result<Self, PoolError> {
        config.check()?;
        Ok(Self {
            heap,
            state: RefCell::new(PoolState::new(config.validate)),
            config,
        })
    }

    /// Allocate `n` bytes, aligned to [`ALIGN`].
    ///
    /// `n == 0` yields a dangling, well-aligned pointer that must not be
    /// dereferenced. `n > MAX_BYTES` is forwarded to the system heap.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::OutOfMemory` when the pool cannot grow, or the
    /// heap's own error for large requests.
    pub fn allocate(&self, n: usize) -> Result<NonNull<u8>, PoolError> {
        if n == 0 {
            return Ok(NonNull::<Slot>::dangling().cast());
        }
        if n > MAX_BYTES {
            let ptr = self.heap.acquire(n)?;
            let mut state = self.state.borrow_mut();
            state.counters.large_acquired(n);
            if let Some(ledger) = state.ledger.as_mut() {
                ledger.on_handout(ptr, BlockClass::Large(n));
            }
            return Ok(ptr);
        }

        let class = class_index(n);
        let mut state = self.state.borrow_mut();
        let ptr = match state.free_lists.pop(class) {
            Some(ptr) => ptr,
            None => state.refill(&self.heap, class, self.config.refill_batch)?,
        };
        if let Some(ledger) = state.ledger.as_mut() {
            ledger.on_handout(ptr, BlockClass::Pooled(class));
        }
        Ok(ptr)
    }

    /// Return a block obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    /// - `ptr` must have been returned by `allocate` on this pool and not
    ///   deallocated since.
    /// - `n` must map to the same size class as the `n` passed to that
    ///   `allocate` call (for `n > MAX_BYTES`, the same `n`).
    /// - The block must not be used afterwards.
    ///
    /// Violations corrupt the free lists. With `PoolConfig::validate` they
    /// panic instead.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, n: usize) {
        if n == 0 {
            return;
        }
        if n > MAX_BYTES {
            {
                let mut state = self.state.borrow_mut();
                if let Some(ledger) = state.ledger.as_mut() {
                    ledger.on_release(ptr, BlockClass::Large(n));
                }
                state.counters.large_released(n);
            }
            // Safety: ptr came from heap.acquire(n) (upheld by caller).
            unsafe { self.heap.release(ptr, n) };
            return;
        }

        let class = class_index(n);
        let mut state = self.state.borrow_mut();
        if let Some(ledger) = state.ledger.as_mut() {
            ledger.on_release(ptr, BlockClass::Pooled(class));
        }
        // Safety: ptr is a class_size(class) block no longer in use (upheld
        // by caller).
        unsafe { state.free_lists.push(class, ptr) };
    }

    /// Typed front-end over this pool.
    pub fn typed<T>(&self) -> TypedAllocator<'_, T, H> {
        TypedAllocator::new(self)
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Heap backing growth and large requests.
    pub fn heap(&self) -> &H {
        &self.heap
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.borrow();
        PoolStats {
            heap_size: state.heap_size,
            chunks_acquired: state.counters.chunks_acquired,
            region_remaining: state.region.remaining(),
            refills: state.counters.refills,
            scavenges: state.counters.scavenges,
            large_live: state.counters.large_live,
            large_live_bytes: state.counters.large_live_bytes,
            free_blocks: state.free_lists.counts(),
        }
    }

    /// Head block of every free list, for identity checks in diagnostics.
    pub fn free_list_heads(&self) -> [Option<NonNull<u8>>; NUM_FREE_LISTS] {
        let state = self.state.borrow();
        std::array::from_fn(|class| state.free_lists.head(class))
    }

    /// Blocks parked on the free list of `class`.
    ///
    /// # Panics
    ///
    /// Panics if `class >= NUM_FREE_LISTS`.
    pub fn free_list_len(&self, class: usize) -> usize {
        self.state.borrow().free_lists.len(class)
    }

    pub fn region_state(&self) -> RegionState {
        self.state.borrow().region.state()
    }

    /// Blocks currently handed out, when validation is on.
    pub fn live_blocks(&self) -> Option<usize> {
        self.state.borrow().ledger.as_ref().map(BlockLedger::live_count)
    }
}

impl<H: SystemHeap> Drop for PoolAllocator<H> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (ptr, size) in state.chunks.drain(..) {
            // Safety: every chunk came from self.heap.acquire(size) and is
            // released exactly once, here.
            unsafe { self.heap.release(ptr, size) };
        }
    }
}
