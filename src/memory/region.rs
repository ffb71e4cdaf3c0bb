use std::ptr::NonNull;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionState {
    /// No region has been installed yet.
    Uninitialized,
    /// Bytes remain for bump allocation.
    Active,
    /// The current region is used up; the next refill must grow.
    Exhausted,
}

/// Contiguous bump range `[cursor, end)` that fresh blocks are carved from.
pub(crate) struct PoolRegion {
    cursor: *mut u8,
    end: *mut u8,
}

impl PoolRegion {
    pub const fn new() -> Self {
        Self {
            cursor: std::ptr::null_mut(),
            end: std::ptr::null_mut(),
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.end as usize - self.cursor as usize
    }

    pub fn state(&self) -> RegionState {
        if self.end.is_null() {
            RegionState::Uninitialized
        } else if self.remaining() == 0 {
            RegionState::Exhausted
        } else {
            RegionState::Active
        }
    }

    /// Install `[base, base + len)` as the current region.
    ///
    /// # Safety
    /// The range must be writable and stay valid while the pool is alive.
    pub unsafe fn install(&mut self, base: NonNull<u8>, len: usize) {
        self.cursor = base.as_ptr();
        // Safety: base + len is one past the end of the range (upheld by caller).
        self.end = unsafe { base.as_ptr().add(len) };
    }

    /// Advance the cursor by `bytes` and return the old cursor.
    pub fn bump(&mut self, bytes: usize) -> NonNull<u8> {
        debug_assert!(bytes > 0 && bytes <= self.remaining());
        let start = self.cursor;
        // Safety: bytes <= remaining, so the new cursor stays within [cursor, end].
        self.cursor = unsafe { self.cursor.add(bytes) };
        // Safety: cursor is non-null once a region is installed and bytes > 0.
        unsafe { NonNull::new_unchecked(start) }
    }

    /// Hand out whatever is left, leaving the region exhausted.
    pub fn take_rest(&mut self) -> Option<(NonNull<u8>, usize)> {
        let len = self.remaining();
        if len == 0 {
            return None;
        }
        Some((self.bump(len), len))
    }
}
