/// Alignment quantum. Every pooled block size is a multiple of this.
pub const ALIGN: usize = 8;

/// Largest request served from the free lists. Anything bigger goes
/// straight to the system heap.
pub const MAX_BYTES: usize = 128;

/// One free list per size class: 8, 16, ..., 128 bytes.
pub const NUM_FREE_LISTS: usize = MAX_BYTES / ALIGN;

/// Round `bytes` up to the next multiple of [`ALIGN`].
#[inline]
#[must_use]
pub const fn round_up(bytes: usize) -> usize {
    (bytes + ALIGN - 1) & !(ALIGN - 1)
}

/// Size class index for a request of `bytes`.
///
/// Only defined for `1..=MAX_BYTES`; larger requests never reach the free
/// lists and must be routed around this function.
#[inline]
#[must_use]
pub const fn class_index(bytes: usize) -> usize {
    debug_assert!(bytes >= 1 && bytes <= MAX_BYTES);
    round_up(bytes) / ALIGN - 1
}

/// Block size served by size class `index`.
#[inline]
#[must_use]
pub const fn class_size(index: usize) -> usize {
    debug_assert!(index < NUM_FREE_LISTS);
    (index + 1) * ALIGN
}
