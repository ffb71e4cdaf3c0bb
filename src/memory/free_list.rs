use super::size_class::{ALIGN, NUM_FREE_LISTS, class_size};
use fixedbitset::FixedBitSet;
use std::ptr::NonNull;

/// Overlay for a pooled block.
///
/// While a block sits on a free list its first word is `next`, the link to
/// the following block of the same size class. The overlay is only valid
/// between deallocation and the next allocation of that exact block; once a
/// block is handed out its bytes belong to the caller and `next` must never
/// be read.
#[repr(C)]
pub(crate) union Slot {
    next: Option<NonNull<Slot>>,
    #[allow(dead_code)]
    payload: [u8; ALIGN],
}

const _: () = assert!(std::mem::size_of::<Slot>() <= ALIGN);

/// One LIFO list per size class, plus per-class counts and an occupancy mask
/// of non-empty classes.
pub(crate) struct FreeListTable {
    heads: [Option<NonNull<Slot>>; NUM_FREE_LISTS],
    counts: [usize; NUM_FREE_LISTS],
    occupied: FixedBitSet,
}

impl FreeListTable {
    pub fn new() -> Self {
        Self {
            heads: [None; NUM_FREE_LISTS],
            counts: [0; NUM_FREE_LISTS],
            occupied: FixedBitSet::with_capacity(NUM_FREE_LISTS),
        }
    }

    #[inline]
    pub fn is_empty(&self, class: usize) -> bool {
        self.heads[class].is_none()
    }

    #[inline]
    pub fn len(&self, class: usize) -> usize {
        self.counts[class]
    }

    #[inline]
    pub fn head(&self, class: usize) -> Option<NonNull<u8>> {
        self.heads[class].map(NonNull::cast)
    }

    /// Remove and return the head block of list `class`.
    pub fn pop(&mut self, class: usize) -> Option<NonNull<u8>> {
        let head = self.heads[class]?;
        // Safety: every block on the list was written by push/push_run and has
        // not been handed out since, so its link word is initialized.
        self.heads[class] = unsafe { (*head.as_ptr()).next };
        self.counts[class] -= 1;
        if self.heads[class].is_none() {
            self.occupied.set(class, false);
        }
        Some(head.cast())
    }

    /// Make `block` the new head of list `class`.
    ///
    /// # Safety
    /// - `block` must be ALIGN-aligned and writable for `class_size(class)` bytes.
    /// - `block` must not already be on any list and must not be in use.
    pub unsafe fn push(&mut self, class: usize, block: NonNull<u8>) {
        let slot = block.cast::<Slot>();
        // Safety: upheld by caller.
        unsafe { slot.as_ptr().write(Slot { next: self.heads[class] }) };
        self.heads[class] = Some(slot);
        self.counts[class] += 1;
        self.occupied.insert(class);
    }

    /// Link `count` contiguous blocks of `class`, starting at `first`, ahead
    /// of the current head. Lower addresses come off the list first.
    ///
    /// # Safety
    /// `[first, first + count * class_size(class))` must be writable, unused
    /// memory, ALIGN-aligned at `first`.
    pub unsafe fn push_run(&mut self, class: usize, first: NonNull<u8>, count: usize) {
        if count == 0 {
            return;
        }
        let size = class_size(class);
        let mut tail = self.heads[class];
        // Walk backwards so each block links to the one above it.
        for i in (0..count).rev() {
            // Safety: i * size is inside the run (upheld by caller).
            let slot = unsafe { first.add(i * size) }.cast::<Slot>();
            // Safety: slot is writable (upheld by caller).
            unsafe { slot.as_ptr().write(Slot { next: tail }) };
            tail = Some(slot);
        }
        self.heads[class] = tail;
        self.counts[class] += count;
        self.occupied.insert(class);
    }

    /// Lowest non-empty class strictly above `class`.
    pub fn first_nonempty_above(&self, class: usize) -> Option<usize> {
        self.occupied.ones().find(|&idx| idx > class)
    }

    pub fn counts(&self) -> [usize; NUM_FREE_LISTS] {
        self.counts
    }
}
