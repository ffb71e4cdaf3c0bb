//! Validating block ledger.
//!
//! The pool itself carries no per-block header, so a mismatched size on
//! `deallocate`, a double free or a foreign pointer silently corrupt the free
//! lists. When `PoolConfig::validate` is set, every block the pool touches is
//! tagged here with its class and live/free state and each transition is
//! checked. Violations panic.

use std::collections::HashMap;
use std::ptr::NonNull;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockClass {
    Pooled(usize),
    Large(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockState {
    Live,
    Free,
}

#[derive(Clone, Copy, Debug)]
struct BlockTag {
    class: BlockClass,
    state: BlockState,
}

#[derive(Default)]
pub(crate) struct BlockLedger {
    tags: HashMap<usize, BlockTag>,
}

impl BlockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A block is being handed to a caller.
    pub fn on_handout(&mut self, ptr: NonNull<u8>, class: BlockClass) {
        let addr = ptr.as_ptr() as usize;
        if let Some(tag) = self.tags.get(&addr) {
            assert!(
                tag.state == BlockState::Free,
                "pool corruption: block {ptr:p} handed out while already live",
            );
            assert!(
                tag.class == class,
                "pool corruption: block {ptr:p} sits on list {class:?} but was freed as {:?}",
                tag.class,
            );
        }
        self.tags.insert(addr, BlockTag { class, state: BlockState::Live });
    }

    /// A caller is returning a block.
    pub fn on_release(&mut self, ptr: NonNull<u8>, class: BlockClass) {
        let addr = ptr.as_ptr() as usize;
        let Some(tag) = self.tags.get_mut(&addr) else {
            panic!("deallocate of {ptr:p} which was never allocated from this pool");
        };
        assert!(
            tag.state == BlockState::Live,
            "double deallocate of {ptr:p}",
        );
        assert!(
            same_class(tag.class, class),
            "deallocate of {ptr:p} as {class:?} but it was allocated as {:?}",
            tag.class,
        );
        match class {
            BlockClass::Pooled(_) => tag.state = BlockState::Free,
            BlockClass::Large(_) => {
                self.tags.remove(&addr);
            }
        }
    }

    /// A block entered a free list without ever being handed out (refill
    /// surplus, stashed fragment).
    pub fn on_stash(&mut self, ptr: NonNull<u8>, class: usize) {
        self.tags.insert(
            ptr.as_ptr() as usize,
            BlockTag { class: BlockClass::Pooled(class), state: BlockState::Free },
        );
    }

    /// A free block was taken off its list to serve as a pool region.
    pub fn on_scavenge(&mut self, ptr: NonNull<u8>) {
        self.tags.remove(&(ptr.as_ptr() as usize));
    }

    pub fn live_count(&self) -> usize {
        self.tags.values().filter(|t| t.state == BlockState::Live).count()
    }
}

fn same_class(a: BlockClass, b: BlockClass) -> bool {
    match (a, b) {
        (BlockClass::Pooled(x), BlockClass::Pooled(y)) => x == y,
        (BlockClass::Large(x), BlockClass::Large(y)) => x == y,
        _ => false,
    }
}
