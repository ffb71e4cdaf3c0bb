//! Object lifetime helpers for pool-backed storage.
//!
//! Allocation hands out raw, uninitialized memory. These helpers place values
//! into it and tear them down again without touching the allocation itself.
//! The range variants are panic-safe: if a clone panics partway through, the
//! elements already written are dropped before the panic continues.

use std::mem::needs_drop;
use std::ptr;

/// Move `value` into `dst` without reading or dropping the old contents.
///
/// # Safety
/// `dst` must be valid for writes and properly aligned for `T`.
pub unsafe fn construct<T>(dst: *mut T, value: T) {
    // Safety: upheld by caller.
    unsafe { dst.write(value) };
}

/// Drop the value at `ptr` in place.
///
/// # Safety
/// `ptr` must point to an initialized `T` that is not used again until it is
/// re-constructed.
pub unsafe fn destroy<T>(ptr: *mut T) {
    // Safety: upheld by caller.
    unsafe { ptr::drop_in_place(ptr) };
}

/// Drop `len` consecutive values starting at `first`.
///
/// # Safety
/// `first..first + len` must hold initialized values of `T`.
pub unsafe fn destroy_range<T>(first: *mut T, len: usize) {
    if !needs_drop::<T>() {
        return;
    }
    // Safety: upheld by caller.
    unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(first, len)) };
}

/// Drops the prefix written so far if a clone unwinds.
struct PartialInit<T> {
    start: *mut T,
    written: usize,
}

impl<T> Drop for PartialInit<T> {
    fn drop(&mut self) {
        // Safety: exactly `written` elements were initialized from `start`.
        unsafe { destroy_range(self.start, self.written) };
    }
}

/// Fill `len` uninitialized slots starting at `dst` with clones of `value`
/// and return one past the last written element.
///
/// # Safety
/// `dst..dst + len` must be valid for writes, aligned, and uninitialized
/// (or hold values the caller is content to leak).
pub unsafe fn uninitialized_fill<T: Clone>(dst: *mut T, len: usize, value: &T) -> *mut T {
    let mut guard = PartialInit { start: dst, written: 0 };
    while guard.written < len {
        // Safety: written < len, inside the caller's range.
        unsafe { dst.add(guard.written).write(value.clone()) };
        guard.written += 1;
    }
    std::mem::forget(guard);
    // Safety: one past the end of the caller's range.
    unsafe { dst.add(len) }
}

/// Clone `src` into uninitialized storage at `dst` and return one past the
/// last written element.
///
/// # Safety
/// `dst..dst + src.len()` must be valid for writes, aligned, uninitialized,
/// and must not overlap `src`.
pub unsafe fn uninitialized_copy<T: Clone>(src: &[T], dst: *mut T) -> *mut T {
    let mut guard = PartialInit { start: dst, written: 0 };
    for item in src {
        // Safety: written < src.len(), inside the caller's range.
        unsafe { dst.add(guard.written).write(item.clone()) };
        guard.written += 1;
    }
    std::mem::forget(guard);
    // Safety: one past the end of the caller's range.
    unsafe { dst.add(src.len()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::mem::MaybeUninit;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    /// Counts drops; cloning panics once `clones_left` reaches zero.
    struct Tracked<'a> {
        drops: &'a Cell<usize>,
        clones_left: &'a Cell<usize>,
    }

    impl Clone for Tracked<'_> {
        fn clone(&self) -> Self {
            let left = self.clones_left.get();
            assert!(left > 0, "clone budget exhausted");
            self.clones_left.set(left - 1);
            Self {
                drops: self.drops,
                clones_left: self.clones_left,
            }
        }
    }

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn test_construct_and_destroy() {
        let rc = Rc::new(());
        let mut slot = MaybeUninit::<Rc<()>>::uninit();
        // Safety: Test code.
        unsafe {
            construct(slot.as_mut_ptr(), Rc::clone(&rc));
            assert_eq!(Rc::strong_count(&rc), 2);
            destroy(slot.as_mut_ptr());
        }
        assert_eq!(Rc::strong_count(&rc), 1);
    }

    #[test]
    fn test_fill_then_destroy_range() {
        let rc = Rc::new(());
        let mut buf: [MaybeUninit<Rc<()>>; 6] = [const { MaybeUninit::uninit() }; 6];
        let dst = buf.as_mut_ptr().cast::<Rc<()>>();
        // Safety: Test code.
        unsafe {
            let end = uninitialized_fill(dst, 6, &rc);
            assert_eq!(end.offset_from(dst), 6);
            assert_eq!(Rc::strong_count(&rc), 7);
            destroy_range(dst, 6);
        }
        assert_eq!(Rc::strong_count(&rc), 1);
    }

    #[test]
    fn test_copy_clones_every_element() {
        let src: Vec<String> = (0..5).map(|i| format!("item-{i}")).collect();
        let mut buf: [MaybeUninit<String>; 5] = [const { MaybeUninit::uninit() }; 5];
        let dst = buf.as_mut_ptr().cast::<String>();
        // Safety: Test code.
        unsafe {
            let end = uninitialized_copy(&src, dst);
            assert_eq!(end.offset_from(dst), 5);
            let copied = std::slice::from_raw_parts(dst, 5);
            assert_eq!(copied, src.as_slice());
            destroy_range(dst, 5);
        }
    }

    #[test]
    fn test_destroy_range_trivial_type_is_noop() {
        let mut nums = [1u32, 2, 3];
        // Safety: Test code.
        unsafe { destroy_range(nums.as_mut_ptr(), 3) };
        assert_eq!(nums, [1, 2, 3]);
    }

    #[test]
    fn test_fill_panic_drops_written_prefix() {
        let drops = Cell::new(0);
        let clones_left = Cell::new(3);
        let proto = Tracked {
            drops: &drops,
            clones_left: &clones_left,
        };
        let mut buf: [MaybeUninit<Tracked<'_>>; 8] = [const { MaybeUninit::uninit() }; 8];
        let dst = buf.as_mut_ptr().cast::<Tracked<'_>>();

        let result = catch_unwind(AssertUnwindSafe(|| {
            // Safety: Test code.
            unsafe { uninitialized_fill(dst, 8, &proto) };
        }));
        assert!(result.is_err());
        // Three clones were written, then dropped by the guard.
        assert_eq!(drops.get(), 3);
        drop(proto);
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn test_copy_panic_drops_written_prefix() {
        let drops = Cell::new(0);
        let clones_left = Cell::new(2);
        let src: Vec<Tracked<'_>> = (0..4)
            .map(|_| Tracked {
                drops: &drops,
                clones_left: &clones_left,
            })
            .collect();
        let mut buf: [MaybeUninit<Tracked<'_>>; 4] = [const { MaybeUninit::uninit() }; 4];
        let dst = buf.as_mut_ptr().cast::<Tracked<'_>>();

        let result = catch_unwind(AssertUnwindSafe(|| {
            // Safety: Test code.
            unsafe { uninitialized_copy(&src, dst) };
        }));
        assert!(result.is_err());
        assert_eq!(drops.get(), 2);
        drop(src);
        assert_eq!(drops.get(), 6);
    }
}
