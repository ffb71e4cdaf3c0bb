use super::error::PoolError;
use std::io;
use std::ptr::NonNull;

/// Source of raw memory behind the pool: growth regions and every request
/// above the size-class ceiling.
pub trait SystemHeap {
    /// Obtain `size` bytes, aligned to at least [`ALIGN`](super::size_class::ALIGN).
    ///
    /// # Errors
    ///
    /// Returns `PoolError::HeapAllocFailed` when the heap cannot satisfy the
    /// request.
    fn acquire(&self, size: usize) -> Result<NonNull<u8>, PoolError>;

    /// Return memory obtained from [`acquire`](Self::acquire).
    ///
    /// # Safety
    /// - `ptr` must come from `acquire` on this heap and not be released yet.
    /// - `size` must be the size passed to that `acquire` call.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

/// The C runtime heap (`malloc` / `free`).
#[derive(Clone, Copy, Debug, Default)]
pub struct PlatformHeap;

impl SystemHeap for PlatformHeap {
    fn acquire(&self, size: usize) -> Result<NonNull<u8>, PoolError> {
        // malloc(0) may legally return null; never ask for it.
        let size = size.max(1);
        // Safety: FFI call to malloc.
        let ptr = unsafe { libc::malloc(size) };
        NonNull::new(ptr.cast::<u8>()).ok_or_else(|| {
            PoolError::HeapAllocFailed(io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("malloc returned null for {size} bytes"),
            ))
        })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _size: usize) {
        // Safety: ptr came from malloc (upheld by caller).
        unsafe { libc::free(ptr.as_ptr().cast::<libc::c_void>()) };
    }
}

impl<H: SystemHeap + ?Sized> SystemHeap for &H {
    fn acquire(&self, size: usize) -> Result<NonNull<u8>, PoolError> {
        (**self).acquire(size)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        // Safety: forwarded contract.
        unsafe { (**self).release(ptr, size) }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::size_class::ALIGN;

    #[test]
    fn test_acquire_write_release() {
        let heap = PlatformHeap;
        let size = 4096;
        let ptr = heap.acquire(size).expect("Acquire failed");
        // Safety: Test code.
        unsafe {
            let slice = std::slice::from_raw_parts_mut(ptr.as_ptr(), size);
            slice[0] = 42;
            slice[size - 1] = 24;
            assert_eq!(slice[0], 42);
            assert_eq!(slice[size - 1], 24);
            heap.release(ptr, size);
        }
    }

    #[test]
    fn test_acquire_is_pool_aligned() {
        let heap = PlatformHeap;
        for size in [1, 7, 8, 24, 129, 1000] {
            let ptr = heap.acquire(size).unwrap();
            assert!((ptr.as_ptr() as usize).is_multiple_of(ALIGN));
            // Safety: Test code.
            unsafe { heap.release(ptr, size) };
        }
    }

    #[test]
    fn test_acquire_zero_size_is_non_null() {
        let heap = PlatformHeap;
        let ptr = heap.acquire(0).unwrap();
        // Safety: Test code.
        unsafe { heap.release(ptr, 0) };
    }

    #[test]
    fn test_acquire_absurd_size_fails() {
        let heap = PlatformHeap;
        // Opaque size: the optimizer may otherwise elide an unused malloc.
        let size = std::hint::black_box(usize::MAX - 4096);
        let result = heap.acquire(size);
        if let Ok(ptr) = result {
            // Safety: Test code.
            unsafe { heap.release(ptr, size) };
            panic!("malloc of {size} bytes unexpectedly succeeded");
        }
        assert!(matches!(result, Err(PoolError::HeapAllocFailed(_))));
    }
}
