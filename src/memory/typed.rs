use super::construct;
use super::error::PoolError;
use super::heap::{PlatformHeap, SystemHeap};
use super::pool::PoolAllocator;
use super::size_class::ALIGN;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};

/// Element-typed handle onto a shared [`PoolAllocator`].
///
/// Handles are `Copy`; every handle bound to the same pool, whatever its
/// element type, compares equal, and memory from one can be freed through
/// any other of the same element type.
pub struct TypedAllocator<'a, T, H: SystemHeap = PlatformHeap> {
    pool: &'a PoolAllocator<H>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, H: SystemHeap> Clone for TypedAllocator<'_, T, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, H: SystemHeap> Copy for TypedAllocator<'_, T, H> {}

impl<'a, T, H: SystemHeap> TypedAllocator<'a, T, H> {
    pub fn new(pool: &'a PoolAllocator<H>) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    pub fn pool(&self) -> &'a PoolAllocator<H> {
        self.pool
    }

    /// Same pool, different element type. Containers use this to allocate
    /// their node types.
    pub fn rebind<U>(&self) -> TypedAllocator<'a, U, H> {
        TypedAllocator::new(self.pool)
    }

    /// Largest element count whose byte size fits in `isize::MAX`.
    pub fn max_size(&self) -> usize {
        match size_of::<T>() {
            0 => usize::MAX,
            size => isize::MAX as usize / size,
        }
    }

    /// Allocate storage for `count` uninitialized elements.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAlignment` if `T` needs more than [`ALIGN`] alignment.
    /// - `CapacityOverflow` if `count * size_of::<T>()` exceeds `isize::MAX`.
    /// - Any error from [`PoolAllocator::allocate`].
    pub fn allocate(&self, count: usize) -> Result<NonNull<T>, PoolError> {
        if align_of::<T>() > ALIGN {
            return Err(PoolError::UnsupportedAlignment {
                align: align_of::<T>(),
            });
        }
        let bytes = size_of::<T>()
            .checked_mul(count)
            .filter(|&b| b <= isize::MAX as usize)
            .ok_or(PoolError::CapacityOverflow)?;
        if bytes == 0 {
            return Ok(NonNull::dangling());
        }
        Ok(self.pool.allocate(bytes)?.cast())
    }

    pub fn allocate_one(&self) -> Result<NonNull<T>, PoolError> {
        self.allocate(1)
    }

    /// Return storage from [`allocate`](Self::allocate). Elements are not
    /// dropped.
    ///
    /// # Safety
    /// `ptr` must come from `allocate(count)` on a handle over the same pool
    /// with the same `T` and `count`, and must not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        let bytes = size_of::<T>() * count;
        if bytes == 0 {
            return;
        }
        // Safety: forwarded contract; bytes maps to the same class as on
        // allocation.
        unsafe { self.pool.deallocate(ptr.cast(), bytes) };
    }

    /// # Safety
    /// See [`deallocate`](Self::deallocate) with `count == 1`.
    pub unsafe fn deallocate_one(&self, ptr: NonNull<T>) {
        // Safety: forwarded contract.
        unsafe { self.deallocate(ptr, 1) };
    }

    /// Move `value` into uninitialized storage at `ptr`.
    ///
    /// # Safety
    /// See [`construct::construct`].
    pub unsafe fn construct(&self, ptr: NonNull<T>, value: T) {
        // Safety: forwarded contract.
        unsafe { construct::construct(ptr.as_ptr(), value) };
    }

    /// Drop the value at `ptr` in place, leaving the storage allocated.
    ///
    /// # Safety
    /// See [`construct::destroy`].
    pub unsafe fn destroy(&self, ptr: NonNull<T>) {
        // Safety: forwarded contract.
        unsafe { construct::destroy(ptr.as_ptr()) };
    }
}

impl<T, U, H: SystemHeap> PartialEq<TypedAllocator<'_, U, H>> for TypedAllocator<'_, T, H> {
    fn eq(&self, other: &TypedAllocator<'_, U, H>) -> bool {
        ptr::eq(self.pool, other.pool)
    }
}

impl<T, H: SystemHeap> Eq for TypedAllocator<'_, T, H> {}

impl<T, H: SystemHeap> std::fmt::Debug for TypedAllocator<'_, T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedAllocator")
            .field("pool", &ptr::from_ref(self.pool))
            .field("element", &std::any::type_name::<T>())
            .finish()
    }
}
