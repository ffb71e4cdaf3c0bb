#[cfg(test)]
mod tests {
    use crate::memory::construct::{destroy_range, uninitialized_copy};
    use crate::memory::pool::{PoolAllocator, PoolConfig};
    use crate::memory::size_class::MAX_BYTES;
    use crate::memory::typed::TypedAllocator;
    use std::ptr::NonNull;

    /// Minimal singly linked stack whose nodes live in the pool.
    struct Node<T> {
        value: T,
        next: Option<NonNull<Node<T>>>,
    }

    struct PoolStack<'a, T> {
        nodes: TypedAllocator<'a, Node<T>>,
        head: Option<NonNull<Node<T>>>,
        len: usize,
    }

    impl<'a, T> PoolStack<'a, T> {
        fn new(alloc: TypedAllocator<'a, T>) -> Self {
            Self {
                nodes: alloc.rebind::<Node<T>>(),
                head: None,
                len: 0,
            }
        }

        fn push(&mut self, value: T) {
            let node = self.nodes.allocate_one().unwrap();
            // Safety: Test code.
            unsafe { self.nodes.construct(node, Node { value, next: self.head }) };
            self.head = Some(node);
            self.len += 1;
        }

        fn pop(&mut self) -> Option<T> {
            let node = self.head?;
            // Safety: Test code.
            let Node { value, next } = unsafe { node.as_ptr().read() };
            // Safety: Test code.
            unsafe { self.nodes.deallocate_one(node) };
            self.head = next;
            self.len -= 1;
            Some(value)
        }
    }

    impl<T> Drop for PoolStack<'_, T> {
        fn drop(&mut self) {
            while self.pop().is_some() {}
        }
    }

    /// Growable buffer that reallocates through the pool on every growth,
    /// crossing from pooled blocks to the heap path once it passes
    /// `MAX_BYTES`.
    struct PoolVec<'a, T: Clone> {
        alloc: TypedAllocator<'a, T>,
        ptr: NonNull<T>,
        len: usize,
        cap: usize,
    }

    impl<'a, T: Clone> PoolVec<'a, T> {
        fn new(alloc: TypedAllocator<'a, T>) -> Self {
            Self {
                alloc,
                ptr: NonNull::dangling(),
                len: 0,
                cap: 0,
            }
        }

        fn push(&mut self, value: T) {
            if self.len == self.cap {
                let new_cap = (self.cap * 2).max(1);
                let new_ptr = self.alloc.allocate(new_cap).unwrap();
                // Safety: Test code.
                unsafe {
                    let old = std::slice::from_raw_parts(self.ptr.as_ptr(), self.len);
                    uninitialized_copy(old, new_ptr.as_ptr());
                    destroy_range(self.ptr.as_ptr(), self.len);
                    self.alloc.deallocate(self.ptr, self.cap);
                }
                self.ptr = new_ptr;
                self.cap = new_cap;
            }
            // Safety: Test code.
            unsafe { self.alloc.construct(self.ptr.add(self.len), value) };
            self.len += 1;
        }

        fn as_slice(&self) -> &[T] {
            // Safety: Test code.
            unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
        }
    }

    impl<T: Clone> Drop for PoolVec<'_, T> {
        fn drop(&mut self) {
            // Safety: Test code.
            unsafe {
                destroy_range(self.ptr.as_ptr(), self.len);
                self.alloc.deallocate(self.ptr, self.cap);
            }
        }
    }

    fn validating_pool() -> PoolAllocator {
        PoolAllocator::with_config(PoolConfig {
            validate: true,
            ..PoolConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_linked_stack_over_rebound_allocator() {
        let pool = validating_pool();
        {
            let mut stack = PoolStack::new(pool.typed::<String>());
            for i in 0..500 {
                stack.push(format!("value-{i}"));
            }
            assert_eq!(stack.len, 500);
            for i in (250..500).rev() {
                assert_eq!(stack.pop().unwrap(), format!("value-{i}"));
            }
            // Freed nodes are reused for the next pushes.
            let refills = pool.stats().refills;
            for i in 0..250 {
                stack.push(format!("again-{i}"));
            }
            assert_eq!(pool.stats().refills, refills);
        }
        assert_eq!(pool.live_blocks(), Some(0));
    }

    #[test]
    fn test_growable_buffer_crosses_into_large_path() {
        let pool = validating_pool();
        {
            let mut buf = PoolVec::new(pool.typed::<u64>());
            for i in 0..100u64 {
                buf.push(i * 3);
            }
            assert!(buf.cap * 8 > MAX_BYTES);
            assert_eq!(pool.stats().large_live, 1);
            assert!(buf.as_slice().iter().enumerate().all(|(i, &v)| v == i as u64 * 3));
        }
        assert_eq!(pool.stats().large_live, 0);
        assert_eq!(pool.live_blocks(), Some(0));
    }

    #[test]
    fn test_stacks_of_different_types_share_one_pool() {
        let pool = validating_pool();
        let mut small = PoolStack::new(pool.typed::<u8>());
        let mut wide = PoolStack::new(pool.typed::<[u64; 6]>());
        for i in 0..64u8 {
            small.push(i);
            wide.push([u64::from(i); 6]);
        }
        assert_eq!(pool.live_blocks(), Some(128));
        assert_eq!(wide.pop(), Some([63; 6]));
        assert_eq!(small.pop(), Some(63));
        drop(small);
        drop(wide);
        assert_eq!(pool.live_blocks(), Some(0));
    }

    #[test]
    fn test_integration_stress_mix() {
        // X1: Random sizes across both paths, with pattern checks for overlap.
        let pool = validating_pool();
        let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (seed >> 33) as usize
        };

        for round in 0..5000usize {
            let roll = next();
            if roll % 3 == 0 && !live.is_empty() {
                let idx = next() % live.len();
                let (ptr, size, tag) = live.swap_remove(idx);
                // Safety: Test code.
                unsafe {
                    let bytes = std::slice::from_raw_parts(ptr.as_ptr(), size);
                    assert!(bytes.iter().all(|&b| b == tag), "block overwritten");
                    pool.deallocate(ptr, size);
                }
            } else {
                let size = if roll % 17 == 0 {
                    MAX_BYTES + 1 + next() % 512
                } else {
                    1 + next() % MAX_BYTES
                };
                let tag = (round % 251) as u8;
                let ptr = pool.allocate(size).unwrap();
                // Safety: Test code.
                unsafe { ptr.as_ptr().write_bytes(tag, size) };
                live.push((ptr, size, tag));
            }
        }

        assert_eq!(pool.live_blocks(), Some(live.len()));
        for (ptr, size, tag) in live {
            // Safety: Test code.
            unsafe {
                assert_eq!(*ptr.as_ptr().add(size - 1), tag);
                pool.deallocate(ptr, size);
            }
        }
        assert_eq!(pool.live_blocks(), Some(0));
        assert_eq!(pool.stats().large_live, 0);
    }
}
