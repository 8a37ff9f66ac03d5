//! Capacity-limited backend.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{AllocError, RawAllocator, Region, SystemHeap};

/// An allocator that refuses to exceed a fixed byte capacity.
///
/// Wraps another [`RawAllocator`] and reports [`AllocError::OutOfMemory`]
/// once the requested bytes would push usage past `capacity`. Useful to
/// model constrained heaps (consoles, per-subsystem arenas) and to exercise
/// out-of-memory paths deterministically.
pub struct BudgetedHeap<A = SystemHeap> {
    inner: A,
    capacity: usize,
    used: AtomicUsize,
}

impl BudgetedHeap<SystemHeap> {
    /// Create a budgeted system heap.
    pub fn system(capacity: usize) -> Self {
        Self::new(SystemHeap::new(), capacity)
    }
}

impl<A: RawAllocator> BudgetedHeap<A> {
    /// Wrap `inner` with a byte capacity.
    pub fn new(inner: A, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            used: AtomicUsize::new(0),
        }
    }

    /// Configured capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently reserved.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.used())
    }

    /// The wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn reserve(&self, size: usize) -> Result<(), AllocError> {
        self.used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                used.checked_add(size).filter(|&total| total <= self.capacity)
            })
            .map(|_| ())
            .map_err(|_| AllocError::OutOfMemory { requested: size })
    }

    fn release(&self, size: usize) {
        self.used.fetch_sub(size, Ordering::Relaxed);
    }
}

impl<A: RawAllocator> RawAllocator for BudgetedHeap<A> {
    fn allocate(&self, size: usize) -> Result<Region, AllocError> {
        self.reserve(size)?;
        self.inner.allocate(size).map_err(|err| {
            self.release(size);
            err
        })
    }

    unsafe fn free(&self, region: Region) {
        self.inner.free(region);
        self.release(region.size());
    }

    unsafe fn resize(&self, region: Region, new_size: usize) -> Result<Region, AllocError> {
        let old_size = region.size();
        if new_size > old_size {
            let delta = new_size - old_size;
            self.reserve(delta)
                .map_err(|_| AllocError::OutOfMemory { requested: new_size })?;
            self.inner.resize(region, new_size).map_err(|err| {
                self.release(delta);
                err
            })
        } else {
            let resized = self.inner.resize(region, new_size)?;
            self.release(old_size - new_size);
            Ok(resized)
        }
    }

    fn name(&self) -> &'static str {
        "budgeted"
    }
}
