//! System heap backend.

use std::alloc::{alloc, dealloc, realloc, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{AllocError, RawAllocator, Region};

/// Alignment of every region handed out by [`SystemHeap`].
pub const HEAP_ALIGN: usize = 16;

/// Pattern written over freed memory with the `debug` feature.
#[cfg(feature = "debug")]
const FREED_PATTERN: u8 = 0xCD;

/// Overwrite `region` with [`FREED_PATTERN`].
///
/// # Safety
///
/// `region` must be live and writable for its full size.
#[cfg(feature = "debug")]
unsafe fn poison(region: Region) {
    std::ptr::write_bytes(region.as_ptr(), FREED_PATTERN, region.size());
}

/// Wrapper around the system allocator.
///
/// Keeps its own byte and call counters so the effect of the profiler on the
/// real allocator can be observed independently.
pub struct SystemHeap {
    /// Total bytes currently allocated
    allocated_bytes: AtomicUsize,

    /// Total allocation count
    allocation_count: AtomicUsize,
}

impl SystemHeap {
    /// Create a new system heap wrapper.
    pub const fn new() -> Self {
        Self {
            allocated_bytes: AtomicUsize::new(0),
            allocation_count: AtomicUsize::new(0),
        }
    }

    fn layout(size: usize) -> Result<Layout, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize { size });
        }
        Layout::from_size_align(size, HEAP_ALIGN).map_err(|_| AllocError::InvalidSize { size })
    }

    /// Get total bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Get total allocation count.
    pub fn allocation_count(&self) -> usize {
        self.allocation_count.load(Ordering::Relaxed)
    }
}

impl Default for SystemHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAllocator for SystemHeap {
    fn allocate(&self, size: usize) -> Result<Region, AllocError> {
        let layout = Self::layout(size)?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or(AllocError::OutOfMemory { requested: size })?;

        self.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        self.allocation_count.fetch_add(1, Ordering::Relaxed);

        Ok(Region::new(ptr, size))
    }

    unsafe fn free(&self, region: Region) {
        // SAFETY: the caller guarantees the region came from `allocate` or
        // `resize` with this size, so the layout matches.
        let layout = Layout::from_size_align_unchecked(region.size(), HEAP_ALIGN);

        #[cfg(feature = "debug")]
        poison(region);

        dealloc(region.as_ptr(), layout);

        self.allocated_bytes.fetch_sub(region.size(), Ordering::Relaxed);
    }

    unsafe fn resize(&self, region: Region, new_size: usize) -> Result<Region, AllocError> {
        // Validates the new size against the alignment.
        Self::layout(new_size)?;

        let old_layout = Layout::from_size_align_unchecked(region.size(), HEAP_ALIGN);
        let ptr = realloc(region.as_ptr(), old_layout, new_size);
        let ptr = NonNull::new(ptr).ok_or(AllocError::OutOfMemory { requested: new_size })?;

        if new_size >= region.size() {
            self.allocated_bytes
                .fetch_add(new_size - region.size(), Ordering::Relaxed);
        } else {
            self.allocated_bytes
                .fetch_sub(region.size() - new_size, Ordering::Relaxed);
        }

        Ok(Region::new(ptr, new_size))
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_allocation() {
        let heap = SystemHeap::new();

        let region = heap.allocate(64).unwrap();
        assert_eq!(region.size(), 64);
        assert_eq!(region.address() % HEAP_ALIGN, 0);
        assert_eq!(heap.allocated_bytes(), 64);

        unsafe {
            region.as_ptr().write_bytes(0xAB, 64);
            heap.free(region);
        }

        assert_eq!(heap.allocated_bytes(), 0);
        assert_eq!(heap.allocation_count(), 1);
    }

    #[test]
    fn test_zero_size_rejected() {
        let heap = SystemHeap::new();
        assert_eq!(heap.allocate(0), Err(AllocError::InvalidSize { size: 0 }));
    }

    #[test]
    fn test_resize_preserves_contents() {
        let heap = SystemHeap::new();
        let region = heap.allocate(16).unwrap();

        unsafe {
            region.as_ptr().write_bytes(0x5A, 16);
            let grown = heap.resize(region, 4096).unwrap();
            assert_eq!(grown.size(), 4096);
            assert_eq!(*grown.as_ptr().add(15), 0x5A);
            assert_eq!(heap.allocated_bytes(), 4096);

            let shrunk = heap.resize(grown, 8).unwrap();
            assert_eq!(heap.allocated_bytes(), 8);
            heap.free(shrunk);
        }

        assert_eq!(heap.allocated_bytes(), 0);
    }

    #[cfg(feature = "debug")]
    #[test]
    fn test_poison_fills_region() {
        let heap = SystemHeap::new();
        let region = heap.allocate(32).unwrap();

        unsafe {
            region.as_ptr().write_bytes(0x11, 32);
            poison(region);
            let bytes = std::slice::from_raw_parts(region.as_ptr(), 32);
            assert!(bytes.iter().all(|&b| b == FREED_PATTERN));
            heap.free(region);
        }

        assert_eq!(heap.allocated_bytes(), 0);
    }
}
