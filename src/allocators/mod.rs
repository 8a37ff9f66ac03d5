//! Allocation backends.
//!
//! The profiler wraps a [`RawAllocator`]; it never replaces one. This module
//! defines that capability and the backends shipped with the crate.
//! **These are the only modules that should contain `unsafe` allocation code.**

use std::ptr::NonNull;
use std::sync::Arc;

pub mod budgeted;
pub mod heap;

pub use budgeted::BudgetedHeap;
pub use heap::{SystemHeap, HEAP_ALIGN};

/// Errors reported by an underlying allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The allocator could not satisfy the request.
    #[error("out of memory ({requested} bytes requested)")]
    OutOfMemory { requested: usize },

    /// The allocator cannot resize regions in place or by moving them.
    #[error("resize is not supported by this allocator")]
    Unsupported,

    /// The requested size cannot be represented (zero or overflowing layout).
    #[error("invalid allocation size: {size}")]
    InvalidSize { size: usize },
}

/// A region of memory handed out by an allocator.
///
/// A region is an opaque handle: its address is its identity. Reading or
/// writing through [`Region::as_ptr`] is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: a Region is an address and a length. It grants no access by itself;
// every dereference goes through `as_ptr` and an explicit unsafe block.
unsafe impl Send for Region {}
// SAFETY: see above.
unsafe impl Sync for Region {}

impl Region {
    /// Create a region from a pointer and a size.
    pub const fn new(ptr: NonNull<u8>, size: usize) -> Self {
        Self { ptr, size }
    }

    /// Address of the region, used as its identity.
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Size of the region in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw pointer to the start of the region.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Same address, different size.
    pub(crate) fn with_size(self, size: usize) -> Self {
        Self { ptr: self.ptr, size }
    }
}

/// The underlying allocator capability wrapped by the profiler.
pub trait RawAllocator: Send + Sync {
    /// Allocate a region of exactly `size` bytes.
    fn allocate(&self, size: usize) -> Result<Region, AllocError>;

    /// Release a region.
    ///
    /// # Safety
    ///
    /// `region` must have been returned by this allocator (by `allocate` or
    /// `resize`), with the same size, and must not have been released yet.
    unsafe fn free(&self, region: Region);

    /// Resize a region, possibly moving it.
    ///
    /// On error the original region is still valid and unchanged.
    ///
    /// # Safety
    ///
    /// Same requirements on `region` as [`RawAllocator::free`]. On success the
    /// old region must no longer be used.
    unsafe fn resize(&self, region: Region, new_size: usize) -> Result<Region, AllocError> {
        let _ = (region, new_size);
        Err(AllocError::Unsupported)
    }

    /// Human-readable backend name for reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<T: RawAllocator + ?Sized> RawAllocator for &T {
    fn allocate(&self, size: usize) -> Result<Region, AllocError> {
        (**self).allocate(size)
    }

    unsafe fn free(&self, region: Region) {
        (**self).free(region)
    }

    unsafe fn resize(&self, region: Region, new_size: usize) -> Result<Region, AllocError> {
        (**self).resize(region, new_size)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: RawAllocator + ?Sized> RawAllocator for Arc<T> {
    fn allocate(&self, size: usize) -> Result<Region, AllocError> {
        (**self).allocate(size)
    }

    unsafe fn free(&self, region: Region) {
        (**self).free(region)
    }

    unsafe fn resize(&self, region: Region, new_size: usize) -> Result<Region, AllocError> {
        (**self).resize(region, new_size)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: RawAllocator + ?Sized> RawAllocator for Box<T> {
    fn allocate(&self, size: usize) -> Result<Region, AllocError> {
        (**self).allocate(size)
    }

    unsafe fn free(&self, region: Region) {
        (**self).free(region)
    }

    unsafe fn resize(&self, region: Region, new_size: usize) -> Result<Region, AllocError> {
        (**self).resize(region, new_size)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
