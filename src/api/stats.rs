//! Allocation statistics.

use std::fmt;

use crate::api::category::Category;
use crate::util::size::{apply_delta, format_bytes};

/// Live and lifetime totals for a single category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStats {
    /// Bytes currently live.
    pub live_bytes: usize,

    /// Allocations currently live.
    pub live_count: usize,

    /// Highest `live_bytes` observed since creation or the last peak reset.
    pub peak_bytes: usize,

    /// Allocations performed.
    pub allocations: u64,

    /// Frees performed.
    pub frees: u64,
}

impl CategoryStats {
    fn record_alloc(&mut self, size: usize) {
        self.live_bytes = self.live_bytes.saturating_add(size);
        self.live_count += 1;
        self.allocations += 1;
        self.peak_bytes = self.peak_bytes.max(self.live_bytes);
    }

    fn record_free(&mut self, size: usize) {
        self.live_bytes = self.live_bytes.saturating_sub(size);
        self.live_count = self.live_count.saturating_sub(1);
        self.frees += 1;
    }

    fn record_resize(&mut self, old_size: usize, new_size: usize) {
        self.live_bytes = apply_delta(self.live_bytes, old_size, new_size);
        self.peak_bytes = self.peak_bytes.max(self.live_bytes);
    }
}

/// Point-in-time snapshot of tracked memory.
///
/// Produced under the tracker lock, so every field belongs to the same
/// instant: `total_bytes` always equals the sum of the category live bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Microseconds since the tracker was created.
    pub timestamp_us: u64,

    /// Bytes currently live.
    pub total_bytes: usize,

    /// Allocations currently live.
    pub live_count: usize,

    /// High water mark of `total_bytes`.
    pub peak_bytes: usize,

    /// Per-category totals, indexed by [`Category::index`].
    pub categories: [CategoryStats; Category::COUNT],

    /// Allocations performed over the tracker's lifetime.
    pub allocations: u64,

    /// Frees performed over the tracker's lifetime.
    pub frees: u64,

    /// Resizes performed over the tracker's lifetime.
    pub resizes: u64,
}

impl MemoryStats {
    /// Totals for one category.
    pub fn category(&self, category: Category) -> &CategoryStats {
        &self.categories[category.index()]
    }

    /// Iterate categories with their totals.
    pub fn iter_categories(&self) -> impl Iterator<Item = (Category, &CategoryStats)> {
        Category::ALL.into_iter().zip(self.categories.iter())
    }

    /// Sum of live bytes across categories.
    pub fn category_bytes_sum(&self) -> usize {
        self.categories.iter().map(|c| c.live_bytes).sum()
    }

    /// True if nothing is live.
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory Statistics:")?;
        writeln!(f, "  Live:        {} ({} allocations)", format_bytes(self.total_bytes), self.live_count)?;
        writeln!(f, "  Peak:        {}", format_bytes(self.peak_bytes))?;
        writeln!(f, "  Allocations: {}", self.allocations)?;
        writeln!(f, "  Frees:       {}", self.frees)?;
        writeln!(f, "  Resizes:     {}", self.resizes)?;
        for (category, stats) in self.iter_categories() {
            writeln!(
                f,
                "  {:<12} {} ({} live, peak {})",
                format!("{}:", category),
                format_bytes(stats.live_bytes),
                stats.live_count,
                format_bytes(stats.peak_bytes)
            )?;
        }
        Ok(())
    }
}

/// Running counters owned by the tracker state.
///
/// Every mutation adjusts the counters by the size involved; nothing is
/// re-derived from the record table.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ledger {
    total_bytes: usize,
    live_count: usize,
    peak_bytes: usize,
    categories: [CategoryStats; Category::COUNT],
    allocations: u64,
    frees: u64,
    resizes: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_alloc(&mut self, category: Category, size: usize) {
        self.total_bytes = self.total_bytes.saturating_add(size);
        self.live_count += 1;
        self.allocations += 1;
        self.categories[category.index()].record_alloc(size);
        self.peak_bytes = self.peak_bytes.max(self.total_bytes);
    }

    pub fn on_free(&mut self, category: Category, size: usize) {
        self.total_bytes = self.total_bytes.saturating_sub(size);
        self.live_count = self.live_count.saturating_sub(1);
        self.frees += 1;
        self.categories[category.index()].record_free(size);
    }

    pub fn on_resize(&mut self, category: Category, old_size: usize, new_size: usize) {
        self.total_bytes = apply_delta(self.total_bytes, old_size, new_size);
        self.resizes += 1;
        self.categories[category.index()].record_resize(old_size, new_size);
        self.peak_bytes = self.peak_bytes.max(self.total_bytes);
    }

    /// Restart high water marks from the current live values.
    pub fn reset_peak(&mut self) {
        self.peak_bytes = self.total_bytes;
        for category in &mut self.categories {
            category.peak_bytes = category.live_bytes;
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn category(&self, category: Category) -> &CategoryStats {
        &self.categories[category.index()]
    }

    pub fn snapshot(&self, timestamp_us: u64) -> MemoryStats {
        MemoryStats {
            timestamp_us,
            total_bytes: self.total_bytes,
            live_count: self.live_count,
            peak_bytes: self.peak_bytes,
            categories: self.categories,
            allocations: self.allocations,
            frees: self.frees,
            resizes: self.resizes,
        }
    }
}
