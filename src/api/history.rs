//! Time-series history of memory samples.

use std::collections::VecDeque;

use crate::api::category::Category;
use crate::api::stats::MemoryStats;
use crate::api::zones::ZoneId;

/// Live totals for one category at a sample point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorySample {
    pub live_bytes: usize,
    pub live_count: usize,
}

/// Memory state at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Microseconds since the tracker was created.
    pub timestamp_us: u64,

    /// Zone the triggering operation was attributed to.
    pub zone: Option<ZoneId>,

    pub total_bytes: usize,

    pub peak_bytes: usize,

    /// Indexed by [`Category::index`].
    pub categories: [CategorySample; Category::COUNT],
}

impl Sample {
    pub(crate) fn from_stats(stats: &MemoryStats, zone: Option<ZoneId>) -> Self {
        let mut categories = [CategorySample::default(); Category::COUNT];
        for (slot, stats) in categories.iter_mut().zip(stats.categories.iter()) {
            slot.live_bytes = stats.live_bytes;
            slot.live_count = stats.live_count;
        }

        Self {
            timestamp_us: stats.timestamp_us,
            zone,
            total_bytes: stats.total_bytes,
            peak_bytes: stats.peak_bytes,
            categories,
        }
    }

    /// Totals for one category.
    pub fn category(&self, category: Category) -> CategorySample {
        self.categories[category.index()]
    }
}

/// Bounded history of samples; the oldest sample is dropped when full.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    /// Maximum number of samples to keep (0 disables history)
    capacity: usize,

    samples: VecDeque<Sample>,

    /// Samples evicted to make room
    dropped: u64,
}

impl SampleHistory {
    /// Create a new history with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity.min(1024)),
            dropped: 0,
        }
    }

    /// Add a sample to the history.
    pub fn push(&mut self, sample: Sample) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
            self.dropped += 1;
        }
        self.samples.push_back(sample);
    }

    /// Samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples discarded because the history was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Live bytes over time for graphing.
    pub fn memory_timeline(&self) -> Vec<(u64, usize)> {
        self.samples
            .iter()
            .map(|s| (s.timestamp_us, s.total_bytes))
            .collect()
    }

    /// Peak bytes over time.
    pub fn peak_timeline(&self) -> Vec<(u64, usize)> {
        self.samples
            .iter()
            .map(|s| (s.timestamp_us, s.peak_bytes))
            .collect()
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new(4096)
    }
}
