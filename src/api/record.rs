//! Per-allocation records and leak reports.

use std::fmt;
use std::ptr::NonNull;
use std::thread::ThreadId;

use crate::allocators::Region;
use crate::api::category::Category;
use crate::api::zones::{Zone, ZoneId};
use crate::util::size::format_bytes;

/// Bookkeeping for one live allocation.
///
/// Created by `allocate`, removed by `free`. Only `resize` changes it, and
/// only its size and address.
#[derive(Debug, Clone)]
pub struct AllocationRecord {
    /// Address of the region, its identity.
    pub address: usize,

    /// Size in bytes.
    pub size: usize,

    pub category: Category,

    /// Microseconds since the tracker was created.
    pub timestamp_us: u64,

    /// Innermost zone open on the allocating thread.
    pub zone: Option<ZoneId>,

    /// Allocating thread.
    pub thread: ThreadId,

    /// Call stack of the allocation (unresolved until reported).
    #[cfg(feature = "debug")]
    pub backtrace: Option<backtrace::Backtrace>,
}

impl AllocationRecord {
    pub(crate) fn new(
        address: usize,
        size: usize,
        category: Category,
        timestamp_us: u64,
        zone: Option<ZoneId>,
        capture_backtrace: bool,
    ) -> Self {
        #[cfg(not(feature = "debug"))]
        let _ = capture_backtrace;

        Self {
            address,
            size,
            category,
            timestamp_us,
            zone,
            thread: std::thread::current().id(),
            #[cfg(feature = "debug")]
            backtrace: capture_backtrace.then(backtrace::Backtrace::new_unresolved),
        }
    }

    /// The recorded region.
    ///
    /// Lets a caller release leaked memory through the underlying allocator
    /// after the tracker is gone.
    pub fn region(&self) -> Option<Region> {
        NonNull::new(self.address as *mut u8).map(|ptr| Region::new(ptr, self.size))
    }
}

/// Outstanding allocations and open zones at a point in time.
#[derive(Debug, Clone, Default)]
pub struct LeakReport {
    /// Live records, oldest first.
    pub records: Vec<AllocationRecord>,

    /// Sum of `records` sizes.
    pub total_bytes: usize,

    /// Live bytes per category, indexed by [`Category::index`].
    pub bytes_by_category: [usize; Category::COUNT],

    /// Live allocation count per category.
    pub count_by_category: [usize; Category::COUNT],

    /// Zones that were never ended.
    pub open_zones: Vec<Zone>,
}

impl LeakReport {
    pub(crate) fn new(mut records: Vec<AllocationRecord>, open_zones: Vec<Zone>) -> Self {
        records.sort_by_key(|r| (r.timestamp_us, r.address));

        let mut report = Self {
            open_zones,
            ..Self::default()
        };
        for record in &records {
            report.total_bytes = report.total_bytes.saturating_add(record.size);
            report.bytes_by_category[record.category.index()] += record.size;
            report.count_by_category[record.category.index()] += 1;
        }

        #[cfg(feature = "debug")]
        for record in &mut records {
            if let Some(bt) = record.backtrace.as_mut() {
                bt.resolve();
            }
        }

        report.records = records;
        report
    }

    /// True if no allocation is live and no zone is open.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.open_zones.is_empty()
    }

    /// Number of live allocations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Live bytes in one category.
    pub fn bytes_in(&self, category: Category) -> usize {
        self.bytes_by_category[category.index()]
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "[trackalloc] No live allocations (no leaks detected)");
        }

        writeln!(
            f,
            "[trackalloc] Leak report: {} live allocations, {}",
            self.records.len(),
            format_bytes(self.total_bytes)
        )?;
        for category in Category::ALL {
            let count = self.count_by_category[category.index()];
            if count > 0 {
                writeln!(
                    f,
                    "  {}: {} in {} allocations",
                    category,
                    format_bytes(self.bytes_in(category)),
                    count
                )?;
            }
        }
        for record in &self.records {
            write!(
                f,
                "  0x{:x}: {} bytes [{}] at {}us",
                record.address, record.size, record.category, record.timestamp_us
            )?;
            if let Some(zone) = record.zone {
                write!(f, " in {}", zone)?;
            }
            writeln!(f)?;

            #[cfg(feature = "debug")]
            if let Some(bt) = &record.backtrace {
                writeln!(f, "{:?}", bt)?;
            }
        }
        for zone in &self.open_zones {
            writeln!(f, "  zone \"{}\" ({}) still open since {}us", zone.name, zone.id, zone.start_us)?;
        }
        Ok(())
    }
}
