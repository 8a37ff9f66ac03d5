//! # trackalloc
//!
//! Allocation tracking and memory profiling for Rust game engines and tools.
//!
//! ## Features
//!
//! - Per-allocation records for every live region
//! - Categorized live totals (general, resources, temporary) with peaks
//! - Bounded time-series history of memory samples
//! - Named, colored zones with per-thread nesting
//! - Leak reports, consistency checks and atomic CSV export
//! - Coded diagnostics with optional strict mode
//! - Optional Tracy, `log` and backtrace integration
//!
//! ## Quick Start
//!
//! ```rust
//! use trackalloc::{Category, SystemHeap, TrackedAllocator, ZoneColor};
//!
//! let tracker = TrackedAllocator::with_defaults(SystemHeap::new());
//!
//! let level = tracker.begin_zone("Load Level", ZoneColor::BLUE);
//! let mesh = tracker.allocate(64 * 1024, Category::Resources).unwrap();
//! tracker.end_zone(level).unwrap();
//!
//! let scratch = tracker.allocate(512, Category::Temporary).unwrap();
//! tracker.free(scratch).unwrap();
//!
//! let stats = tracker.stats();
//! assert_eq!(stats.total_bytes, 64 * 1024);
//! println!("{}", stats);
//!
//! tracker.free(mesh).unwrap();
//! assert!(tracker.shutdown().is_empty());
//! ```

pub mod allocators;
pub mod api;
pub mod diagnostics;

mod sync;
mod util;

// Re-export public API at crate root for convenience
pub use api::category::{Category, UnknownCategory};
pub use api::config::TrackerConfig;
pub use api::error::{TrackError, TrackResult};
pub use api::export::{CSV_HEADER, ZONES_CSV_HEADER};
pub use api::history::{CategorySample, Sample, SampleHistory};
pub use api::record::{AllocationRecord, LeakReport};
pub use api::stats::{CategoryStats, MemoryStats};
pub use api::tracker::{TrackedAllocator, TrackedRegion};
pub use api::zones::{Zone, ZoneColor, ZoneGuard, ZoneHandle, ZoneId, ZoneState};

// Underlying allocators
pub use allocators::{AllocError, BudgetedHeap, RawAllocator, Region, SystemHeap, HEAP_ALIGN};

// Diagnostics - core types and profiler hooks
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, CollectingSink};
pub use diagnostics::{StrictMode, set_strict_mode, StrictModeGuard};
pub use diagnostics::{MemoryEvent, ProfilerHooks};

// Size helpers
pub use util::size::{format_bytes, kb, mb};

