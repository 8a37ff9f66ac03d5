//! Integration tests for trackalloc.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};
use std::thread;

use bumpalo::Bump;
use trackalloc::{
    AllocError, BudgetedHeap, Category, CollectingSink, RawAllocator, Region, SystemHeap,
    TrackError, TrackedAllocator, TrackerConfig, ZoneColor, ZoneState, CSV_HEADER, ZONES_CSV_HEADER,
};

/// Tracker that reports diagnostics into a sink instead of stderr.
fn quiet<A: RawAllocator>(inner: A, config: TrackerConfig) -> (TrackedAllocator<A>, Arc<CollectingSink>) {
    let tracker = TrackedAllocator::new(inner, config);
    let sink = Arc::new(CollectingSink::new());
    tracker.set_diagnostic_sink(sink.clone());
    (tracker, sink)
}

/// Arena backend without resize or individual free.
struct BumpArena(Mutex<Bump>);

impl BumpArena {
    fn new() -> Self {
        Self(Mutex::new(Bump::new()))
    }
}

impl RawAllocator for BumpArena {
    fn allocate(&self, size: usize) -> Result<Region, AllocError> {
        let layout = Layout::from_size_align(size, 16).map_err(|_| AllocError::InvalidSize { size })?;
        let bump = self.0.lock().unwrap();
        let ptr = bump
            .try_alloc_layout(layout)
            .map_err(|_| AllocError::OutOfMemory { requested: size })?;
        Ok(Region::new(ptr, size))
    }

    unsafe fn free(&self, _region: Region) {
        // Reclaimed when the arena drops.
    }

    fn name(&self) -> &'static str {
        "bump"
    }
}

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

// =============================================================================
// Accounting
// =============================================================================

#[test]
fn test_mixed_categories_scenario() {
    let (tracker, _) = quiet(SystemHeap::new(), TrackerConfig::default());

    let first = tracker.allocate(1024, Category::General).unwrap();
    let second = tracker.allocate(2048, Category::Resources).unwrap();
    tracker.free(first).unwrap();

    let stats = tracker.stats();
    assert_eq!(stats.total_bytes, 2048);
    assert_eq!(stats.category(Category::General).live_bytes, 0);
    assert_eq!(stats.category(Category::Resources).live_bytes, 2048);
    assert_eq!(stats.peak_bytes, 3072);

    tracker.free(second).unwrap();
}

#[test]
fn test_resize_scenario() {
    let (tracker, _) = quiet(SystemHeap::new(), TrackerConfig::default());

    let region = tracker.allocate(100, Category::Temporary).unwrap();
    let region = tracker.resize(region, 500).unwrap();
    let region = tracker.resize(region, 50).unwrap();

    let stats = tracker.stats();
    assert_eq!(stats.total_bytes, 50);
    assert!(stats.peak_bytes >= 500);

    let records = tracker.live_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].size, 50);
    assert_eq!(records[0].address, region.address());

    tracker.free(region).unwrap();
    assert!(tracker.live_records().is_empty());
}

#[test]
fn test_random_sequences_end_at_zero_with_prefix_peak() {
    let heap = SystemHeap::new();
    let config = TrackerConfig::default().with_sample_on_change(false);
    let (tracker, sink) = quiet(&heap, config);
    let mut rng = Lcg(0x5eed);

    let mut live: Vec<Region> = Vec::new();
    let mut expected_total = 0usize;
    let mut expected_peak = 0usize;

    for _ in 0..2_000 {
        let op = rng.next() % 4;
        if op < 2 || live.is_empty() {
            let size = 1 + (rng.next() % 4096) as usize;
            let category = Category::ALL[(rng.next() % 3) as usize];
            live.push(tracker.allocate(size, category).unwrap());
            expected_total += size;
        } else if op == 2 {
            let index = (rng.next() as usize) % live.len();
            let region = live.swap_remove(index);
            tracker.free(region).unwrap();
            expected_total -= region.size();
        } else {
            let index = (rng.next() as usize) % live.len();
            let new_size = 1 + (rng.next() % 8192) as usize;
            let old = live[index];
            live[index] = tracker.resize(old, new_size).unwrap();
            expected_total = expected_total - old.size() + new_size;
        }
        expected_peak = expected_peak.max(expected_total);

        let stats = tracker.stats();
        assert_eq!(stats.total_bytes, expected_total);
        assert_eq!(stats.peak_bytes, expected_peak);
        assert_eq!(stats.category_bytes_sum(), stats.total_bytes);
    }

    for region in live.drain(..) {
        tracker.free(region).unwrap();
    }

    let stats = tracker.stats();
    assert_eq!(stats.total_bytes, 0);
    assert_eq!(stats.live_count, 0);
    assert!(tracker.live_records().is_empty());
    assert!(tracker.check_consistency());
    assert!(sink.diagnostics().is_empty());
    assert_eq!(heap.allocated_bytes(), 0);
}

// =============================================================================
// Misuse
// =============================================================================

#[test]
fn test_free_of_foreign_address() {
    let (tracker, sink) = quiet(SystemHeap::new(), TrackerConfig::default());
    let kept = tracker.allocate(256, Category::General).unwrap();
    let before = tracker.stats();

    let mut buffer = [0u8; 32];
    let foreign = Region::new(NonNull::new(buffer.as_mut_ptr()).unwrap(), buffer.len());

    let err = tracker.free(foreign).unwrap_err();
    assert!(matches!(err, TrackError::UntrackedRelease { address } if address == foreign.address()));
    assert!(err.is_usage_error());
    assert_eq!(sink.count("TA001"), 1);
    assert!(sink.contexts()[0].contains(&format!("address=0x{:x}", foreign.address())));

    let after = tracker.stats();
    assert_eq!(after.total_bytes, before.total_bytes);
    assert_eq!(after.frees, before.frees);

    tracker.free(kept).unwrap();
}

#[test]
fn test_double_free_does_not_reach_allocator() {
    let heap = SystemHeap::new();
    let (tracker, sink) = quiet(&heap, TrackerConfig::default());

    let region = tracker.allocate(64, Category::General).unwrap();
    tracker.free(region).unwrap();
    assert_eq!(heap.allocated_bytes(), 0);

    // A second release would underflow the heap's byte counter.
    assert!(tracker.free(region).is_err());
    assert_eq!(heap.allocated_bytes(), 0);
    assert_eq!(heap.allocation_count(), 1);
    assert!(sink.has_errors());
}

#[test]
fn test_unsupported_resize_leaves_stats() {
    let (tracker, _) = quiet(BumpArena::new(), TrackerConfig::default());
    assert_eq!(tracker.allocator_name(), "bump");

    let region = tracker.allocate(128, Category::Resources).unwrap();
    let before = tracker.stats();

    assert!(matches!(tracker.resize(region, 512), Err(TrackError::ResizeUnsupported)));

    let after = tracker.stats();
    assert_eq!(after.total_bytes, before.total_bytes);
    assert_eq!(after.resizes, 0);
    assert_eq!(tracker.live_records()[0].size, 128);

    // The original region is still tracked.
    tracker.free(region).unwrap();
    assert_eq!(tracker.stats().total_bytes, 0);
}

#[test]
fn test_budget_exhaustion_leaves_stats() {
    let (tracker, _) = quiet(BudgetedHeap::system(1024), TrackerConfig::default());

    let region = tracker.allocate(512, Category::General).unwrap();
    let err = tracker.allocate(1024, Category::General).unwrap_err();
    assert!(matches!(err, TrackError::OutOfMemory { requested: 1024 }));

    let stats = tracker.stats();
    assert_eq!(stats.total_bytes, 512);
    assert_eq!(stats.allocations, 1);

    // Growing past the budget fails the same way and keeps the old size.
    assert!(matches!(tracker.resize(region, 2048), Err(TrackError::OutOfMemory { .. })));
    assert_eq!(tracker.stats().total_bytes, 512);
    assert_eq!(tracker.inner().used(), 512);

    tracker.free(region).unwrap();
    assert_eq!(tracker.inner().used(), 0);
}

#[test]
fn test_zero_size_is_rejected() {
    let (tracker, _) = quiet(SystemHeap::new(), TrackerConfig::default());
    assert!(matches!(
        tracker.allocate(0, Category::General),
        Err(TrackError::InvalidSize { size: 0 })
    ));
    assert!(tracker.stats().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_allocate_free() {
    let tracker = Arc::new(TrackedAllocator::new(
        SystemHeap::new(),
        TrackerConfig::default().with_history_capacity(256),
    ));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let tracker = tracker.clone();
            thread::spawn(move || {
                let mut live = Vec::new();
                for i in 0..500 {
                    let category = Category::ALL[(t + i) % Category::COUNT];
                    live.push(tracker.allocate(16 + i % 64, category).unwrap());
                    if i % 3 == 0 {
                        let region = live.swap_remove(0);
                        tracker.free(region).unwrap();
                    }
                }
                for region in live {
                    tracker.free(region).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = tracker.stats();
    assert_eq!(stats.total_bytes, 0);
    assert_eq!(stats.allocations, 8 * 500);
    assert_eq!(stats.frees, 8 * 500);
    assert_eq!(stats.category_bytes_sum(), 0);
    assert_eq!(tracker.current_bytes(), 0);
    assert!(tracker.check_consistency());
    assert_eq!(tracker.history().len(), 256);
}

#[test]
fn test_stats_consistent_during_concurrent_resize() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let (tracker, sink) = quiet(SystemHeap::new(), TrackerConfig::default().with_history_capacity(64));
    let tracker = Arc::new(tracker);
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let tracker = tracker.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut reads = 0usize;
            while !done.load(Ordering::Acquire) || reads == 0 {
                let stats = tracker.stats();
                assert_eq!(stats.category_bytes_sum(), stats.total_bytes);
                assert!(stats.peak_bytes >= stats.total_bytes);
                reads += 1;
            }
            reads
        })
    };

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let tracker = tracker.clone();
            thread::spawn(move || {
                for i in 0..300 {
                    let category = Category::ALL[(t + i) % Category::COUNT];
                    let region = tracker.allocate(32 + i % 128, category).unwrap();
                    let region = tracker.resize(region, 64 + (i * 7) % 512).unwrap();
                    tracker.free(region).unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    assert!(reader.join().unwrap() > 0);

    let stats = tracker.stats();
    assert_eq!(stats.total_bytes, 0);
    assert_eq!(stats.allocations, 4 * 300);
    assert_eq!(stats.resizes, 4 * 300);
    assert_eq!(stats.frees, 4 * 300);
    assert!(tracker.check_consistency());
    assert!(sink.diagnostics().is_empty());
}

#[test]
fn test_zone_stacks_are_per_thread() {
    let tracker = Arc::new(TrackedAllocator::with_defaults(SystemHeap::new()));
    let outer = tracker.begin_zone("main", ZoneColor::GREEN);

    let worker = {
        let tracker = tracker.clone();
        thread::spawn(move || {
            assert!(tracker.current_zone().is_none());
            let zone = tracker.begin_zone("worker", ZoneColor::ORANGE);
            let region = tracker.allocate(32, Category::General).unwrap();
            tracker.end_zone(zone).unwrap();
            (zone, region)
        })
    };
    let (worker_zone, region) = worker.join().unwrap();

    assert_eq!(tracker.current_zone(), Some(outer));
    assert_eq!(tracker.live_records()[0].zone, Some(worker_zone.id()));
    assert_eq!(tracker.zone(outer).unwrap().allocation_count, 0);

    tracker.free(region).unwrap();
    tracker.end_zone(outer).unwrap();
}

// =============================================================================
// Zones and export
// =============================================================================

#[test]
fn test_zone_span_in_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.csv");
    let (tracker, _) = quiet(SystemHeap::new(), TrackerConfig::default());

    let zone_a = tracker.begin_zone("A", ZoneColor::PURPLE);
    let region = tracker.allocate(300, Category::Resources).unwrap();
    let closed = tracker.end_zone(zone_a).unwrap();
    assert!(closed.end_us.unwrap() >= closed.start_us);

    let rows = tracker.export_csv(&path).unwrap();
    let csv = std::fs::read_to_string(&path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));
    assert_eq!(lines.clone().count(), rows);

    let attributed = lines.any(|line| {
        let fields: Vec<&str> = line.split(',').collect();
        let timestamp: u64 = fields[0].parse().unwrap();
        fields[1] == "resources" && fields[2] == "300" && closed.contains(timestamp)
    });
    assert!(attributed, "no sample inside zone A's span:\n{}", csv);
    assert_eq!(tracker.export_count(), 1);

    tracker.free(region).unwrap();
}

#[test]
fn test_csv_peak_column_is_tracker_wide() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("peaks.csv");
    let (tracker, _) = quiet(SystemHeap::new(), TrackerConfig::default());

    let general = tracker.allocate(1000, Category::General).unwrap();
    let resources = tracker.allocate(200, Category::Resources).unwrap();
    tracker.free(general).unwrap();

    tracker.export_csv(&path).unwrap();
    let csv = std::fs::read_to_string(&path).unwrap();
    let last_rows: Vec<Vec<&str>> = csv
        .lines()
        .rev()
        .take(Category::COUNT)
        .map(|line| line.split(',').collect())
        .collect();

    // Resources never held more than 200 bytes, yet every row shows the total peak.
    for fields in &last_rows {
        assert_eq!(fields[4], "1200", "row {:?}", fields);
    }
    assert_eq!(tracker.stats().category(Category::Resources).peak_bytes, 200);

    tracker.free(resources).unwrap();
}

#[test]
fn test_zone_left_open_by_exited_thread() {
    let (tracker, sink) = quiet(SystemHeap::new(), TrackerConfig::default().with_max_closed_zones(1));
    let tracker = Arc::new(tracker);

    let orphan = {
        let tracker = tracker.clone();
        thread::spawn(move || tracker.begin_zone("Loader", ZoneColor::ORANGE).id())
            .join()
            .unwrap()
    };

    // Closing other zones past the retention limit never evicts an open one.
    for _ in 0..4 {
        let zone = tracker.begin_zone("Frame", ZoneColor::GREEN);
        tracker.end_zone(zone).unwrap();
    }
    assert_eq!(tracker.zone_by_id(orphan).unwrap().state, ZoneState::Active);
    assert_eq!(tracker.zone_depth(), 0);

    let tracker = Arc::try_unwrap(tracker).ok().unwrap();
    let report = tracker.shutdown();
    assert_eq!(report.open_zones.len(), 1);
    assert_eq!(report.open_zones[0].id, orphan);
    assert_eq!(sink.count("TA102"), 1);
}

#[test]
fn test_nested_zones_attribute_innermost() {
    let (tracker, _) = quiet(SystemHeap::new(), TrackerConfig::default());

    let region = {
        let _frame = tracker.zone_scope("Frame", ZoneColor::GRAY);
        let region = {
            let physics = tracker.zone_scope("Physics", ZoneColor::YELLOW);
            assert_eq!(tracker.zone_depth(), 2);
            let region = tracker.allocate(96, Category::Temporary).unwrap();
            assert_eq!(tracker.live_records()[0].zone, Some(physics.handle().id()));
            region
        };
        assert_eq!(tracker.zone_depth(), 1);
        region
    };
    assert!(tracker.current_zone().is_none());

    let zones = tracker.zones();
    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0].name, "Frame");
    assert_eq!(zones[0].bytes_allocated, 0);
    assert_eq!(zones[1].name, "Physics");
    assert_eq!(zones[1].bytes_allocated, 96);
    assert!(zones.iter().all(|z| !z.is_active()));

    tracker.free(region).unwrap();
}

#[test]
fn test_zone_mismatch_keeps_stack() {
    let (tracker, sink) = quiet(SystemHeap::new(), TrackerConfig::default());
    let outer = tracker.begin_zone("outer", ZoneColor::BLUE);
    let inner = tracker.begin_zone("inner", ZoneColor::RED);

    assert!(matches!(tracker.end_zone(outer), Err(TrackError::ZoneMismatch { .. })));
    assert_eq!(tracker.current_zone(), Some(inner));
    assert_eq!(sink.count("TA101"), 1);

    tracker.end_zone(inner).unwrap();
    tracker.end_zone(outer).unwrap();

    // Already closed.
    assert!(matches!(
        tracker.end_zone(outer),
        Err(TrackError::ZoneMismatch { expected: None, .. })
    ));
}

#[test]
fn test_zone_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zones.csv");
    let (tracker, _) = quiet(SystemHeap::new(), TrackerConfig::default());

    let load = tracker.begin_zone("Load, Level", ZoneColor::rgb(0x12, 0x34, 0x56));
    tracker.end_zone(load).unwrap();
    let _open = tracker.begin_zone("Open", ZoneColor::GREEN);

    assert_eq!(tracker.export_zones_csv(&path).unwrap(), 2);
    let csv = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], ZONES_CSV_HEADER);
    assert!(lines[1].starts_with("1,\"Load, Level\",#123456,"));
    assert!(lines[2].starts_with("2,Open,"));
}

#[test]
fn test_export_to_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("profile.csv");
    let (tracker, sink) = quiet(SystemHeap::new(), TrackerConfig::default());

    let err = tracker.export_csv(&path).unwrap_err();
    assert!(matches!(err, TrackError::ExportIo(_)));
    assert!(!path.exists());
    assert_eq!(sink.count("TA301"), 1);
    assert_eq!(tracker.export_count(), 0);
}

#[test]
fn test_manual_sampling() {
    let config = TrackerConfig::minimal().with_history_capacity(8);
    let (tracker, _) = quiet(SystemHeap::new(), config);

    let region = tracker.allocate(40, Category::General).unwrap();
    assert!(tracker.history().is_empty());

    let sample = tracker.sample();
    assert_eq!(sample.total_bytes, 40);
    assert_eq!(sample.category(Category::General).live_count, 1);
    assert_eq!(tracker.history().len(), 1);

    tracker.free(region).unwrap();
}

// =============================================================================
// Leaks
// =============================================================================

#[test]
fn test_leak_report_and_shutdown() {
    let heap = SystemHeap::new();
    let (tracker, sink) = quiet(&heap, TrackerConfig::default());

    let freed = tracker.allocate(10, Category::General).unwrap();
    let leaked = tracker.allocate(4096, Category::Resources).unwrap();
    tracker.free(freed).unwrap();

    let report = tracker.leaks();
    assert_eq!(report.len(), 1);
    assert_eq!(report.total_bytes, 4096);
    assert!(report.to_string().contains("1 live allocations"));

    let report = tracker.shutdown();
    assert_eq!(report.records[0].address, leaked.address());
    assert_eq!(sink.count("TA201"), 1);

    unsafe { heap.free(leaked) };
}
