//! The tracked allocator.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::allocators::{RawAllocator, Region, SystemHeap};
use crate::api::category::Category;
use crate::api::config::TrackerConfig;
use crate::api::error::{TrackError, TrackResult};
use crate::api::export::{render_samples_csv, render_zones_csv, write_atomic};
use crate::api::history::{Sample, SampleHistory};
use crate::api::record::{AllocationRecord, LeakReport};
use crate::api::stats::{Ledger, MemoryStats};
use crate::api::zones::{Zone, ZoneColor, ZoneGuard, ZoneHandle, ZoneId, ZoneTracker};
use crate::diagnostics::emit::report;
use crate::diagnostics::{
    DiagContext, Diagnostic, DiagnosticSink, MemoryEvent, ProfilerHooks, TA001, TA002, TA101,
    TA102, TA201, TA301, TA901,
};
use crate::sync::atomics::{AtomicCounter, AtomicGauge};
use crate::sync::mutex::Mutex;
use crate::util::size::format_bytes;

/// Everything guarded by the tracker lock.
struct TrackerState {
    /// Live allocations keyed by region address.
    records: HashMap<usize, AllocationRecord>,
    ledger: Ledger,
    history: SampleHistory,
    zones: ZoneTracker,
    /// Set by `shutdown` so `Drop` does not report twice.
    shut_down: bool,
}

/// An allocator wrapper that keeps a record of every live allocation.
///
/// Every successful [`allocate`](Self::allocate) inserts a record keyed by
/// the region address; [`free`](Self::free) removes it. Running totals per
/// [`Category`], the peak, a bounded sample history and zone attribution are
/// all derived from that table.
///
/// The tracker does not own the memory it hands out: regions must be
/// released through `free` (or wrapped with
/// [`allocate_scoped`](Self::allocate_scoped)).
///
/// # Example
///
/// ```rust
/// use trackalloc::{Category, SystemHeap, TrackedAllocator};
///
/// let tracker = TrackedAllocator::with_defaults(SystemHeap::new());
///
/// let a = tracker.allocate(1024, Category::General).unwrap();
/// let b = tracker.allocate(2048, Category::Resources).unwrap();
/// assert_eq!(tracker.current_bytes(), 3072);
///
/// tracker.free(a).unwrap();
/// tracker.free(b).unwrap();
///
/// let stats = tracker.stats();
/// assert_eq!(stats.total_bytes, 0);
/// assert_eq!(stats.peak_bytes, 3072);
/// assert!(tracker.shutdown().is_empty());
/// ```
pub struct TrackedAllocator<A: RawAllocator = SystemHeap> {
    inner: A,
    config: TrackerConfig,
    epoch: Instant,
    state: Mutex<TrackerState>,

    // Mirrors of the ledger for lock-free reads.
    live_bytes: AtomicGauge,
    peak_bytes: AtomicGauge,
    exports: AtomicCounter,

    hooks: Mutex<ProfilerHooks>,
    sink: Mutex<Option<Arc<dyn DiagnosticSink>>>,
}

impl<A: RawAllocator> TrackedAllocator<A> {
    /// Create a tracker over `inner` with the given configuration.
    pub fn new(inner: A, config: TrackerConfig) -> Self {
        let state = TrackerState {
            records: HashMap::new(),
            ledger: Ledger::new(),
            history: SampleHistory::new(config.history_capacity),
            zones: ZoneTracker::new(config.max_closed_zones),
            shut_down: false,
        };

        Self {
            inner,
            config,
            epoch: Instant::now(),
            state: Mutex::new(state),
            live_bytes: AtomicGauge::new(0),
            peak_bytes: AtomicGauge::new(0),
            exports: AtomicCounter::new(0),
            hooks: Mutex::new(ProfilerHooks::new()),
            sink: Mutex::new(None),
        }
    }

    /// Create a tracker with default configuration.
    pub fn with_defaults(inner: A) -> Self {
        Self::new(inner, TrackerConfig::default())
    }

    /// The configuration this tracker was built with.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The underlying allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Name of the underlying allocator.
    pub fn allocator_name(&self) -> &'static str {
        self.inner.name()
    }

    /// Microseconds since the tracker was created.
    pub fn now_us(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate `size` bytes from the underlying allocator and record them
    /// under `category`.
    ///
    /// On failure the underlying error is returned and statistics are not
    /// touched. On success the allocation is attributed to the innermost
    /// zone open on the calling thread.
    pub fn allocate(&self, size: usize, category: Category) -> TrackResult<Region> {
        let region = self.inner.allocate(size)?;

        let thread = thread::current().id();
        let mut record = AllocationRecord::new(
            region.address(),
            region.size(),
            category,
            self.now_us(),
            None,
            self.config.capture_backtraces,
        );

        let (zone, displaced) = {
            let mut state = self.state.lock();
            let zone = state.zones.innermost(thread);
            if let Some(id) = zone {
                state.zones.record_alloc(id, region.size());
            }
            record.zone = zone;

            let displaced = state.records.insert(region.address(), record);
            if let Some(stale) = &displaced {
                state.ledger.on_free(stale.category, stale.size);
            }
            state.ledger.on_alloc(category, region.size());
            self.after_change(&mut state, zone);
            (zone, displaced.is_some())
        };

        if displaced {
            self.raise(&TA901, Some(region.address()), None);
        }
        self.notify(MemoryEvent::Alloc {
            address: region.address(),
            size: region.size(),
            category,
            zone,
        });

        Ok(region)
    }

    /// Release a region obtained from [`allocate`](Self::allocate) or
    /// [`resize`](Self::resize).
    ///
    /// A region with no live record (double free, or a pointer that never
    /// came from this tracker) is reported as `TA001` and rejected with
    /// [`TrackError::UntrackedRelease`]; the underlying allocator is not
    /// called.
    pub fn free(&self, region: Region) -> TrackResult<()> {
        let address = region.address();
        let thread = thread::current().id();

        let removed = {
            let mut state = self.state.lock();
            let removed = state.records.remove(&address);
            if let Some(record) = &removed {
                state.ledger.on_free(record.category, record.size);
                let zone = state.zones.innermost(thread);
                self.after_change(&mut state, zone);
            }
            removed
        };

        let Some(record) = removed else {
            self.raise(&TA001, Some(address), None);
            return Err(TrackError::UntrackedRelease { address });
        };

        // SAFETY: the record proves the region came from `self.inner` and is
        // live; removing it under the lock makes this the only release.
        unsafe { self.inner.free(region.with_size(record.size)) };

        self.notify(MemoryEvent::Free {
            address,
            size: record.size,
            category: record.category,
        });
        Ok(())
    }

    /// Change the size of a live region, possibly moving it.
    ///
    /// On error (unsupported, out of memory) the record and statistics are
    /// unchanged and the original region stays valid. On success the
    /// returned region replaces `region`; totals move by
    /// `new_size - old_size` and the allocation keeps its original zone.
    pub fn resize(&self, region: Region, new_size: usize) -> TrackResult<Region> {
        let address = region.address();
        let thread = thread::current().id();

        let outcome = {
            let mut state = self.state.lock();
            let removed = state.records.remove(&address);
            match removed {
                None => None,
                Some(mut record) => {
                    let old_size = record.size;
                    // SAFETY: the region is live (it has a record) and the
                    // lock is held across the call, so no free can race it.
                    let result = unsafe { self.inner.resize(region.with_size(old_size), new_size) };
                    match result {
                        Ok(resized) => {
                            let category = record.category;
                            record.address = resized.address();
                            record.size = resized.size();
                            state.ledger.on_resize(category, old_size, resized.size());

                            let displaced = state.records.insert(resized.address(), record);
                            if let Some(stale) = &displaced {
                                state.ledger.on_free(stale.category, stale.size);
                            }
                            let zone = state.zones.innermost(thread);
                            self.after_change(&mut state, zone);
                            Some(Ok((resized, old_size, category, displaced.is_some())))
                        }
                        Err(err) => {
                            state.records.insert(address, record);
                            Some(Err(TrackError::from(err)))
                        }
                    }
                }
            }
        };

        let (resized, old_size, category, displaced) = match outcome {
            None => {
                self.raise(&TA002, Some(address), None);
                return Err(TrackError::UntrackedRelease { address });
            }
            Some(result) => result?,
        };

        if displaced {
            self.raise(&TA901, Some(resized.address()), None);
        }
        self.notify(MemoryEvent::Resize {
            old_address: address,
            new_address: resized.address(),
            old_size,
            new_size: resized.size(),
            category,
        });
        Ok(resized)
    }

    /// Allocate a region that is freed when the returned guard drops.
    pub fn allocate_scoped(&self, size: usize, category: Category) -> TrackResult<TrackedRegion<'_, A>> {
        let region = self.allocate(size, category)?;
        Ok(TrackedRegion {
            tracker: self,
            region,
            armed: true,
        })
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// A consistent snapshot of all counters.
    pub fn stats(&self) -> MemoryStats {
        let now = self.now_us();
        self.state.lock().ledger.snapshot(now)
    }

    /// Live bytes, read without taking the lock.
    ///
    /// May lag a concurrent operation; use [`stats`](Self::stats) for an
    /// exact value.
    pub fn current_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    /// Peak live bytes, read without taking the lock.
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.get()
    }

    /// Stats for one category.
    pub fn category_stats(&self, category: Category) -> crate::api::stats::CategoryStats {
        *self.state.lock().ledger.category(category)
    }

    /// Cloned snapshot of every live record, oldest first.
    pub fn live_records(&self) -> Vec<AllocationRecord> {
        let mut records: Vec<_> = self.state.lock().records.values().cloned().collect();
        records.sort_by_key(|r| (r.timestamp_us, r.address));
        records
    }

    /// Report of everything still live, plus zones that were never ended.
    pub fn leaks(&self) -> LeakReport {
        let (records, open_zones) = {
            let state = self.state.lock();
            let records: Vec<AllocationRecord> = state.records.values().cloned().collect();
            (records, state.zones.open_zones())
        };
        LeakReport::new(records, open_zones)
    }

    /// Push a sample of the current state into the history.
    ///
    /// Useful with `sample_on_change` disabled, for example once per frame.
    pub fn sample(&self) -> Sample {
        let thread = thread::current().id();
        let now = self.now_us();

        let mut state = self.state.lock();
        let zone = state.zones.innermost(thread);
        let sample = Sample::from_stats(&state.ledger.snapshot(now), zone);
        state.history.push(sample.clone());
        sample
    }

    /// Restart the peak from the current live total.
    pub fn reset_peak(&self) {
        let mut state = self.state.lock();
        state.ledger.reset_peak();
        self.peak_bytes.set(state.ledger.peak_bytes());
    }

    /// Drop all retained samples.
    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    /// Copy of the retained sample history.
    pub fn history(&self) -> SampleHistory {
        self.state.lock().history.clone()
    }

    /// `(timestamp_us, live_bytes)` pairs for graphing.
    pub fn memory_timeline(&self) -> Vec<(u64, usize)> {
        self.state.lock().history.memory_timeline()
    }

    /// Recompute totals from the live records and compare them to the
    /// running counters.
    ///
    /// Returns `false` (and reports `TA901`) on any mismatch.
    pub fn check_consistency(&self) -> bool {
        let consistent = {
            let state = self.state.lock();
            let mut bytes = [0usize; Category::COUNT];
            let mut counts = [0usize; Category::COUNT];
            for record in state.records.values() {
                bytes[record.category.index()] += record.size;
                counts[record.category.index()] += 1;
            }

            let ledger = &state.ledger;
            ledger.total_bytes() == bytes.iter().sum::<usize>()
                && ledger.live_count() == state.records.len()
                && ledger.peak_bytes() >= ledger.total_bytes()
                && Category::ALL.iter().all(|&c| {
                    let stats = ledger.category(c);
                    stats.live_bytes == bytes[c.index()] && stats.live_count == counts[c.index()]
                })
        };

        if !consistent {
            self.raise(&TA901, None, None);
        }
        consistent
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Write the sample history followed by the current snapshot as CSV.
    ///
    /// The file is written atomically: on failure no partial file is left at
    /// `path`. Returns the number of data rows written.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> TrackResult<usize> {
        let path = path.as_ref();
        let (csv, rows) = {
            let now = self.now_us();
            let state = self.state.lock();
            render_samples_csv(state.history.iter(), &state.ledger.snapshot(now))
        };
        self.write_export(path, &csv)?;
        Ok(rows)
    }

    /// Write retained zones as CSV.
    pub fn export_zones_csv(&self, path: impl AsRef<Path>) -> TrackResult<usize> {
        let path = path.as_ref();
        let (csv, rows) = render_zones_csv(self.state.lock().zones.iter());
        self.write_export(path, &csv)?;
        Ok(rows)
    }

    /// Number of successful exports.
    pub fn export_count(&self) -> u64 {
        self.exports.get()
    }

    fn write_export(&self, path: &Path, contents: &str) -> TrackResult<()> {
        if let Err(err) = write_atomic(path, contents) {
            self.raise(&TA301, None, Some(format!("path=\"{}\": {}", path.display(), err)));
            return Err(TrackError::ExportIo(err));
        }

        self.exports.increment();
        #[cfg(feature = "log")]
        log::debug!("[trackalloc] exported {} to {}", format_bytes(contents.len()), path.display());
        Ok(())
    }

    // =========================================================================
    // Zones
    // =========================================================================

    /// Open a zone on the calling thread.
    ///
    /// Allocations made on this thread are attributed to it until it is
    /// ended or a nested zone is opened.
    pub fn begin_zone(&self, name: &'static str, color: ZoneColor) -> ZoneHandle {
        let now = self.now_us();
        let handle = self
            .state
            .lock()
            .zones
            .begin(name, color, now, thread::current().id());

        self.notify(MemoryEvent::ZoneBegin {
            id: handle.id(),
            name,
            color,
        });
        handle
    }

    /// Close a zone.
    ///
    /// `handle` must be the innermost open zone of the calling thread;
    /// otherwise `TA101` is reported, nothing is closed and
    /// [`TrackError::ZoneMismatch`] is returned.
    pub fn end_zone(&self, handle: ZoneHandle) -> TrackResult<Zone> {
        let now = self.now_us();
        let result = self
            .state
            .lock()
            .zones
            .end(handle.id(), now, thread::current().id());

        match result {
            Ok(zone) => {
                self.notify(MemoryEvent::ZoneEnd {
                    id: zone.id,
                    duration_us: zone.duration_us().unwrap_or(0),
                });
                Ok(zone)
            }
            Err(mismatch) => {
                let detail = format!("ending \"{}\" ({})", handle.name(), handle.id());
                self.raise(&TA101, None, Some(detail));
                Err(TrackError::ZoneMismatch {
                    expected: mismatch.expected,
                    found: handle.id(),
                })
            }
        }
    }

    /// Open a zone that ends when the guard drops.
    pub fn zone_scope(&self, name: &'static str, color: ZoneColor) -> ZoneGuard<'_, A> {
        ZoneGuard::new(self, self.begin_zone(name, color))
    }

    /// A retained zone by handle.
    pub fn zone(&self, handle: ZoneHandle) -> Option<Zone> {
        self.zone_by_id(handle.id())
    }

    /// A retained zone by id.
    pub fn zone_by_id(&self, id: ZoneId) -> Option<Zone> {
        self.state.lock().zones.get(id).cloned()
    }

    /// All retained zones (open and recently closed) in creation order.
    pub fn zones(&self) -> Vec<Zone> {
        self.state.lock().zones.iter().cloned().collect()
    }

    /// Innermost zone open on the calling thread.
    pub fn current_zone(&self) -> Option<ZoneHandle> {
        self.state.lock().zones.innermost_handle(thread::current().id())
    }

    /// Number of zones open on the calling thread.
    pub fn zone_depth(&self) -> usize {
        self.state.lock().zones.depth(thread::current().id())
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Install a callback that receives every [`MemoryEvent`].
    ///
    /// The callback runs on the thread performing the operation, after the
    /// tracker lock is released.
    pub fn set_profiler_callback<F>(&self, callback: F)
    where
        F: Fn(&MemoryEvent) + Send + Sync + 'static,
    {
        self.hooks.lock().set_callback(callback);
    }

    /// Pause or resume the profiler callback.
    pub fn set_profiler_enabled(&self, enabled: bool) {
        self.hooks.lock().set_enabled(enabled);
    }

    /// Remove the profiler callback.
    pub fn clear_profiler_callback(&self) {
        self.hooks.lock().clear_callback();
    }

    /// Send this tracker's diagnostics to `sink` instead of stderr.
    pub fn set_diagnostic_sink(&self, sink: Arc<dyn DiagnosticSink>) {
        *self.sink.lock() = Some(sink);
    }

    /// Restore default diagnostic output.
    pub fn clear_diagnostic_sink(&self) {
        *self.sink.lock() = None;
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Tear the tracker down, returning everything still live.
    ///
    /// Outstanding allocations are reported as `TA201` and open zones as
    /// `TA102`. Leaked regions are not freed.
    pub fn shutdown(self) -> LeakReport {
        let report = self.leaks();

        if !report.records.is_empty() {
            self.raise(&TA201, None, Some(leak_summary(report.len(), report.total_bytes)));
        }
        if !report.open_zones.is_empty() {
            let detail = format!("{} zone(s) open", report.open_zones.len());
            self.raise(&TA102, None, Some(detail));
        }

        self.state.lock().shut_down = true;
        report
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Refresh mirrors and take a change sample. Called with the lock held.
    fn after_change(&self, state: &mut TrackerState, zone: Option<ZoneId>) {
        self.live_bytes.set(state.ledger.total_bytes());
        self.peak_bytes.set(state.ledger.peak_bytes());

        if self.config.sample_on_change {
            let snapshot = state.ledger.snapshot(self.now_us());
            state.history.push(Sample::from_stats(&snapshot, zone));
        }
    }

    /// Deliver an event to the profiler callback. Must not hold the state lock.
    fn notify(&self, event: MemoryEvent) {
        let callback = self.hooks.lock().active_callback();
        if let Some(callback) = callback {
            callback(&event);
        }

        #[cfg(feature = "tracy")]
        crate::diagnostics::tracy_report(&event, self.live_bytes.get());
    }

    /// Report a diagnostic. Must not hold the state lock.
    fn raise(&self, diag: &Diagnostic, address: Option<usize>, detail: Option<String>) {
        let mut context = DiagContext::capture(self.current_zone());
        if let Some(address) = address {
            context = context.with_address(address);
        }
        if let Some(detail) = detail {
            context = context.with_detail(detail);
        }

        let sink = self.sink.lock().clone();
        report(diag, &context, sink.as_deref());
    }
}

fn leak_summary(count: usize, bytes: usize) -> String {
    format!("{} live allocation(s), {}", count, format_bytes(bytes))
}

impl<A: RawAllocator> Drop for TrackedAllocator<A> {
    fn drop(&mut self) {
        if thread::panicking() || !self.config.report_leaks_on_drop {
            return;
        }

        let leaked = {
            let state = self.state.lock();
            if state.shut_down || state.records.is_empty() {
                return;
            }
            (state.records.len(), state.ledger.total_bytes())
        };
        self.raise(&TA201, None, Some(leak_summary(leaked.0, leaked.1)));
    }
}

impl<A: RawAllocator> fmt::Debug for TrackedAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedAllocator")
            .field("allocator", &self.inner.name())
            .field("live_bytes", &self.live_bytes.get())
            .field("peak_bytes", &self.peak_bytes.get())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A tracked region freed when dropped.
///
/// Returned by [`TrackedAllocator::allocate_scoped`].
pub struct TrackedRegion<'a, A: RawAllocator> {
    tracker: &'a TrackedAllocator<A>,
    region: Region,
    armed: bool,
}

impl<'a, A: RawAllocator> TrackedRegion<'a, A> {
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.region.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.region.size()
    }

    pub fn address(&self) -> usize {
        self.region.address()
    }

    /// Resize in place of the held region. On error the region is unchanged.
    pub fn resize(&mut self, new_size: usize) -> TrackResult<()> {
        self.region = self.tracker.resize(self.region, new_size)?;
        Ok(())
    }

    /// Free now, surfacing any error instead of swallowing it in `Drop`.
    pub fn release(mut self) -> TrackResult<()> {
        self.armed = false;
        self.tracker.free(self.region)
    }

    /// Stop guarding the region; the caller becomes responsible for freeing it.
    pub fn into_region(mut self) -> Region {
        self.armed = false;
        self.region
    }
}

impl<'a, A: RawAllocator> Drop for TrackedRegion<'a, A> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.tracker.free(self.region);
        }
    }
}

impl<'a, A: RawAllocator> fmt::Debug for TrackedRegion<'a, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedRegion")
            .field("address", &format_args!("{:#x}", self.region.address()))
            .field("size", &self.region.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    fn tracker() -> (TrackedAllocator, Arc<CollectingSink>) {
        let tracker = TrackedAllocator::with_defaults(SystemHeap::new());
        let sink = Arc::new(CollectingSink::new());
        tracker.set_diagnostic_sink(sink.clone());
        (tracker, sink)
    }

    #[test]
    fn test_allocate_free_updates_totals() {
        let (tracker, _) = tracker();
        let a = tracker.allocate(1024, Category::General).unwrap();
        let b = tracker.allocate(2048, Category::Resources).unwrap();

        let stats = tracker.stats();
        assert_eq!(stats.total_bytes, 3072);
        assert_eq!(stats.category(Category::General).live_bytes, 1024);
        assert_eq!(stats.category(Category::Resources).live_bytes, 2048);

        tracker.free(a).unwrap();
        tracker.free(b).unwrap();

        let stats = tracker.stats();
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.peak_bytes, 3072);
        assert_eq!(tracker.current_bytes(), 0);
        assert_eq!(tracker.peak_bytes(), 3072);
        assert!(tracker.check_consistency());
    }

    #[test]
    fn test_double_free_is_rejected() {
        let (tracker, sink) = tracker();
        let region = tracker.allocate(64, Category::Temporary).unwrap();
        tracker.free(region).unwrap();

        let err = tracker.free(region).unwrap_err();
        assert!(matches!(err, TrackError::UntrackedRelease { address } if address == region.address()));
        assert_eq!(sink.count("TA001"), 1);
        assert_eq!(tracker.stats().frees, 1);
    }

    #[test]
    fn test_resize_moves_totals_by_delta() {
        let (tracker, _) = tracker();
        let region = tracker.allocate(100, Category::General).unwrap();
        let region = tracker.resize(region, 500).unwrap();
        assert_eq!(tracker.stats().total_bytes, 500);

        let region = tracker.resize(region, 50).unwrap();
        let stats = tracker.stats();
        assert_eq!(stats.total_bytes, 50);
        assert_eq!(stats.peak_bytes, 500);
        assert_eq!(tracker.live_records()[0].size, 50);

        tracker.free(region).unwrap();
        assert!(tracker.check_consistency());
    }

    #[test]
    fn test_untracked_resize() {
        let (tracker, sink) = tracker();
        let region = tracker.allocate(32, Category::General).unwrap();
        tracker.free(region).unwrap();

        assert!(matches!(
            tracker.resize(region, 64),
            Err(TrackError::UntrackedRelease { .. })
        ));
        assert_eq!(sink.count("TA002"), 1);
    }

    #[test]
    fn test_samples_on_change() {
        let (tracker, _) = tracker();
        let region = tracker.allocate(10, Category::General).unwrap();
        tracker.free(region).unwrap();

        let timeline = tracker.memory_timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].1, 10);
        assert_eq!(timeline[1].1, 0);

        tracker.clear_history();
        assert!(tracker.history().is_empty());
        tracker.sample();
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn test_reset_peak() {
        let (tracker, _) = tracker();
        let big = tracker.allocate(4096, Category::General).unwrap();
        let small = tracker.allocate(16, Category::General).unwrap();
        tracker.free(big).unwrap();

        tracker.reset_peak();
        assert_eq!(tracker.peak_bytes(), 16);
        assert_eq!(tracker.stats().peak_bytes, 16);
        tracker.free(small).unwrap();
    }

    #[test]
    fn test_scoped_region_frees_on_drop() {
        let (tracker, _) = tracker();
        {
            let mut scoped = tracker.allocate_scoped(128, Category::Temporary).unwrap();
            scoped.resize(256).unwrap();
            assert_eq!(tracker.current_bytes(), 256);
        }
        assert_eq!(tracker.current_bytes(), 0);

        let kept = tracker.allocate_scoped(8, Category::General).unwrap().into_region();
        assert_eq!(tracker.live_records().len(), 1);
        tracker.free(kept).unwrap();
    }

    #[test]
    fn test_zone_attribution_and_mismatch() {
        let (tracker, sink) = tracker();
        let outer = tracker.begin_zone("outer", ZoneColor::BLUE);
        let inner = tracker.begin_zone("inner", ZoneColor::RED);

        let region = tracker.allocate(64, Category::General).unwrap();
        assert_eq!(tracker.live_records()[0].zone, Some(inner.id()));

        let err = tracker.end_zone(outer).unwrap_err();
        assert!(matches!(
            err,
            TrackError::ZoneMismatch { expected: Some(id), found } if id == inner.id() && found == outer.id()
        ));
        assert_eq!(sink.count("TA101"), 1);
        assert_eq!(tracker.zone_depth(), 2);

        tracker.end_zone(inner).unwrap();
        let closed = tracker.end_zone(outer).unwrap();
        assert!(closed.end_us.unwrap() >= closed.start_us);
        assert_eq!(tracker.zone(outer).unwrap().bytes_allocated, 0);
        assert_eq!(tracker.zone(inner).unwrap().bytes_allocated, 64);

        tracker.free(region).unwrap();
    }

    #[test]
    fn test_shutdown_reports_leaks() {
        let heap = SystemHeap::new();
        let sink = Arc::new(CollectingSink::new());
        let tracker = TrackedAllocator::with_defaults(&heap);
        tracker.set_diagnostic_sink(sink.clone());
        let _leaked = tracker.allocate(48, Category::Resources).unwrap();
        let _zone = tracker.begin_zone("never ended", ZoneColor::GRAY);

        let report = tracker.shutdown();
        assert_eq!(report.len(), 1);
        assert_eq!(report.bytes_in(Category::Resources), 48);
        assert_eq!(report.open_zones.len(), 1);
        assert_eq!(sink.count("TA201"), 1);
        assert_eq!(sink.count("TA102"), 1);

        // The tracker is gone; release the leaked region directly.
        unsafe { heap.free(report.records[0].region().unwrap()) };
        assert_eq!(heap.allocated_bytes(), 0);
    }

    #[test]
    fn test_drop_reports_leaks_once() {
        let sink = Arc::new(CollectingSink::new());
        let heap = SystemHeap::new();
        let leaked = {
            let tracker = TrackedAllocator::with_defaults(&heap);
            tracker.set_diagnostic_sink(sink.clone());
            tracker.allocate(24, Category::General).unwrap()
        };
        assert_eq!(sink.count("TA201"), 1);

        unsafe { heap.free(leaked) };
        assert_eq!(heap.allocated_bytes(), 0);
    }

    #[test]
    fn test_profiler_events() {
        let (tracker, _) = tracker();
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        tracker.set_profiler_callback(move |event| seen.lock().push(event.clone()));

        let zone = tracker.begin_zone("z", ZoneColor::GREEN);
        let region = tracker.allocate(8, Category::General).unwrap();
        let region = tracker.resize(region, 16).unwrap();
        tracker.free(region).unwrap();
        tracker.end_zone(zone).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], MemoryEvent::ZoneBegin { name: "z", .. }));
        assert!(matches!(events[1], MemoryEvent::Alloc { size: 8, zone: Some(id), .. } if id == zone.id()));
        assert!(matches!(events[2], MemoryEvent::Resize { old_size: 8, new_size: 16, .. }));
        assert!(matches!(events[3], MemoryEvent::Free { size: 16, .. }));
        assert!(matches!(events[4], MemoryEvent::ZoneEnd { .. }));
    }

    #[cfg(feature = "debug")]
    #[test]
    fn test_shutdown_reports_backtraces() {
        let heap = SystemHeap::new();
        let tracker = TrackedAllocator::new(&heap, TrackerConfig::default().with_backtraces(true));
        let sink = Arc::new(CollectingSink::new());
        tracker.set_diagnostic_sink(sink.clone());

        let leaked = tracker.allocate(256, Category::Resources).unwrap();
        let report = tracker.shutdown();

        assert_eq!(report.len(), 1);
        let bt = report.records[0].backtrace.as_ref().unwrap();
        assert!(report.to_string().contains(&format!("{:?}", bt)));
        assert_eq!(sink.count("TA201"), 1);

        unsafe { heap.free(leaked) };
        assert_eq!(heap.allocated_bytes(), 0);
    }
}
