//! Zones - named, colored spans of allocator activity.
//!
//! Zones label logical phases of execution ("Load Level", "Physics") without
//! changing allocation behavior. Each thread keeps its own stack of open
//! zones; an allocation is attributed to the innermost open zone of the
//! thread that performs it. Enclosing zones are not credited.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::thread::ThreadId;

use crate::api::tracker::TrackedAllocator;
use crate::allocators::RawAllocator;

/// Unique identifier of a zone within one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(u64);

impl ZoneId {
    /// Raw numeric id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone#{}", self.0)
    }
}

/// Display color of a zone, as 0xRRGGBB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneColor(u32);

impl ZoneColor {
    pub const RED: Self = Self(0xFF0000);
    pub const GREEN: Self = Self(0x00FF00);
    pub const BLUE: Self = Self(0x0000FF);
    pub const YELLOW: Self = Self(0xFFFF00);
    pub const ORANGE: Self = Self(0xFFA500);
    pub const PURPLE: Self = Self(0x800080);
    pub const GRAY: Self = Self(0x808080);

    /// Color from components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Color from a 0xRRGGBB value. Bits above 24 are discarded.
    pub const fn from_hex(hex: u32) -> Self {
        Self(hex & 0x00FF_FFFF)
    }

    /// The 0xRRGGBB value.
    pub const fn hex(self) -> u32 {
        self.0
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }
}

impl Default for ZoneColor {
    fn default() -> Self {
        Self::GRAY
    }
}

impl fmt::Display for ZoneColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

/// Lifecycle of a zone: `Created -> Active -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    Created,
    Active,
    Closed,
}

/// A named span of execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: ZoneId,
    pub name: &'static str,
    pub color: ZoneColor,
    /// Microseconds since the tracker was created.
    pub start_us: u64,
    /// Set when the zone is closed; never earlier than `start_us`.
    pub end_us: Option<u64>,
    /// Thread that opened the zone.
    pub thread: ThreadId,
    pub state: ZoneState,
    /// Bytes allocated while this was the innermost open zone.
    pub bytes_allocated: usize,
    /// Allocations made while this was the innermost open zone.
    pub allocation_count: usize,
}

impl Zone {
    fn new(id: ZoneId, name: &'static str, color: ZoneColor, thread: ThreadId) -> Self {
        Self {
            id,
            name,
            color,
            start_us: 0,
            end_us: None,
            thread,
            state: ZoneState::Created,
            bytes_allocated: 0,
            allocation_count: 0,
        }
    }

    fn activate(&mut self, now_us: u64) {
        debug_assert_eq!(self.state, ZoneState::Created);
        self.start_us = now_us;
        self.state = ZoneState::Active;
    }

    fn close(&mut self, now_us: u64) {
        debug_assert_eq!(self.state, ZoneState::Active);
        self.end_us = Some(now_us.max(self.start_us));
        self.state = ZoneState::Closed;
    }

    /// True while the zone is open.
    pub fn is_active(&self) -> bool {
        self.state == ZoneState::Active
    }

    /// Length of the zone, once closed.
    pub fn duration_us(&self) -> Option<u64> {
        self.end_us.map(|end| end - self.start_us)
    }

    /// Whether a timestamp falls within the zone's span.
    ///
    /// An open zone contains every timestamp from its start onwards.
    pub fn contains(&self, timestamp_us: u64) -> bool {
        timestamp_us >= self.start_us && self.end_us.map_or(true, |end| timestamp_us <= end)
    }
}

/// Handle returned by `begin_zone`, passed back to `end_zone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneHandle {
    id: ZoneId,
    name: &'static str,
}

impl ZoneHandle {
    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Why a zone could not be ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ZoneMismatch {
    /// Innermost open zone on the calling thread, if any.
    pub expected: Option<ZoneId>,
}

/// Zone bookkeeping. Lives inside the tracker state, under its lock.
///
/// Only closed zones are evicted, oldest first, past `max_closed`. A thread
/// that exits with zones still open keeps its stack entry and those zones stay
/// `Active` for the tracker's lifetime; `shutdown` lists them as open.
pub(crate) struct ZoneTracker {
    next_id: u64,
    zones: BTreeMap<ZoneId, Zone>,
    stacks: HashMap<ThreadId, Vec<ZoneId>>,
    closed: VecDeque<ZoneId>,
    max_closed: usize,
}

impl ZoneTracker {
    pub fn new(max_closed: usize) -> Self {
        Self {
            next_id: 1,
            zones: BTreeMap::new(),
            stacks: HashMap::new(),
            closed: VecDeque::new(),
            max_closed,
        }
    }

    /// Create, activate and push a zone on `thread`'s stack.
    pub fn begin(
        &mut self,
        name: &'static str,
        color: ZoneColor,
        now_us: u64,
        thread: ThreadId,
    ) -> ZoneHandle {
        let id = ZoneId(self.next_id);
        self.next_id += 1;

        let mut zone = Zone::new(id, name, color, thread);
        zone.activate(now_us);
        self.zones.insert(id, zone);
        self.stacks.entry(thread).or_default().push(id);

        ZoneHandle { id, name }
    }

    /// Close `id` if it is the innermost open zone on `thread`.
    ///
    /// Out-of-order ends are rejected and leave the stack untouched.
    pub fn end(&mut self, id: ZoneId, now_us: u64, thread: ThreadId) -> Result<Zone, ZoneMismatch> {
        let expected = self.innermost(thread);
        if expected != Some(id) {
            return Err(ZoneMismatch { expected });
        }

        if let Some(stack) = self.stacks.get_mut(&thread) {
            stack.pop();
            if stack.is_empty() {
                self.stacks.remove(&thread);
            }
        }

        let zone = match self.zones.get_mut(&id) {
            Some(zone) => {
                zone.close(now_us);
                zone.clone()
            }
            None => return Err(ZoneMismatch { expected }),
        };

        self.closed.push_back(id);
        while self.closed.len() > self.max_closed {
            if let Some(evicted) = self.closed.pop_front() {
                self.zones.remove(&evicted);
            }
        }

        Ok(zone)
    }

    /// Innermost open zone on `thread`.
    pub fn innermost(&self, thread: ThreadId) -> Option<ZoneId> {
        self.stacks.get(&thread).and_then(|stack| stack.last().copied())
    }

    /// Handle of the innermost open zone on `thread`.
    pub fn innermost_handle(&self, thread: ThreadId) -> Option<ZoneHandle> {
        let id = self.innermost(thread)?;
        self.zones.get(&id).map(|zone| ZoneHandle { id, name: zone.name })
    }

    /// Attribute an allocation to `id`.
    pub fn record_alloc(&mut self, id: ZoneId, size: usize) {
        if let Some(zone) = self.zones.get_mut(&id) {
            zone.bytes_allocated = zone.bytes_allocated.saturating_add(size);
            zone.allocation_count += 1;
        }
    }

    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id)
    }

    /// Retained zones in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Zones still open on any thread.
    pub fn open_zones(&self) -> Vec<Zone> {
        self.zones.values().filter(|z| z.is_active()).cloned().collect()
    }

    /// Nesting depth on `thread`.
    pub fn depth(&self, thread: ThreadId) -> usize {
        self.stacks.get(&thread).map_or(0, Vec::len)
    }
}

/// RAII guard for a zone.
///
/// Ends the zone when dropped. Ending out of order is reported through
/// diagnostics rather than corrected.
///
/// # Example
///
/// ```rust
/// use trackalloc::{Category, SystemHeap, TrackedAllocator, ZoneColor};
///
/// let tracker = TrackedAllocator::with_defaults(SystemHeap::new());
/// {
///     let _zone = tracker.zone_scope("Load Level", ZoneColor::BLUE);
///     let region = tracker.allocate(256, Category::Resources).unwrap();
///     tracker.free(region).unwrap();
/// }
/// assert!(tracker.current_zone().is_none());
/// ```
pub struct ZoneGuard<'a, A: RawAllocator> {
    tracker: &'a TrackedAllocator<A>,
    handle: ZoneHandle,
}

impl<'a, A: RawAllocator> ZoneGuard<'a, A> {
    pub(crate) fn new(tracker: &'a TrackedAllocator<A>, handle: ZoneHandle) -> Self {
        Self { tracker, handle }
    }

    /// The guarded zone.
    pub fn handle(&self) -> ZoneHandle {
        self.handle
    }
}

impl<'a, A: RawAllocator> Drop for ZoneGuard<'a, A> {
    fn drop(&mut self) {
        // Mismatches are already reported by `end_zone`.
        let _ = self.tracker.end_zone(self.handle);
    }
}
