//! Synchronization primitives.
//!
//! Provides thin wrappers over std or parking_lot mutexes, plus the atomic
//! gauges used for lock-free approximate reads.

pub(crate) mod atomics;
pub(crate) mod mutex;
