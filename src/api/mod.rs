//! Public API for trackalloc.
//!
//! This module contains all user-facing types and functions.
//! Most users should only interact with [`tracker::TrackedAllocator`] and the
//! types it returns.

pub mod category;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod record;
pub mod stats;
pub mod tracker;
pub mod zones;
