//! Diagnostics and profiler integration.
//!
//! This module provides:
//! - **Runtime diagnostics**: tracker-aware error messages with codes
//! - **Profiler integration**: event callbacks and optional Tracy plots
//! - **Strict mode**: optional panic-on-error for CI
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                        |
//! |-------|--------------------------------|
//! | TA0xx | Allocation tracking issues     |
//! | TA1xx | Zone issues                    |
//! | TA2xx | Leaks and teardown             |
//! | TA3xx | Export issues                  |
//! | TA9xx | Internal errors                |
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use trackalloc::diagnostics::CollectingSink;
//! use trackalloc::{Category, SystemHeap, TrackedAllocator};
//!
//! let sink = Arc::new(CollectingSink::new());
//! let tracker = TrackedAllocator::with_defaults(SystemHeap::new());
//! tracker.set_diagnostic_sink(sink.clone());
//!
//! let region = tracker.allocate(64, Category::General).unwrap();
//! tracker.free(region).unwrap();
//! assert!(tracker.free(region).is_err());
//! assert_eq!(sink.count("TA001"), 1);
//! ```

// Core diagnostic types
pub mod kind;
pub mod emit;
pub mod context;
pub mod strict;

// Profiler integration
mod hooks;

// Re-export core types
pub use kind::{Diagnostic, DiagnosticKind};
pub use emit::{emit, emit_with_context, suppress_diagnostics, set_verbose, DiagnosticSink, CollectingSink};
pub use context::DiagContext;
pub use strict::{StrictMode, set_strict_mode, strict_mode, StrictModeGuard, init_from_env};

// Re-export predefined diagnostics
pub use kind::{TA001, TA002, TA101, TA102, TA201, TA301, TA901};

pub use hooks::{MemoryEvent, ProfilerCallback, ProfilerHooks};
#[cfg(feature = "tracy")]
pub(crate) use hooks::tracy_report;
