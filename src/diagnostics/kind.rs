//! Diagnostic kinds and core types.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - something is definitely wrong.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Additional context about another diagnostic.
    Note,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `TA0xx` - Allocation tracking issues
/// - `TA1xx` - Zone issues
/// - `TA2xx` - Leaks and teardown
/// - `TA3xx` - Export issues
/// - `TA9xx` - Internal errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "TA001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// Predefined diagnostics (TA0xx - Allocation tracking)
// =============================================================================

/// TA001: Free of an untracked region.
pub const TA001: Diagnostic = Diagnostic::error(
    "TA001",
    "free of a region with no live allocation record"
).with_note("the region was already freed, or never came from this tracker")
 .with_help("check for double frees, or frees routed to the wrong allocator");

/// TA002: Resize of an untracked region.
pub const TA002: Diagnostic = Diagnostic::error(
    "TA002",
    "resize of a region with no live allocation record"
).with_note("the region was freed, or a stale handle from before a moving resize was used")
 .with_help("always continue with the region returned by resize()");

// =============================================================================
// Predefined diagnostics (TA1xx - Zones)
// =============================================================================

/// TA101: Zone ended out of order.
pub const TA101: Diagnostic = Diagnostic::error(
    "TA101",
    "zone ended out of order"
).with_note("end_zone() must match the most recent begin_zone() on the same thread")
 .with_help("end nested zones innermost first, or use zone_scope() guards");

/// TA102: Zones still open at teardown.
pub const TA102: Diagnostic = Diagnostic::warning(
    "TA102",
    "zones still open at tracker shutdown"
).with_help("make sure every begin_zone() has a matching end_zone()");

// =============================================================================
// Predefined diagnostics (TA2xx - Leaks)
// =============================================================================

/// TA201: Live allocations at teardown.
pub const TA201: Diagnostic = Diagnostic::warning(
    "TA201",
    "live allocations at tracker shutdown"
).with_note("these regions were allocated through the tracker and never freed")
 .with_help("inspect TrackedAllocator::leaks() for addresses, categories and zones");

// =============================================================================
// Predefined diagnostics (TA3xx - Export)
// =============================================================================

/// TA301: Export failed.
pub const TA301: Diagnostic = Diagnostic::warning(
    "TA301",
    "profile export failed"
).with_note("no file was written at the destination")
 .with_help("check that the destination directory exists and is writable");

// =============================================================================
// Predefined diagnostics (TA9xx - Internal)
// =============================================================================

/// TA901: Running counters disagree with live records.
pub const TA901: Diagnostic = Diagnostic::error(
    "TA901",
    "allocation accounting inconsistency"
).with_note("running totals no longer match the live record table; statistics may be inaccurate")
 .with_help("the underlying allocator may have returned an address that is still live");
