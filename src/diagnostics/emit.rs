//! Diagnostic emission backend.
//!
//! Handles outputting diagnostics to stderr, logs, or custom sinks.

use std::sync::atomic::{AtomicBool, Ordering};

use super::context::DiagContext;
use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::{should_panic, should_panic_on_warning};
use crate::sync::mutex::Mutex;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Global flag to enable verbose diagnostics.
static VERBOSE_DIAGNOSTICS: AtomicBool = AtomicBool::new(false);

/// Suppress all diagnostic output.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Enable verbose diagnostic output.
pub fn set_verbose(verbose: bool) {
    VERBOSE_DIAGNOSTICS.store(verbose, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Emit a diagnostic to stderr.
///
/// In release builds without the `diagnostics` feature, nothing is printed,
/// but strict mode still applies.
pub fn emit(diag: &Diagnostic) {
    if !is_suppressed() {
        #[cfg(any(debug_assertions, feature = "diagnostics"))]
        write_to_stderr(diag, None);

        #[cfg(feature = "log")]
        emit_to_log(diag, None);
    }

    enforce_strict(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    if !is_suppressed() {
        #[cfg(any(debug_assertions, feature = "diagnostics"))]
        write_to_stderr(diag, Some(context));

        #[cfg(feature = "log")]
        emit_to_log(diag, Some(context));
    }

    enforce_strict(diag, Some(context));
}

/// Route a diagnostic raised by a tracker.
///
/// A custom sink replaces the default stderr/log output; strict mode applies
/// either way.
pub(crate) fn report(diag: &Diagnostic, context: &DiagContext, sink: Option<&dyn DiagnosticSink>) {
    let context = context.format();
    match sink {
        Some(sink) => {
            sink.emit(diag, &context);
            enforce_strict(diag, Some(&context));
        }
        None => emit_with_context(diag, &context),
    }
}

fn enforce_strict(diag: &Diagnostic, context: Option<&str>) {
    let fatal = match diag.kind {
        DiagnosticKind::Error => should_panic(),
        DiagnosticKind::Warning => should_panic_on_warning(),
        DiagnosticKind::Note => false,
    };
    if !fatal {
        return;
    }

    match context {
        Some(context) => panic!(
            "[trackalloc][{}] {}\nContext: {}\nStrict mode enabled - errors are fatal.",
            diag.code, diag.message, context
        ),
        None => panic!(
            "[trackalloc][{}] {}\nStrict mode enabled - errors are fatal.",
            diag.code, diag.message
        ),
    }
}

#[cfg(any(debug_assertions, feature = "diagnostics"))]
fn write_to_stderr(diag: &Diagnostic, context: Option<&str>) {
    use std::io::Write;

    let mut stderr = std::io::stderr().lock();
    let verbose = VERBOSE_DIAGNOSTICS.load(Ordering::Relaxed);

    let _ = writeln!(
        stderr,
        "[trackalloc][{}] {}: {}",
        diag.code,
        diag.kind.prefix(),
        diag.message
    );
    if let Some(context) = context {
        let _ = writeln!(stderr, "  context: {}", context);
    }
    if let Some(note) = diag.note {
        let _ = writeln!(stderr, "  note: {}", note);
    }
    if let Some(help) = diag.help {
        let _ = writeln!(stderr, "  help: {}", help);
    }
    if verbose && diag.kind == DiagnosticKind::Error {
        let _ = writeln!(stderr, "  hint: build with the `debug` feature to capture allocation backtraces");
    }
    let _ = writeln!(stderr);
}

/// Emit a diagnostic using the log crate.
#[cfg(feature = "log")]
pub fn emit_to_log(diag: &Diagnostic, context: Option<&str>) {
    match diag.kind {
        DiagnosticKind::Error => log::error!("[{}] {}", diag.code, diag.message),
        DiagnosticKind::Warning => log::warn!("[{}] {}", diag.code, diag.message),
        DiagnosticKind::Note => log::info!("[{}] {}", diag.code, diag.message),
    }

    if let Some(context) = context {
        log::info!("  context: {}", context);
    }
    if let Some(note) = diag.note {
        log::info!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::info!("  help: {}", help);
    }
}

/// A diagnostic sink trait for custom output.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a diagnostic together with its formatted context.
    fn emit(&self, diag: &Diagnostic, context: &str);
}

/// A simple sink that collects diagnostics.
#[derive(Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<(Diagnostic, String)>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().iter().map(|(d, _)| d.clone()).collect()
    }

    /// Context strings, in the same order as [`diagnostics`](Self::diagnostics).
    pub fn contexts(&self) -> Vec<String> {
        self.diagnostics.lock().iter().map(|(_, c)| c.clone()).collect()
    }

    /// Number of collected diagnostics with the given code.
    pub fn count(&self, code: &str) -> usize {
        self.diagnostics.lock().iter().filter(|(d, _)| d.code == code).count()
    }

    /// Clear collected diagnostics.
    pub fn clear(&self) {
        self.diagnostics.lock().clear();
    }

    /// Check if any errors were collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .iter()
            .any(|(d, _)| d.kind == DiagnosticKind::Error)
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diag: &Diagnostic, context: &str) {
        self.diagnostics.lock().push((diag.clone(), context.to_string()));
    }
}
