//! Build script for trackalloc.
//!
//! Reports which optional integrations are compiled in, and warns about
//! combinations that are usually unintended.

use std::env;

fn main() {
    // Re-run if features change
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DEBUG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_TRACY");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_LOG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DIAGNOSTICS");

    let debug_enabled = env::var("CARGO_FEATURE_DEBUG").is_ok();
    let tracy_enabled = env::var("CARGO_FEATURE_TRACY").is_ok();
    let log_enabled = env::var("CARGO_FEATURE_LOG").is_ok();
    let diagnostics_enabled = env::var("CARGO_FEATURE_DIAGNOSTICS").is_ok();

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let is_release = profile == "release";

    // --- Debug Features ---
    if debug_enabled {
        emit_info("Debug features enabled");
        emit_note("Debug mode provides:");
        emit_note("  • Allocation backtraces in leak reports");
        emit_note("  • Memory poisoning (freed heap memory filled with 0xCD)");

        if is_release {
            emit_warning("Debug features enabled in release build!");
            emit_note("Backtrace capture on every allocation is expensive. Consider disabling for production.");
        }
    }

    // --- Tracy Integration ---
    if tracy_enabled {
        emit_info("Tracy profiler integration enabled");
        emit_note("Live bytes are plotted as \"trackalloc live bytes\"; zones are posted as messages.");
    }

    // --- Release diagnostics ---
    if is_release && !diagnostics_enabled && !log_enabled {
        emit_note("Tip: diagnostics are silent in release builds.");
        emit_note("  Enable 'diagnostics' for stderr output or 'log' to route them through the log crate.");
    }
}

// =============================================================================
// Diagnostic emission helpers
// =============================================================================

fn emit_info(msg: &str) {
    println!("cargo:warning=[trackalloc] ℹ️  {}", msg);
}

fn emit_note(msg: &str) {
    if msg.is_empty() {
        println!("cargo:warning=[trackalloc]");
    } else {
        println!("cargo:warning=[trackalloc]    {}", msg);
    }
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[trackalloc] ⚠️  {}", msg);
}
