//! Diagnostic context - thread and zone awareness.

use std::thread::ThreadId;

use crate::api::zones::ZoneHandle;

/// Runtime state attached to a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagContext {
    /// Current thread ID.
    pub thread_id: ThreadId,
    /// Thread name (if available).
    pub thread_name: Option<String>,
    /// Innermost open zone on this thread, if any.
    pub zone: Option<ZoneHandle>,
    /// Address the diagnostic is about, if any.
    pub address: Option<usize>,
    /// Free-form detail, such as leak totals.
    pub detail: Option<String>,
}

impl DiagContext {
    /// Capture the current thread's context.
    pub fn capture(zone: Option<ZoneHandle>) -> Self {
        let thread = std::thread::current();
        Self {
            thread_id: thread.id(),
            thread_name: thread.name().map(String::from),
            zone,
            address: None,
            detail: None,
        }
    }

    /// Attach the address the diagnostic concerns.
    pub fn with_address(mut self, address: usize) -> Self {
        self.address = Some(address);
        self
    }

    /// Attach a free-form detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Format context for diagnostic output.
    pub fn format(&self) -> String {
        let mut parts = Vec::new();

        if let Some(ref name) = self.thread_name {
            parts.push(format!("thread=\"{}\"", name));
        } else {
            parts.push(format!("thread={:?}", self.thread_id));
        }
        if let Some(zone) = self.zone {
            parts.push(format!("zone=\"{}\" ({})", zone.name(), zone.id()));
        }
        if let Some(address) = self.address {
            parts.push(format!("address=0x{:x}", address));
        }
        if let Some(ref detail) = self.detail {
            parts.push(detail.clone());
        }

        parts.join(", ")
    }
}

impl std::fmt::Display for DiagContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}
