//! Profiler integration hooks.
//!
//! External profilers subscribe to a stream of [`MemoryEvent`]s. With the
//! `tracy` feature, live bytes are also plotted and zones posted as Tracy
//! messages.

use std::sync::Arc;

use crate::api::category::Category;
use crate::api::zones::{ZoneColor, ZoneId};

#[cfg(feature = "tracy")]
pub use tracy_client;

/// Memory event for external profilers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEvent {
    /// Memory was allocated
    Alloc {
        address: usize,
        size: usize,
        category: Category,
        zone: Option<ZoneId>,
    },
    /// Memory was freed
    Free {
        address: usize,
        size: usize,
        category: Category,
    },
    /// A region changed size (and possibly moved)
    Resize {
        old_address: usize,
        new_address: usize,
        old_size: usize,
        new_size: usize,
        category: Category,
    },
    /// Memory zone begin
    ZoneBegin {
        id: ZoneId,
        name: &'static str,
        color: ZoneColor,
    },
    /// Memory zone end
    ZoneEnd {
        id: ZoneId,
        duration_us: u64,
    },
}

/// Callback type for external profiler integration.
pub type ProfilerCallback = Arc<dyn Fn(&MemoryEvent) + Send + Sync>;

/// Profiler hooks for external tools.
///
/// The tracker clones the callback out under its hook lock and invokes it
/// with no lock held, so a callback may call back into the tracker.
#[derive(Clone, Default)]
pub struct ProfilerHooks {
    callback: Option<ProfilerCallback>,
    enabled: bool,
}

impl ProfilerHooks {
    /// Create new profiler hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the profiler callback.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: Fn(&MemoryEvent) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self.enabled = true;
    }

    /// Remove the callback.
    pub fn clear_callback(&mut self) {
        self.callback = None;
        self.enabled = false;
    }

    /// Enable or disable profiling.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Check if profiling is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.callback.is_some()
    }

    /// The callback to invoke, if profiling is enabled.
    pub fn active_callback(&self) -> Option<ProfilerCallback> {
        if self.enabled {
            self.callback.clone()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ProfilerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilerHooks")
            .field("callback", &self.callback.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Forward tracker activity to a running Tracy client.
#[cfg(feature = "tracy")]
pub(crate) fn tracy_report(event: &MemoryEvent, live_bytes: usize) {
    let Some(client) = tracy_client::Client::running() else {
        return;
    };

    match event {
        MemoryEvent::ZoneBegin { name, .. } => {
            client.message(&format!("zone begin: {}", name), 0);
        }
        MemoryEvent::ZoneEnd { id, duration_us } => {
            client.message(&format!("zone end: {} ({}us)", id, duration_us), 0);
        }
        _ => {}
    }
    client.plot(tracy_client::plot_name!("trackalloc live bytes"), live_bytes as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callback_enable_disable() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut hooks = ProfilerHooks::new();
        assert!(hooks.active_callback().is_none());

        let counter = seen.clone();
        hooks.set_callback(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        assert!(hooks.is_enabled());

        let event = MemoryEvent::Free { address: 0x10, size: 8, category: Category::General };
        if let Some(cb) = hooks.active_callback() {
            cb(&event);
        }

        hooks.set_enabled(false);
        assert!(hooks.active_callback().is_none());
        assert_eq!(seen.load(Ordering::Relaxed), 1);

        hooks.clear_callback();
        hooks.set_enabled(true);
        assert!(!hooks.is_enabled());
    }
}
