//! Tracker configuration.

/// Configuration for a [`TrackedAllocator`](crate::TrackedAllocator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Number of samples kept in the time-series history (default: 4096).
    /// Zero disables history.
    pub history_capacity: usize,

    /// Record a sample on every allocate/free/resize (default: true).
    /// When false, samples are only taken by explicit `sample()` calls.
    pub sample_on_change: bool,

    /// Closed zones retained for queries and export (default: 1024)
    pub max_closed_zones: usize,

    /// Capture a backtrace per allocation (requires the `debug` feature)
    pub capture_backtraces: bool,

    /// Emit a leak diagnostic if the tracker is dropped with live records
    pub report_leaks_on_drop: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 4096,
            sample_on_change: true,
            max_closed_zones: 1024,
            capture_backtraces: cfg!(feature = "debug"),
            report_leaks_on_drop: true,
        }
    }
}

impl TrackerConfig {
    /// Counters only: no history, few zones, no backtraces.
    pub fn minimal() -> Self {
        Self {
            history_capacity: 0,
            sample_on_change: false,
            max_closed_zones: 16,
            capture_backtraces: false,
            report_leaks_on_drop: true,
        }
    }

    /// Long history and zone retention for offline analysis.
    pub fn detailed() -> Self {
        Self {
            history_capacity: 65536,
            sample_on_change: true,
            max_closed_zones: 16384,
            capture_backtraces: cfg!(feature = "debug"),
            report_leaks_on_drop: true,
        }
    }

    /// Default config with overrides from the environment.
    ///
    /// - `TRACKALLOC_HISTORY`: history capacity
    /// - `TRACKALLOC_SAMPLE`: "0"/"false" disables per-change sampling
    /// - `TRACKALLOC_BACKTRACE`: "1"/"true" enables backtrace capture
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(capacity) = env_var("TRACKALLOC_HISTORY").and_then(|v| v.parse().ok()) {
            config.history_capacity = capacity;
        }
        if let Some(sample) = env_var("TRACKALLOC_SAMPLE").and_then(|v| parse_flag(&v)) {
            config.sample_on_change = sample;
        }
        if let Some(capture) = env_var("TRACKALLOC_BACKTRACE").and_then(|v| parse_flag(&v)) {
            config.capture_backtraces = capture;
        }

        config
    }

    /// Builder pattern: set history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Builder pattern: enable per-change sampling.
    pub fn with_sample_on_change(mut self, enable: bool) -> Self {
        self.sample_on_change = enable;
        self
    }

    /// Builder pattern: set closed zone retention.
    pub fn with_max_closed_zones(mut self, max: usize) -> Self {
        self.max_closed_zones = max;
        self
    }

    /// Builder pattern: enable backtrace capture.
    pub fn with_backtraces(mut self, enable: bool) -> Self {
        self.capture_backtraces = enable;
        self
    }

    /// Builder pattern: enable the leak diagnostic on drop.
    pub fn with_leak_report_on_drop(mut self, enable: bool) -> Self {
        self.report_leaks_on_drop = enable;
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
