//! Simple metrics collection for observability
//!
//! Lightweight counters over atomics. Designed for minimal overhead and
//! zero allocations in the hot path; the only allocation happens when the
//! Prometheus text is rendered on scrape.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Core metrics collected by the admission service
#[derive(Debug)]
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Total admission checks processed
    pub requests_total: AtomicU64,

    /// Admission decisions
    pub requests_allowed: AtomicU64,
    pub requests_denied: AtomicU64,

    /// Checks that failed before a decision was reached
    pub handle_errors: AtomicU64,

    /// Sweep activity
    pub sweeps_total: AtomicU64,
    pub keys_evicted: AtomicU64,

    /// Keys currently holding state, updated after each sweep
    pub active_keys: AtomicUsize,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            requests_total: AtomicU64::new(0),
            requests_allowed: AtomicU64::new(0),
            requests_denied: AtomicU64::new(0),
            handle_errors: AtomicU64::new(0),
            sweeps_total: AtomicU64::new(0),
            keys_evicted: AtomicU64::new(0),
            active_keys: AtomicUsize::new(0),
        }
    }

    /// Record one admission decision
    pub fn record_decision(&self, allowed: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if allowed {
            self.requests_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a check that failed before producing a decision
    pub fn record_handle_error(&self) {
        self.handle_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed sweep
    pub fn record_sweep(&self, evicted: usize, active: usize) {
        self.sweeps_total.fetch_add(1, Ordering::Relaxed);
        self.keys_evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        self.active_keys.store(active, Ordering::Relaxed);
    }

    /// Update the active keys gauge outside of a sweep
    pub fn update_active_keys(&self, count: usize) {
        self.active_keys.store(count, Ordering::Relaxed);
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(1200);

        output.push_str("# HELP gatelimit_uptime_seconds Time since server start in seconds\n");
        output.push_str("# TYPE gatelimit_uptime_seconds gauge\n");
        output.push_str(&format!(
            "gatelimit_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        output.push_str("# HELP gatelimit_requests_total Total admission checks processed\n");
        output.push_str("# TYPE gatelimit_requests_total counter\n");
        output.push_str(&format!(
            "gatelimit_requests_total {}\n\n",
            self.requests_total.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP gatelimit_requests_allowed Total checks that were admitted\n");
        output.push_str("# TYPE gatelimit_requests_allowed counter\n");
        output.push_str(&format!(
            "gatelimit_requests_allowed {}\n\n",
            self.requests_allowed.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP gatelimit_requests_denied Total checks that were denied\n");
        output.push_str("# TYPE gatelimit_requests_denied counter\n");
        output.push_str(&format!(
            "gatelimit_requests_denied {}\n\n",
            self.requests_denied.load(Ordering::Relaxed)
        ));

        output.push_str(
            "# HELP gatelimit_handle_errors Checks that failed before a decision was reached\n",
        );
        output.push_str("# TYPE gatelimit_handle_errors counter\n");
        output.push_str(&format!(
            "gatelimit_handle_errors {}\n\n",
            self.handle_errors.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP gatelimit_sweeps_total Completed idle-key sweeps\n");
        output.push_str("# TYPE gatelimit_sweeps_total counter\n");
        output.push_str(&format!(
            "gatelimit_sweeps_total {}\n\n",
            self.sweeps_total.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP gatelimit_keys_evicted Idle keys removed by sweeps\n");
        output.push_str("# TYPE gatelimit_keys_evicted counter\n");
        output.push_str(&format!(
            "gatelimit_keys_evicted {}\n\n",
            self.keys_evicted.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP gatelimit_active_keys Keys currently holding state\n");
        output.push_str("# TYPE gatelimit_active_keys gauge\n");
        output.push_str(&format!(
            "gatelimit_active_keys {}\n",
            self.active_keys.load(Ordering::Relaxed)
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
