//! Execution counters and the aggregate metrics snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use crate::types::ServerMetrics;

/// Monotonic execution counters plus the server start instant.
///
/// Counters only ever increase. An attempt is counted in
/// `total_requests` once its agent and tool have resolved; every counted
/// attempt then lands in exactly one of `successful_executions` or
/// `failed_executions`, so the two always sum to the total.
pub struct ServerCounters {
    total_requests: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    started_at: OnceLock<Instant>,
}

impl ServerCounters {
    /// Create counters at zero with no start instant
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_executions: AtomicU64::new(0),
            failed_executions: AtomicU64::new(0),
            started_at: OnceLock::new(),
        }
    }

    /// Record the start instant; later calls keep the first
    pub fn mark_started(&self) {
        let _ = self.started_at.set(Instant::now());
    }

    /// Count an attempt accepted for dispatch
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a completed execution
    pub fn record_success(&self) {
        self.successful_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed execution
    pub fn record_failure(&self) {
        self.failed_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Seconds since the server started, 0 if it never did
    pub fn uptime_seconds(&self) -> f64 {
        self.started_at
            .get()
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Build the aggregate snapshot, combining counters with registry sizes
    pub fn snapshot(&self, active_agents: usize, registered_tools: usize) -> ServerMetrics {
        ServerMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_executions: self.successful_executions.load(Ordering::Relaxed),
            failed_executions: self.failed_executions.load(Ordering::Relaxed),
            active_agents,
            registered_tools,
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

impl Default for ServerCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = ServerCounters::new();
        for _ in 0..5 {
            counters.record_request();
        }
        counters.record_success();
        counters.record_success();
        counters.record_success();
        counters.record_failure();
        counters.record_failure();

        let metrics = counters.snapshot(2, 7);
        assert_eq!(metrics.total_requests, 5);
        assert_eq!(metrics.successful_executions, 3);
        assert_eq!(metrics.failed_executions, 2);
        assert_eq!(
            metrics.successful_executions + metrics.failed_executions,
            metrics.total_requests
        );
        assert_eq!(metrics.active_agents, 2);
        assert_eq!(metrics.registered_tools, 7);
    }

    #[test]
    fn test_uptime_starts_at_zero() {
        let counters = ServerCounters::new();
        assert_eq!(counters.uptime_seconds(), 0.0);

        counters.mark_started();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let first = counters.uptime_seconds();
        assert!(first > 0.0);

        // The start instant is set once; marking again does not reset it
        counters.mark_started();
        assert!(counters.uptime_seconds() >= first);
    }
}
