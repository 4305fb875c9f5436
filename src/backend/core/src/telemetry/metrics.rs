//! Reconciliation metrics.
//!
//! Counters are emitted through the `metrics` facade; no exporter is installed
//! here. Hosts that want Prometheus (or anything else) install a recorder
//! before creating the engine.
//!
//! # Example
//!
//! ```rust,no_run
//! use rolesync_core::telemetry::metrics::SyncMetrics;
//!
//! SyncMetrics::record_fallback("roles");
//! SyncMetrics::record_attempt("add", "permission_ids_object", "success");
//! ```

use metrics::{counter, describe_counter, histogram, describe_histogram};
use std::sync::Once;
use std::time::{Duration, Instant};

static DESCRIBE: Once = Once::new();

/// Register all metric descriptions (idempotent).
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!("rolesync_errors_total", "Errors constructed, by code and category");
        describe_counter!(
            "rolesync_fallback_total",
            "Read operations that degraded to a fallback dataset"
        );
        describe_counter!(
            "rolesync_sync_attempts_total",
            "Individual add/remove request attempts, by phase, strategy and outcome"
        );
        describe_counter!("rolesync_saves_total", "Save operations by final status");
        describe_histogram!(
            "rolesync_backend_request_seconds",
            "Backend request latency in seconds"
        );
    });
}

/// Counters for the reconciliation lifecycle.
pub struct SyncMetrics;

impl SyncMetrics {
    /// A read degraded to static/previous data.
    pub fn record_fallback(dataset: &str) {
        counter!("rolesync_fallback_total", "dataset" => dataset.to_string()).increment(1);
    }

    /// One request-shape attempt finished.
    pub fn record_attempt(phase: &str, strategy: &str, outcome: &str) {
        counter!(
            "rolesync_sync_attempts_total",
            "phase" => phase.to_string(),
            "strategy" => strategy.to_string(),
            "outcome" => outcome.to_string(),
        )
        .increment(1);
    }

    /// A save finished with the given status label.
    pub fn record_save(status: &str) {
        counter!("rolesync_saves_total", "status" => status.to_string()).increment(1);
    }
}

/// Timer for a single backend request.
pub struct RequestTimer {
    method: &'static str,
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn start(method: &'static str, endpoint: &'static str) -> Self {
        Self {
            method,
            endpoint,
            start: Instant::now(),
        }
    }

    /// Record the elapsed time and return it.
    pub fn finish(self, ok: bool) -> Duration {
        let elapsed = self.start.elapsed();
        histogram!(
            "rolesync_backend_request_seconds",
            "method" => self.method,
            "endpoint" => self.endpoint,
            "ok" => ok.to_string(),
        )
        .record(elapsed.as_secs_f64());
        elapsed
    }
}
