//! Metric names and label keys for the reconciliation domain, plus a guard
//! for timing units of work. Everything goes through the `metrics` facade;
//! the embedding process decides on a recorder.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `parley_flow_job_events_total` | Counter | `kind`, `outcome` | Job events by kind and reconcile outcome |
//! | `parley_flow_reconcile_seconds` | Histogram | `path` | Event reconcile duration |
//! | `parley_flow_results_total` | Counter | `kind` | Result records materialized |
//! | `parley_flow_result_failures_total` | Counter | `reason` | Per-pair materialization failures |
//! | `parley_flow_tee_jobs_total` | Counter | `kind`, `status` | TEE workflow job submissions and completions |
//! | `parley_flow_fan_out_nodes_total` | Counter | `outcome` | Per-node fan-out query outcomes |

use std::time::{Duration, Instant};

/// Metric names.
pub mod names {
    /// Counter: job events by kind and reconcile outcome.
    pub const JOB_EVENTS_TOTAL: &str = "parley_flow_job_events_total";
    /// Histogram: event reconcile duration in seconds.
    pub const RECONCILE_SECONDS: &str = "parley_flow_reconcile_seconds";
    /// Counter: result records materialized.
    pub const RESULTS_TOTAL: &str = "parley_flow_results_total";
    /// Counter: per-pair materialization failures.
    pub const RESULT_FAILURES_TOTAL: &str = "parley_flow_result_failures_total";
    /// Counter: TEE workflow jobs by kind and status.
    pub const TEE_JOBS_TOTAL: &str = "parley_flow_tee_jobs_total";
    /// Counter: per-node fan-out query outcomes.
    pub const FAN_OUT_NODES_TOTAL: &str = "parley_flow_fan_out_nodes_total";
}

/// Label keys.
pub mod labels {
    /// Event kind (added, modified, deleted, ...).
    pub const KIND: &str = "kind";
    /// Reconcile outcome (applied, deferred, dropped, tee, terminal).
    pub const OUTCOME: &str = "outcome";
    /// Reconcile path (job, tee).
    pub const PATH: &str = "path";
    /// Result kind or TEE job status.
    pub const STATUS: &str = "status";
    /// Failure reason label.
    pub const REASON: &str = "reason";
}

/// Calls a closure with the elapsed time when dropped.
///
/// Scope one over a unit of work and record the duration into a histogram
/// from the closure; early returns and error paths are covered for free.
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Starts the clock; `on_drop` receives the elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}
