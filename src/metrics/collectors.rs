//! Recording helpers over the raw Prometheus metrics.

use std::time::Duration;

use super::prometheus::{
    EXTRACTIONS_TOTAL, RUNS_IN_PROGRESS, TASKS_FINISHED, TASKS_SUBMITTED, TURN_LATENCY,
};

/// Metrics collector for lead_forge operations.
///
/// Every method is a no-op until `init_metrics()` has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    pub fn record_task_submitted(&self) {
        if let Some(counter) = TASKS_SUBMITTED.get() {
            counter.inc();
        }
    }

    /// Record a task reaching a terminal `status`.
    pub fn record_task_finished(&self, status: &str) {
        if let Some(counter) = TASKS_FINISHED.get() {
            counter.with_label_values(&[status]).inc();
        }
        tracing::trace!(status = status, "Recorded task finished metric");
    }

    /// Count a pipeline run as in progress until the guard drops.
    pub fn track_run(&self) -> RunGuard {
        if let Some(gauge) = RUNS_IN_PROGRESS.get() {
            gauge.inc();
        }
        RunGuard { _private: () }
    }

    /// Record one extraction attempt for `kind`.
    ///
    /// `outcome` is one of `valid`, `invalid`, `truncated`, `not_found`.
    pub fn record_extraction(&self, kind: &str, outcome: &str) {
        if let Some(counter) = EXTRACTIONS_TOTAL.get() {
            counter.with_label_values(&[kind, outcome]).inc();
        }
        tracing::trace!(kind = kind, outcome = outcome, "Recorded extraction metric");
    }

    pub fn record_turn(&self, speaker: &str, elapsed: Duration) {
        if let Some(histogram) = TURN_LATENCY.get() {
            histogram
                .with_label_values(&[speaker])
                .observe(elapsed.as_secs_f64());
        }
    }
}

/// Keeps a run counted in `lead_forge_runs_in_progress`.
///
/// Dropping the guard, including when the run's future is cancelled by a
/// timeout, releases the count.
#[derive(Debug)]
pub struct RunGuard {
    _private: (),
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(gauge) = RUNS_IN_PROGRESS.get() {
            gauge.dec();
        }
    }
}
