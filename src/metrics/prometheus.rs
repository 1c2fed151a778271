//! Prometheus metrics registration and export.
//!
//! Metrics live in process-wide statics filled by [`init_metrics`]. Recording
//! before initialization is a no-op.

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::{Mutex, OnceLock};

/// Global Prometheus registry for all lead_forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Tasks accepted by the registry.
pub static TASKS_SUBMITTED: OnceLock<Counter> = OnceLock::new();

/// Tasks reaching a terminal state, by status.
pub static TASKS_FINISHED: OnceLock<CounterVec> = OnceLock::new();

/// Pipeline runs currently executing.
pub static RUNS_IN_PROGRESS: OnceLock<Gauge> = OnceLock::new();

/// Extraction attempts per kind and outcome.
pub static EXTRACTIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Time taken by a single collaborator turn.
pub static TURN_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize and register all metrics.
///
/// Calling this more than once keeps the first registration.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let tasks_submitted = Counter::new(
        "lead_forge_tasks_submitted_total",
        "Total number of generation tasks submitted",
    )?;

    let tasks_finished = CounterVec::new(
        Opts::new(
            "lead_forge_tasks_finished_total",
            "Total number of generation tasks that reached a terminal state",
        ),
        &["status"],
    )?;

    let runs_in_progress = Gauge::new(
        "lead_forge_runs_in_progress",
        "Number of pipeline runs currently executing",
    )?;

    let extractions_total = CounterVec::new(
        Opts::new(
            "lead_forge_extractions_total",
            "Structured extraction attempts by schema kind and outcome",
        ),
        &["kind", "outcome"],
    )?;

    let turn_latency = HistogramVec::new(
        HistogramOpts::new(
            "lead_forge_turn_latency_seconds",
            "Collaborator turn latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 120.0]),
        &["speaker"],
    )?;

    registry.register(Box::new(tasks_submitted.clone()))?;
    registry.register(Box::new(tasks_finished.clone()))?;
    registry.register(Box::new(runs_in_progress.clone()))?;
    registry.register(Box::new(extractions_total.clone()))?;
    registry.register(Box::new(turn_latency.clone()))?;

    let _ = TASKS_SUBMITTED.set(tasks_submitted);
    let _ = TASKS_FINISHED.set(tasks_finished);
    let _ = RUNS_IN_PROGRESS.set(runs_in_progress);
    let _ = EXTRACTIONS_TOTAL.set(extractions_total);
    let _ = TURN_LATENCY.set(turn_latency);
    let _ = REGISTRY.set(registry);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

/// HTTP handler body for the `/metrics` endpoint.
pub async fn metrics_handler() -> String {
    export_metrics()
}
