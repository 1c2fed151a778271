//! Prometheus metrics for tasks and extraction outcomes.
//!
//! # Example
//!
//! ```ignore
//! use lead_forge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_extraction("lead", "valid");
//! let text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{MetricsCollector, RunGuard};
pub use prometheus::{export_metrics, init_metrics, metrics_handler};

pub use prometheus::{
    EXTRACTIONS_TOTAL, REGISTRY, RUNS_IN_PROGRESS, TASKS_FINISHED, TASKS_SUBMITTED, TURN_LATENCY,
};
