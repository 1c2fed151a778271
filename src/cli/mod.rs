//! Command-line interface for lead-forge.
//!
//! Provides commands for serving the task API, running a single generation,
//! and inspecting how a saved turn extracts.

mod commands;

pub use commands::{
    extraction_report, parse_cli, run, run_with_cli, Cli, Commands, ExtractionReport,
    GenerationSummary,
};
