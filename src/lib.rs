//! lead_forge: multi-agent lead generation with resilient structured output.
//!
//! A bounded exchange between collaborating agents produces free text; the
//! extraction engine and validator turn it into lead and email records that
//! callers poll for through the task registry.

// Core modules
pub mod agents;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod utils;
pub mod validation;

// Re-export commonly used error types
pub use error::{ExportError, LlmError, RegistryError};
