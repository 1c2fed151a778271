//! Error types for lead-forge operations.
//!
//! Defines the error types shared across subsystems:
//! - Task registry lifecycle operations
//! - Text-generation provider interactions
//! - Result export and serialization

use thiserror::Error;

/// Errors that can occur during task registry operations.
///
/// These are contract errors surfaced to the immediate caller; they are never
/// stored on a task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Task '{0}' not found in registry")]
    TaskNotFound(String),

    #[error("Invalid state transition from '{from}' to '{to}': {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: set GROQ_API_KEY or LITELLM_API_KEY")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Task not completed (status: {status})")]
    NotCompleted { status: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] arrow::error::ArrowError),

    #[error("Spreadsheet encoding error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RegistryError> for ExportError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::TaskNotFound(id) => ExportError::TaskNotFound(id),
            RegistryError::InvalidTransition { from, .. } => {
                ExportError::NotCompleted { status: from }
            }
        }
    }
}
