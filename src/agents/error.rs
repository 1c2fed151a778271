//! Error types for the collaborator pipeline.
//!
//! Only hard failures live here. A turn that yields no extractable or
//! valid records is an absent kind, never an `AgentError`.

use thiserror::Error;

use crate::error::{LlmError, RegistryError};

/// Errors that can occur while conducting a pipeline run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing credential or an invalid collaborator roster.
    #[error("Agent configuration error: {0}")]
    ConfigurationError(String),

    /// A collaborator could not produce a turn.
    #[error("External call failed: {0}")]
    ExternalCallFailure(String),

    /// A collaborator or the whole run exceeded its time cap.
    #[error("Agent operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// A collaborator returned an unusable response.
    #[error("Failed to parse LLM response: {0}")]
    ResponseParseError(String),

    /// The task capability was rejected by the registry.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl AgentError {
    /// True for the hard failures that are recorded on the task.
    pub fn is_recorded_on_task(&self) -> bool {
        !matches!(self, AgentError::Registry(_))
    }
}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey => AgentError::ConfigurationError(err.to_string()),
            other => AgentError::ExternalCallFailure(other.to_string()),
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
