use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::export::GenerationResult;

/// Status of a generation task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Terminal tasks are immutable except for deletion.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress reported by the pipeline run owning a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Name of the step currently executing.
    pub current_step: String,
    /// Number of steps finished so far.
    pub steps_completed: u32,
    /// Number of steps the run expects to execute.
    pub total_steps: u32,
}

impl TaskProgress {
    pub fn new(current_step: impl Into<String>, steps_completed: u32, total_steps: u32) -> Self {
        Self {
            current_step: current_step.into(),
            steps_completed,
            total_steps,
        }
    }

    /// Progress of a task that has not started yet.
    pub fn initial() -> Self {
        Self::new("Queued", 0, 0)
    }
}

impl Default for TaskProgress {
    fn default() -> Self {
        Self::initial()
    }
}

/// A unit of asynchronous lead-generation work tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    /// Opaque unique identifier, never reused.
    pub task_id: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// The prompt the task was submitted with.
    pub prompt: String,
    /// Latest progress written by the owning run.
    pub progress: TaskProgress,
    /// Assembled result; present only when completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    /// Human-readable failure cause; present only when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationTask {
    /// Create a queued task with a fresh identifier and zero progress.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            status: TaskStatus::Queued,
            prompt: prompt.into(),
            progress: TaskProgress::initial(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Checks that `result`/`error` presence agrees with `status`.
    pub fn outcome_consistent(&self) -> bool {
        match self.status {
            TaskStatus::Queued | TaskStatus::Running => {
                self.result.is_none() && self.error.is_none()
            }
            TaskStatus::Completed => self.result.is_some() && self.error.is_none(),
            TaskStatus::Failed => self.error.is_some() && self.result.is_none(),
        }
    }
}
