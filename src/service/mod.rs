//! Generation service.
//!
//! Owns the task registry and runs each submitted prompt in its own
//! background tokio task, either replaying the fixture dataset or driving
//! the collaborator pipeline against the configured provider.

pub mod fixture;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::agents::{AgentError, AgentResult, CoordinatorConfig, PipelineCoordinator, Roster};
use crate::config::{AppConfig, ConfigError, RunMode};
use crate::error::{ExportError, RegistryError};
use crate::export::{export_artifact, ExportArtifact, ExportFormat, GenerationResult};
use crate::llm::LiteLlmClient;
use crate::registry::{GenerationTask, TaskHandle, TaskProgress, TaskRegistry, TaskStatus};

pub use fixture::{FixtureDataset, FIXTURE_STEPS};

/// Errors returned by the service surface.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Prompt cannot be empty")]
    EmptyPrompt,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ServiceError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::EmptyPrompt => 400,
            ServiceError::Registry(RegistryError::TaskNotFound(_)) => 404,
            ServiceError::Registry(RegistryError::InvalidTransition { .. }) => 400,
            ServiceError::Export(ExportError::TaskNotFound(_)) => 404,
            ServiceError::Export(
                ExportError::NotCompleted { .. } | ExportError::UnsupportedFormat(_),
            ) => 400,
            ServiceError::Export(_) => 500,
        }
    }
}

/// Response to a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
}

/// Polling view of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: TaskProgress,
    pub result: Option<GenerationResult>,
    pub error: Option<String>,
}

impl From<GenerationTask> for TaskStatusView {
    fn from(task: GenerationTask) -> Self {
        Self {
            task_id: task.task_id,
            status: task.status,
            progress: task.progress,
            result: task.result,
            error: task.error,
        }
    }
}

/// Every known task, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<GenerationTask>,
    pub total: usize,
}

/// Builds the coordinator used by a live run.
pub type CoordinatorFactory =
    Arc<dyn Fn(&AppConfig) -> AgentResult<PipelineCoordinator> + Send + Sync>;

/// Coordinator over the lead-generation roster, calling the configured
/// provider.
pub fn provider_coordinator(config: &AppConfig) -> AgentResult<PipelineCoordinator> {
    let client = LiteLlmClient::from_config(config)?;
    PipelineCoordinator::with_provider(
        Roster::lead_generation(),
        Arc::new(client),
        config.model.clone(),
        config.temperature,
        CoordinatorConfig::from_app_config(config),
    )
}

/// Error recorded on a task whose run panicked.
pub const PANIC_ERROR: &str = "pipeline run panicked";

/// Move a task whose run panicked to `failed`, beginning it first if the
/// panic struck before the run did.
async fn record_panic(handle: &TaskHandle) -> Result<(), RegistryError> {
    let task = handle.snapshot().await?;
    match task.status {
        TaskStatus::Queued => {
            handle.begin().await?;
            handle.fail(PANIC_ERROR).await
        }
        TaskStatus::Running => handle.fail(PANIC_ERROR).await,
        TaskStatus::Completed | TaskStatus::Failed => Ok(()),
    }
}

/// Service owning the task registry and the background runs.
#[derive(Clone)]
pub struct GenerationService {
    registry: Arc<TaskRegistry>,
    config: Arc<AppConfig>,
    fixture: Arc<FixtureDataset>,
    coordinator_factory: CoordinatorFactory,
}

impl GenerationService {
    /// Create a service for `config`.
    ///
    /// # Errors
    ///
    /// Fails if the configured fixture file cannot be read or parsed.
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        let fixture = FixtureDataset::from_path(config.fixture_path.as_deref())?;
        Ok(Self {
            registry: Arc::new(TaskRegistry::new()),
            config: Arc::new(config),
            fixture: Arc::new(fixture),
            coordinator_factory: Arc::new(provider_coordinator),
        })
    }

    /// Replace how live runs build their coordinator.
    pub fn with_coordinator_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&AppConfig) -> AgentResult<PipelineCoordinator> + Send + Sync + 'static,
    {
        self.coordinator_factory = Arc::new(factory);
        self
    }

    pub fn with_fixture(mut self, fixture: FixtureDataset) -> Self {
        self.fixture = Arc::new(fixture);
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Accept a prompt and start its run in the background.
    pub async fn submit(&self, prompt: &str) -> Result<SubmitResponse, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::EmptyPrompt);
        }

        let task_id = self.registry.create(prompt).await;
        let handle = self.registry.handle(&task_id).await?;

        tracing::info!(task_id = %task_id, mode = %self.config.mode, "Task submitted");

        self.spawn_run(handle, prompt.to_string());

        Ok(SubmitResponse {
            task_id,
            status: TaskStatus::Queued,
            message: "Lead generation started".to_string(),
        })
    }

    /// Run a prompt to completion before returning its final view.
    pub async fn run_foreground(&self, prompt: &str) -> Result<TaskStatusView, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::EmptyPrompt);
        }

        let task_id = self.registry.create(prompt).await;
        let handle = self.registry.handle(&task_id).await?;
        if let Err(e) = self.spawn_run(handle, prompt.to_string()).await {
            tracing::error!(task_id = %task_id, error = %e, "Run supervisor panicked");
        }
        self.status(&task_id).await
    }

    /// Spawn the run for `handle` under a supervisor that records a panic
    /// on the task as a failure.
    fn spawn_run(&self, handle: TaskHandle, prompt: String) -> JoinHandle<()> {
        let service = self.clone();
        let run_handle = handle.clone();
        let run = tokio::spawn(async move {
            service.execute(run_handle, prompt).await;
        });

        tokio::spawn(async move {
            match run.await {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    tracing::error!(task_id = %handle.task_id(), error = %e, "Pipeline run panicked");
                    if let Err(err) = record_panic(&handle).await {
                        tracing::debug!(task_id = %handle.task_id(), error = %err, "Panicked run no longer owns its task");
                    }
                }
                Err(e) => {
                    tracing::warn!(task_id = %handle.task_id(), error = %e, "Pipeline run cancelled");
                }
            }
        })
    }

    /// Drive one task's run to its end.
    ///
    /// Every outcome is recorded on the task itself; registry rejections
    /// (such as the task being deleted mid-run) end the run quietly.
    pub async fn execute(&self, handle: TaskHandle, prompt: String) {
        let outcome = match self.config.mode {
            RunMode::Fixture => {
                fixture::replay(&handle, &self.fixture, self.config.fixture_step_delay)
                    .await
                    .map(|_| ())
                    .map_err(AgentError::from)
            }
            RunMode::Live => self.run_live(&handle, &prompt).await,
        };

        match outcome {
            Ok(()) => {}
            Err(AgentError::Registry(err)) => {
                tracing::debug!(task_id = %handle.task_id(), error = %err, "Run ended without owning its task");
            }
            Err(err) => {
                tracing::warn!(task_id = %handle.task_id(), error = %err, "Run failed");
            }
        }
    }

    async fn run_live(&self, handle: &TaskHandle, prompt: &str) -> AgentResult<()> {
        let coordinator = match (self.coordinator_factory)(&self.config) {
            Ok(coordinator) => coordinator,
            Err(err) => {
                handle.begin().await?;
                handle.fail(err.to_string()).await?;
                return Err(err);
            }
        };

        let run_timeout = self.config.run_timeout;
        match tokio::time::timeout(run_timeout, coordinator.run(handle, prompt)).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => {
                let err = AgentError::Timeout {
                    seconds: run_timeout.as_secs(),
                };
                tracing::warn!(task_id = %handle.task_id(), "Pipeline run exceeded its time cap");
                handle.fail(err.to_string()).await?;
                Err(err)
            }
        }
    }

    pub async fn status(&self, task_id: &str) -> Result<TaskStatusView, ServiceError> {
        Ok(self.registry.get(task_id).await?.into())
    }

    pub async fn list(&self) -> TaskList {
        let tasks = self.registry.list().await;
        TaskList {
            total: tasks.len(),
            tasks,
        }
    }

    pub async fn delete(&self, task_id: &str) -> Result<(), ServiceError> {
        self.registry.delete(task_id).await?;
        tracing::info!(task_id = %task_id, "Task deleted");
        Ok(())
    }

    /// Serialize a completed task's result.
    ///
    /// Unknown tasks fail first, then tasks that are not completed, then
    /// unsupported formats.
    pub async fn export(&self, task_id: &str, format: &str) -> Result<ExportArtifact, ServiceError> {
        let task = self
            .registry
            .get(task_id)
            .await
            .map_err(ExportError::from)?;

        let result = match (task.status, task.result) {
            (TaskStatus::Completed, Some(result)) => result,
            (status, _) => {
                return Err(ExportError::NotCompleted {
                    status: status.to_string(),
                }
                .into())
            }
        };

        let format: ExportFormat = format.parse()?;
        Ok(export_artifact(task_id, &result, format)?)
    }
}
