//! Task registry for asynchronous generation tasks.
//!
//! This module provides functionality for:
//! - Creating tasks and allocating their identifiers
//! - Enforcing the task lifecycle state machine
//! - Serving consistent snapshots to concurrent status queries
//!
//! The registry is the only shared mutable resource in the process. Every
//! mutation happens under the write half of a single `RwLock`, so readers
//! observe either the state before a write or the state after it, never a
//! partially applied update. Within one task, the pipeline run holding its
//! [`TaskHandle`] is the only writer.

pub mod entry;
pub mod lifecycle;

pub use entry::{GenerationTask, TaskProgress, TaskStatus};
pub use lifecycle::LifecycleManager;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::RegistryError;
use crate::export::GenerationResult;
use crate::metrics::MetricsCollector;

#[derive(Default)]
struct RegistryState {
    tasks: HashMap<String, GenerationTask>,
    /// Task ids in insertion order.
    order: Vec<String>,
}

/// In-memory store of generation tasks, indexed by id.
pub struct TaskRegistry {
    state: RwLock<RegistryState>,
    lifecycle: LifecycleManager,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            lifecycle: LifecycleManager::new(),
        }
    }

    /// Allocate a new queued task and return its id.
    pub async fn create(&self, prompt: impl Into<String>) -> String {
        let task = GenerationTask::new(prompt);
        let task_id = task.task_id.clone();

        let mut state = self.state.write().await;
        state.order.push(task_id.clone());
        state.tasks.insert(task_id.clone(), task);

        MetricsCollector::new().record_task_submitted();
        tracing::debug!(task_id = %task_id, "Task created");
        task_id
    }

    /// Transition `queued -> running`.
    pub async fn begin(&self, task_id: &str) -> Result<(), RegistryError> {
        self.mutate(task_id, |lifecycle, task| {
            lifecycle.transition(task, TaskStatus::Running)
        })
        .await
    }

    /// Overwrite the progress of a running task (last write wins).
    pub async fn update_progress(
        &self,
        task_id: &str,
        step_name: impl Into<String>,
        completed: u32,
        total: u32,
    ) -> Result<(), RegistryError> {
        let step_name = step_name.into();
        self.mutate(task_id, |lifecycle, task| {
            lifecycle.require(task, TaskStatus::Running, "update_progress")?;
            task.progress = TaskProgress::new(step_name, completed, total);
            Ok(())
        })
        .await
    }

    /// Transition `running -> completed` and attach the assembled result.
    pub async fn complete(
        &self,
        task_id: &str,
        result: GenerationResult,
    ) -> Result<(), RegistryError> {
        self.mutate(task_id, |lifecycle, task| {
            lifecycle.transition(task, TaskStatus::Completed)?;
            task.result = Some(result);
            Ok(())
        })
        .await?;
        MetricsCollector::new().record_task_finished(TaskStatus::Completed.as_str());
        Ok(())
    }

    /// Transition `running -> failed` and record the cause.
    pub async fn fail(&self, task_id: &str, error: impl Into<String>) -> Result<(), RegistryError> {
        let error = error.into();
        self.mutate(task_id, |lifecycle, task| {
            lifecycle.transition(task, TaskStatus::Failed)?;
            task.error = Some(error);
            Ok(())
        })
        .await?;
        MetricsCollector::new().record_task_finished(TaskStatus::Failed.as_str());
        Ok(())
    }

    /// Get a snapshot of a task.
    pub async fn get(&self, task_id: &str) -> Result<GenerationTask, RegistryError> {
        let state = self.state.read().await;
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| RegistryError::TaskNotFound(task_id.to_string()))
    }

    /// Snapshots of every known task, in insertion order.
    pub async fn list(&self) -> Vec<GenerationTask> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    /// Remove a task permanently, whatever its status.
    pub async fn delete(&self, task_id: &str) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        if state.tasks.remove(task_id).is_none() {
            return Err(RegistryError::TaskNotFound(task_id.to_string()));
        }
        state.order.retain(|id| id != task_id);
        tracing::debug!(task_id = %task_id, "Task deleted");
        Ok(())
    }

    /// Number of tasks currently held.
    pub async fn len(&self) -> usize {
        self.state.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Grant the capability to mutate exactly one task.
    pub async fn handle(self: &Arc<Self>, task_id: &str) -> Result<TaskHandle, RegistryError> {
        if !self.state.read().await.tasks.contains_key(task_id) {
            return Err(RegistryError::TaskNotFound(task_id.to_string()));
        }
        Ok(TaskHandle {
            registry: Arc::clone(self),
            task_id: task_id.to_string(),
        })
    }

    async fn mutate<F>(&self, task_id: &str, apply: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&LifecycleManager, &mut GenerationTask) -> Result<(), RegistryError>,
    {
        let mut state = self.state.write().await;
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::TaskNotFound(task_id.to_string()))?;

        // Work on a copy so a rejected mutation leaves the stored task untouched.
        let mut updated = task.clone();
        apply(&self.lifecycle, &mut updated)?;
        debug_assert!(updated.outcome_consistent());
        *task = updated;
        Ok(())
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Write capability for a single task, held by the run that owns it.
#[derive(Clone)]
pub struct TaskHandle {
    registry: Arc<TaskRegistry>,
    task_id: String,
}

impl TaskHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub async fn begin(&self) -> Result<(), RegistryError> {
        self.registry.begin(&self.task_id).await
    }

    pub async fn update_progress(
        &self,
        step_name: impl Into<String>,
        completed: u32,
        total: u32,
    ) -> Result<(), RegistryError> {
        self.registry
            .update_progress(&self.task_id, step_name, completed, total)
            .await
    }

    pub async fn complete(&self, result: GenerationResult) -> Result<(), RegistryError> {
        self.registry.complete(&self.task_id, result).await
    }

    pub async fn fail(&self, error: impl Into<String>) -> Result<(), RegistryError> {
        self.registry.fail(&self.task_id, error).await
    }

    /// Snapshot of the owned task.
    pub async fn snapshot(&self) -> Result<GenerationTask, RegistryError> {
        self.registry.get(&self.task_id).await
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task_id", &self.task_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_get_is_queued() {
        let registry = TaskRegistry::new();
        let id = registry.create("industrial leads").await;

        let task = registry.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress.steps_completed, 0);
        assert_eq!(task.prompt, "industrial leads");
    }

    #[tokio::test]
    async fn test_full_lifecycle_completed() {
        let registry = TaskRegistry::new();
        let id = registry.create("p").await;

        registry.begin(&id).await.unwrap();
        registry
            .update_progress(&id, "Round 1", 1, 3)
            .await
            .unwrap();
        registry
            .complete(&id, GenerationResult::default())
            .await
            .unwrap();

        let task = registry.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress.current_step, "Round 1");
        assert!(task.result.is_some());
        assert!(task.error.is_none());
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_begin_twice_is_invalid() {
        let registry = TaskRegistry::new();
        let id = registry.create("p").await;
        registry.begin(&id).await.unwrap();

        let err = registry.begin(&id).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_complete_requires_running() {
        let registry = TaskRegistry::new();
        let id = registry.create("p").await;

        let err = registry
            .complete(&id, GenerationResult::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition { .. }));

        let task = registry.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_progress_rejected_outside_running() {
        let registry = TaskRegistry::new();
        let id = registry.create("p").await;
        assert!(registry.update_progress(&id, "x", 1, 1).await.is_err());

        registry.begin(&id).await.unwrap();
        registry.fail(&id, "provider unreachable").await.unwrap();
        assert!(registry.update_progress(&id, "x", 1, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_terminal_task_is_immutable() {
        let registry = TaskRegistry::new();
        let id = registry.create("p").await;
        registry.begin(&id).await.unwrap();
        registry.fail(&id, "boom").await.unwrap();

        assert!(registry
            .complete(&id, GenerationResult::default())
            .await
            .is_err());
        assert!(registry.fail(&id, "again").await.is_err());

        let task = registry.get(&id).await.unwrap();
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let registry = TaskRegistry::new();
        assert_eq!(
            registry.get("missing").await.unwrap_err(),
            RegistryError::TaskNotFound("missing".to_string())
        );
        assert!(matches!(
            registry.begin("missing").await,
            Err(RegistryError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_twice_fails_second_time() {
        let registry = TaskRegistry::new();
        let id = registry.create("p").await;

        registry.delete(&id).await.unwrap();
        assert!(matches!(
            registry.delete(&id).await,
            Err(RegistryError::TaskNotFound(_))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let registry = TaskRegistry::new();
        let a = registry.create("a").await;
        let b = registry.create("b").await;
        let c = registry.create("c").await;
        registry.delete(&b).await.unwrap();

        let ids: Vec<String> = registry
            .list()
            .await
            .into_iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let registry = TaskRegistry::new();
        let id = registry.create("p").await;
        let before = registry.get(&id).await.unwrap();

        registry.begin(&id).await.unwrap();
        assert_eq!(before.status, TaskStatus::Queued);
        assert_eq!(
            registry.get(&id).await.unwrap().status,
            TaskStatus::Running
        );
    }

    #[tokio::test]
    async fn test_handle_targets_one_task() {
        let registry = Arc::new(TaskRegistry::new());
        let mine = registry.create("mine").await;
        let other = registry.create("other").await;

        let handle = registry.handle(&mine).await.unwrap();
        handle.begin().await.unwrap();
        handle.update_progress("step", 1, 2).await.unwrap();

        assert_eq!(handle.snapshot().await.unwrap().status, TaskStatus::Running);
        assert_eq!(
            registry.get(&other).await.unwrap().status,
            TaskStatus::Queued
        );
        assert!(registry.handle("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_readers_never_see_partial_outcome() {
        let registry = Arc::new(TaskRegistry::new());
        let ids: Vec<String> = {
            let mut ids = Vec::new();
            for i in 0..16 {
                ids.push(registry.create(format!("prompt {}", i)).await);
            }
            ids
        };

        let writer = {
            let registry = Arc::clone(&registry);
            let ids = ids.clone();
            tokio::spawn(async move {
                for (i, id) in ids.iter().enumerate() {
                    registry.begin(id).await.unwrap();
                    if i % 2 == 0 {
                        registry
                            .complete(id, GenerationResult::default())
                            .await
                            .unwrap();
                    } else {
                        registry.fail(id, "boom").await.unwrap();
                    }
                }
            })
        };

        let reader = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for _ in 0..64 {
                    for task in registry.list().await {
                        assert!(task.outcome_consistent());
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
    }
}
