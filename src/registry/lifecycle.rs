use std::collections::HashMap;

use chrono::Utc;

use crate::error::RegistryError;
use crate::registry::entry::{GenerationTask, TaskStatus};

/// Manages generation task state transitions.
///
/// Enforces the task state machine; terminal states have no outgoing edges.
pub struct LifecycleManager {
    valid_transitions: HashMap<TaskStatus, Vec<TaskStatus>>,
}

impl LifecycleManager {
    /// Create a lifecycle manager with the standard transition rules.
    ///
    /// Valid transitions:
    /// - Queued -> Running (run begins)
    /// - Running -> Completed (result assembled)
    /// - Running -> Failed (hard failure)
    pub fn new() -> Self {
        let mut valid_transitions = HashMap::new();

        valid_transitions.insert(TaskStatus::Queued, vec![TaskStatus::Running]);
        valid_transitions.insert(
            TaskStatus::Running,
            vec![TaskStatus::Completed, TaskStatus::Failed],
        );
        valid_transitions.insert(TaskStatus::Completed, vec![]);
        valid_transitions.insert(TaskStatus::Failed, vec![]);

        Self { valid_transitions }
    }

    /// Check if a transition between two statuses is allowed.
    pub fn can_transition(&self, from: TaskStatus, to: TaskStatus) -> bool {
        self.valid_transitions
            .get(&from)
            .map(|targets| targets.contains(&to))
            .unwrap_or(false)
    }

    /// Move `task` to `new_status`, stamping `completed_at` on terminal states.
    ///
    /// # Errors
    /// Returns `InvalidTransition` if the edge is not part of the state machine.
    pub fn transition(
        &self,
        task: &mut GenerationTask,
        new_status: TaskStatus,
    ) -> Result<(), RegistryError> {
        let current_status = task.status;

        if !self.can_transition(current_status, new_status) {
            return Err(RegistryError::InvalidTransition {
                from: current_status.to_string(),
                to: new_status.to_string(),
                reason: format!(
                    "task {} cannot move from {} to {}",
                    task.task_id, current_status, new_status
                ),
            });
        }

        task.status = new_status;
        if new_status.is_terminal() {
            task.completed_at = Some(Utc::now());
        }

        tracing::debug!(
            task_id = %task.task_id,
            from = %current_status,
            to = %new_status,
            "Task transitioned"
        );

        Ok(())
    }

    /// Ensure `task` is currently in `expected`, without changing it.
    pub fn require(
        &self,
        task: &GenerationTask,
        expected: TaskStatus,
        operation: &str,
    ) -> Result<(), RegistryError> {
        if task.status == expected {
            return Ok(());
        }
        Err(RegistryError::InvalidTransition {
            from: task.status.to_string(),
            to: task.status.to_string(),
            reason: format!("{} requires status {}", operation, expected),
        })
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
