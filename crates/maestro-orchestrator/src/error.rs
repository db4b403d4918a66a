use maestro_core::MaestroError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Why a workflow ended in `FAILED`.
///
/// Carried inside [`WorkflowResult`](crate::WorkflowResult); never returned
/// as an `Err` from `execute_workflow`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// The main task was malformed, or the strategy could not split it.
    #[error("cannot decompose task '{task_id}': {cause}")]
    Decomposition {
        task_id: String,
        #[source]
        cause: Arc<MaestroError>,
    },

    /// A subtask depends on an id outside the workflow, or dependencies form a cycle.
    #[error("invalid dependency graph: {reason}")]
    InvalidGraph { reason: String },

    /// No idle agent has a capability matching the subtask's type.
    #[error("No suitable agent found for task: {task_id} (type {task_type})")]
    Unassigned { task_id: String, task_type: String },

    /// The agent returned an error, or a result with a populated error.
    #[error("agent '{agent_id}' failed task {task_id}: {cause}")]
    AgentFailed {
        task_id: String,
        agent_id: String,
        #[source]
        cause: Arc<MaestroError>,
    },

    /// The agent did not answer within the dispatch bound.
    #[error("agent '{agent_id}' timed out on task {task_id} after {timeout_ms}ms")]
    Timeout {
        task_id: String,
        agent_id: String,
        timeout_ms: u64,
    },

    /// A subtask id is already claimed by a workflow that is still running.
    #[error("task {task_id} already belongs to a running workflow")]
    Conflict { task_id: String },

    /// Subtasks that can never run because a dependency did not complete.
    #[error("tasks blocked by dependencies that did not complete: {}", .task_ids.join(", "))]
    Blocked { task_ids: Vec<String> },
}

impl WorkflowError {
    /// Stable snake_case tag for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Decomposition { .. } => "decomposition",
            WorkflowError::InvalidGraph { .. } => "invalid_graph",
            WorkflowError::Unassigned { .. } => "unassigned",
            WorkflowError::AgentFailed { .. } => "agent_failed",
            WorkflowError::Timeout { .. } => "timeout",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::Blocked { .. } => "blocked",
        }
    }

    /// The task the failure is attributed to, when there is a single one.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            WorkflowError::Decomposition { task_id, .. }
            | WorkflowError::Unassigned { task_id, .. }
            | WorkflowError::AgentFailed { task_id, .. }
            | WorkflowError::Timeout { task_id, .. }
            | WorkflowError::Conflict { task_id } => Some(task_id),
            WorkflowError::InvalidGraph { .. } => None,
            WorkflowError::Blocked { task_ids } => task_ids.first().map(String::as_str),
        }
    }
}

impl Serialize for WorkflowError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("WorkflowError", 3)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("task_id", &self.task_id())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
