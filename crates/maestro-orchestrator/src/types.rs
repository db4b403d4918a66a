use crate::error::WorkflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the task will not change status again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A unit of work.
///
/// `task_type` is a free-form tag (`"PLANNING"`, `"CODING"`, `"FEATURE"`...)
/// matched against agent capabilities. Lower `priority` values are dispatched
/// first when several tasks are ready at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    pub priority: i32,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            description: description.into(),
            priority: 0,
            status: TaskStatus::Pending,
            assigned_to: None,
            dependencies: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// A task is ready when it is still pending and every dependency has completed.
    pub fn is_ready(&self, completed_ids: &HashSet<String>) -> bool {
        self.status == TaskStatus::Pending
            && self
                .dependencies
                .iter()
                .all(|dep| completed_ids.contains(dep))
    }
}

/// Kind of worker agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentType {
    Planner,
    Coder,
    Reviewer,
    Tester,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentType::Planner => write!(f, "PLANNER"),
            AgentType::Coder => write!(f, "CODER"),
            AgentType::Reviewer => write!(f, "REVIEWER"),
            AgentType::Tester => write!(f, "TESTER"),
        }
    }
}

/// Status an agent reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Idle,
    Busy,
    Error,
}

/// Outcome an agent reports after handling a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: serde_json::Value,
    /// A populated error fails the whole workflow regardless of `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn completed(task_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Completed,
            result,
            error: None,
        }
    }

    pub fn failed(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Failed,
            result: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Lifecycle of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

/// Aggregate outcome of one top-level task.
///
/// `tasks` holds the main task first, followed by the generated subtasks in
/// decomposition order. Members are only ever appended; their status and
/// assignment are refreshed as the run progresses.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub id: String,
    pub status: WorkflowStatus,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkflowError>,
    /// Result payloads reported by agents, keyed by task id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowResult {
    pub fn new(id: impl Into<String>, main_task: Task) -> Self {
        Self {
            id: id.into(),
            status: WorkflowStatus::Pending,
            tasks: vec![main_task],
            error: None,
            outputs: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// PENDING → RUNNING. Returns false if the workflow was not pending.
    pub fn start(&mut self) -> bool {
        if self.status != WorkflowStatus::Pending {
            return false;
        }
        self.status = WorkflowStatus::Running;
        true
    }

    pub fn append_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Replace the member with the same id. Unknown ids are ignored so the
    /// member list never grows outside of [`append_tasks`](Self::append_tasks).
    pub fn update_task(&mut self, task: &Task) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => {
                *slot = task.clone();
                true
            }
            None => false,
        }
    }

    pub fn main_task(&self) -> Option<&Task> {
        self.tasks.first()
    }

    /// Transition to COMPLETED. No-op once terminal.
    pub fn complete(&mut self) -> bool {
        self.finish(WorkflowStatus::Completed, TaskStatus::Completed)
    }

    /// Transition to FAILED carrying `error`. No-op once terminal.
    pub fn fail(&mut self, error: WorkflowError) -> bool {
        if !self.finish(WorkflowStatus::Failed, TaskStatus::Failed) {
            return false;
        }
        self.error = Some(error);
        true
    }

    fn finish(&mut self, status: WorkflowStatus, main_status: TaskStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        if let Some(main) = self.tasks.first_mut() {
            main.status = main_status;
        }
        true
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}
