use crate::types::{Task, TaskStatus};
use maestro_core::{MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Splits a top-level task into subtasks with explicit dependency ids.
pub trait DecompositionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the subtasks for `main`. Implementations may assume the main
    /// task has already passed [`validate_main_task`].
    fn decompose(&self, main: &Task) -> MaestroResult<Vec<Task>>;
}

/// One step of a [`PhasePipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Appended to the main id: `<mainId>-<suffix>`.
    pub suffix: String,
    /// Type tag of the generated subtask.
    pub task_type: String,
    /// Prefix of the generated description: `"<description>: <main description>"`.
    pub description: String,
    /// Suffixes of phases this one waits for.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Phase {
    pub fn new(suffix: &str, task_type: &str, description: &str, depends_on: &[&str]) -> Self {
        Self {
            suffix: suffix.to_string(),
            task_type: task_type.to_string(),
            description: description.to_string(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// The planning → implementation → {review, testing} pipeline.
pub fn default_phases() -> Vec<Phase> {
    vec![
        Phase::new("planning", "PLANNING", "Create plan for", &[]),
        Phase::new("implementation", "CODING", "Implement", &["planning"]),
        Phase::new(
            "review",
            "REVIEW",
            "Review implementation of",
            &["implementation"],
        ),
        Phase::new(
            "testing",
            "TESTING",
            "Test implementation of",
            &["implementation"],
        ),
    ]
}

/// A fixed sequence of phases, each becoming one subtask.
///
/// Subtasks inherit the main task's priority, start `PENDING`, and record the
/// main id under the `parent_task` metadata key.
#[derive(Debug, Clone)]
pub struct PhasePipeline {
    name: String,
    phases: Vec<Phase>,
}

impl PhasePipeline {
    /// Validates that the pipeline is non-empty, suffixes are unique, and every
    /// `depends_on` names an earlier phase.
    pub fn new(name: impl Into<String>, phases: Vec<Phase>) -> MaestroResult<Self> {
        let name = name.into();
        if phases.is_empty() {
            return Err(MaestroError::Config(format!(
                "pipeline '{name}' has no phases"
            )));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for phase in &phases {
            if phase.suffix.trim().is_empty() {
                return Err(MaestroError::Config(format!(
                    "pipeline '{name}' has a phase with an empty suffix"
                )));
            }
            if let Some(dep) = phase.depends_on.iter().find(|d| !seen.contains(d.as_str())) {
                return Err(MaestroError::Config(format!(
                    "pipeline '{name}': phase '{}' depends on '{dep}', which is not an earlier phase",
                    phase.suffix
                )));
            }
            if !seen.insert(phase.suffix.as_str()) {
                return Err(MaestroError::Config(format!(
                    "pipeline '{name}' repeats phase suffix '{}'",
                    phase.suffix
                )));
            }
        }

        Ok(Self { name, phases })
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }
}

impl Default for PhasePipeline {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            phases: default_phases(),
        }
    }
}

impl DecompositionStrategy for PhasePipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn decompose(&self, main: &Task) -> MaestroResult<Vec<Task>> {
        let subtask_id = |suffix: &str| format!("{}-{}", main.id, suffix);

        Ok(self
            .phases
            .iter()
            .map(|phase| Task {
                id: subtask_id(phase.suffix.as_str()),
                task_type: phase.task_type.clone(),
                description: format!("{}: {}", phase.description, main.description),
                priority: main.priority,
                status: TaskStatus::Pending,
                assigned_to: None,
                dependencies: phase.depends_on.iter().map(|d| subtask_id(d.as_str())).collect(),
                metadata: HashMap::from([(
                    "parent_task".to_string(),
                    serde_json::Value::String(main.id.clone()),
                )]),
            })
            .collect())
    }
}

/// Reject main tasks that cannot be decomposed.
pub fn validate_main_task(task: &Task) -> MaestroResult<()> {
    if task.id.trim().is_empty() {
        return Err(MaestroError::InvalidArgument(
            "task id must not be empty".to_string(),
        ));
    }
    if task.description.trim().is_empty() {
        return Err(MaestroError::InvalidArgument(format!(
            "task '{}' has an empty description",
            task.id
        )));
    }
    Ok(())
}

/// Picks a decomposition strategy by task type and applies it.
///
/// Types without a registered strategy use the fallback, which defaults to
/// [`PhasePipeline::default`].
pub struct WorkflowEngine {
    strategies: HashMap<String, Arc<dyn DecompositionStrategy>>,
    fallback: Arc<dyn DecompositionStrategy>,
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
            fallback: Arc::new(PhasePipeline::default()),
        }
    }

    pub fn with_fallback(mut self, strategy: Arc<dyn DecompositionStrategy>) -> Self {
        self.fallback = strategy;
        self
    }

    /// Route `task_type` to `strategy`. Returns the strategy it replaced.
    pub fn register_strategy(
        &mut self,
        task_type: impl Into<String>,
        strategy: Arc<dyn DecompositionStrategy>,
    ) -> Option<Arc<dyn DecompositionStrategy>> {
        self.strategies.insert(task_type.into(), strategy)
    }

    pub fn strategy_for(&self, task_type: &str) -> &Arc<dyn DecompositionStrategy> {
        self.strategies.get(task_type).unwrap_or(&self.fallback)
    }

    /// Task types with a dedicated strategy, sorted.
    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn decompose_tasks(&self, main: &Task) -> MaestroResult<Vec<Task>> {
        validate_main_task(main)?;
        let strategy = self.strategy_for(&main.task_type);
        let subtasks = strategy.decompose(main)?;
        if subtasks.is_empty() {
            return Err(MaestroError::Orchestrator(format!(
                "strategy '{}' produced no subtasks for '{}'",
                strategy.name(),
                main.id
            )));
        }
        tracing::debug!(
            task_id = %main.id,
            strategy = %strategy.name(),
            subtask_count = subtasks.len(),
            "Task decomposed"
        );
        Ok(subtasks)
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}
