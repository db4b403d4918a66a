use crate::decompose::{Phase, PhasePipeline, WorkflowEngine};
use crate::task_manager::MatchPolicy;
use maestro_core::{MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Decomposition pipeline used for one task type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub task_type: String,
    pub phases: Vec<Phase>,
}

/// Tunables for an [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on one agent's `handle_task`. `0` disables the bound.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
    /// How many subtasks of one workflow may be with agents at once.
    #[serde(default = "default_max_concurrent_dispatches")]
    pub max_concurrent_dispatches: usize,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    /// Per-type pipelines; other types use the default four-phase pipeline.
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

fn default_dispatch_timeout_ms() -> u64 {
    300_000
}

fn default_max_concurrent_dispatches() -> usize {
    4
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            max_concurrent_dispatches: default_max_concurrent_dispatches(),
            match_policy: MatchPolicy::default(),
            pipelines: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(source: &str) -> MaestroResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| MaestroError::Config(format!("invalid orchestrator config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        (self.dispatch_timeout_ms > 0).then(|| Duration::from_millis(self.dispatch_timeout_ms))
    }

    pub fn validate(&self) -> MaestroResult<()> {
        if self.max_concurrent_dispatches == 0 {
            return Err(MaestroError::Config(
                "max_concurrent_dispatches must be at least 1".to_string(),
            ));
        }
        let mut types = HashSet::new();
        for pipeline in &self.pipelines {
            if !types.insert(pipeline.task_type.as_str()) {
                return Err(MaestroError::Config(format!(
                    "more than one pipeline configured for task type '{}'",
                    pipeline.task_type
                )));
            }
            PhasePipeline::new(pipeline.task_type.to_lowercase(), pipeline.phases.clone())?;
        }
        Ok(())
    }

    /// Build a [`WorkflowEngine`] with one [`PhasePipeline`] per configured type.
    pub fn workflow_engine(&self) -> MaestroResult<WorkflowEngine> {
        let mut engine = WorkflowEngine::new();
        for pipeline in &self.pipelines {
            let strategy =
                PhasePipeline::new(pipeline.task_type.to_lowercase(), pipeline.phases.clone())?;
            engine.register_strategy(pipeline.task_type.clone(), Arc::new(strategy));
        }
        Ok(engine)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::Task;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.dispatch_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.max_concurrent_dispatches, 4);
        assert_eq!(config.match_policy, MatchPolicy::Substring);
        assert!(config.pipelines.is_empty());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config.dispatch_timeout_ms, 300_000);
    }

    #[test]
    fn test_zero_timeout_disables_bound() {
        let config = OrchestratorConfig::from_toml_str("dispatch_timeout_ms = 0").unwrap();
        assert!(config.dispatch_timeout().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            dispatch_timeout_ms = 1500
            max_concurrent_dispatches = 2
            match_policy = "exact"

            [[pipelines]]
            task_type = "BUGFIX"

            [[pipelines.phases]]
            suffix = "triage"
            task_type = "PLANNING"
            description = "Triage"

            [[pipelines.phases]]
            suffix = "fix"
            task_type = "CODING"
            description = "Fix"
            depends_on = ["triage"]
            "#,
        )
        .unwrap();
        assert_eq!(config.match_policy, MatchPolicy::Exact);
        assert_eq!(config.dispatch_timeout(), Some(Duration::from_millis(1500)));

        let engine = config.workflow_engine().unwrap();
        let subtasks = engine
            .decompose_tasks(&Task::new("b7", "BUGFIX", "crash on save"))
            .unwrap();
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[1].id, "b7-fix");
        assert_eq!(subtasks[1].dependencies, vec!["b7-triage"]);

        // Other types still get the default pipeline.
        let feature = engine
            .decompose_tasks(&Task::new("f1", "FEATURE", "export"))
            .unwrap();
        assert_eq!(feature.len(), 4);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = OrchestratorConfig::from_toml_str("max_concurrent_dispatches = 0").unwrap_err();
        assert!(matches!(err, MaestroError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(OrchestratorConfig::from_toml_str("match_policy = \"fuzzy\"").is_err());
    }

    #[test]
    fn test_rejects_duplicate_pipeline_types() {
        let source = r#"
            [[pipelines]]
            task_type = "DOCS"
            phases = [{ suffix = "draft", task_type = "WRITING", description = "Draft" }]

            [[pipelines]]
            task_type = "DOCS"
            phases = [{ suffix = "edit", task_type = "REVIEW", description = "Edit" }]
        "#;
        let err = OrchestratorConfig::from_toml_str(source).unwrap_err();
        assert!(err.to_string().contains("DOCS"));
    }

    #[test]
    fn test_rejects_invalid_pipeline() {
        let source = r#"
            [[pipelines]]
            task_type = "DOCS"
            phases = [{ suffix = "edit", task_type = "REVIEW", description = "Edit", depends_on = ["draft"] }]
        "#;
        let err = OrchestratorConfig::from_toml_str(source).unwrap_err();
        assert!(err.to_string().contains("not an earlier phase"));
    }
}
