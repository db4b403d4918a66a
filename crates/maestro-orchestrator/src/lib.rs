//! Multi-agent workflow orchestration: decomposition, agent matching and
//! dependency-ordered dispatch.
//!
//! A top-level [`Task`] is split into subtasks by a [`DecompositionStrategy`],
//! each subtask is matched to an idle [`Agent`] whose capability tags fit its
//! type, and subtasks are dispatched only once every dependency has
//! completed. The outcome is always a [`WorkflowResult`].
//!
//! # Main types
//!
//! - [`Orchestrator`] — Owns the agent pool and runs workflows.
//! - [`WorkflowEngine`] — Picks a decomposition strategy by task type.
//! - [`TaskManager`] — Matches tasks to agents and tracks their status.
//! - [`TaskGraph`] — Readiness tracking over one workflow's subtasks.
//! - [`AgentRegistry`] — Registered agents with atomic reservation.
//! - [`AgentMonitor`] — Per-agent dispatch metrics.

/// The capability contract workers implement.
pub mod agent;
/// Orchestrator configuration.
pub mod config;
/// Decomposition strategies and the workflow engine.
pub mod decompose;
/// Workflow execution.
pub mod engine;
/// Workflow failure taxonomy.
pub mod error;
/// Agent state and metrics monitoring.
pub mod monitor;
/// Agent pool and leases.
pub mod registry;
/// Dependency graph of one workflow.
pub mod task_graph;
/// Task-to-agent matching and status tracking.
pub mod task_manager;
/// Shared orchestration types (Task, TaskResult, WorkflowResult, etc.).
pub mod types;

#[cfg(test)]
mod testing;

pub use agent::Agent;
pub use config::{OrchestratorConfig, PipelineConfig};
pub use decompose::{
    default_phases, validate_main_task, DecompositionStrategy, Phase, PhasePipeline,
    WorkflowEngine,
};
pub use engine::Orchestrator;
pub use error::WorkflowError;
pub use monitor::{AgentMetrics, AgentMonitor, AgentState, WorkerStatus};
pub use registry::{AgentHandle, AgentLease, AgentRegistry, Unavailable};
pub use task_graph::TaskGraph;
pub use task_manager::{Assignment, MatchPolicy, TaskManager};
pub use types::{
    AgentStatus, AgentType, Task, TaskResult, TaskStatus, WorkflowResult, WorkflowStatus,
};
