use crate::agent::Agent;
use crate::config::OrchestratorConfig;
use crate::decompose::WorkflowEngine;
use crate::error::WorkflowError;
use crate::monitor::AgentMonitor;
use crate::registry::{AgentLease, AgentRegistry};
use crate::task_graph::TaskGraph;
use crate::task_manager::{Assignment, TaskManager};
use crate::types::{Task, TaskResult, TaskStatus, WorkflowResult};
use futures_util::stream::{FuturesUnordered, StreamExt};
use maestro_core::{MaestroError, MaestroResult, Message};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Sender id used on messages the orchestrator emits.
const ORCHESTRATOR_ID: &str = "orchestrator";

/// What came back from one dispatch.
enum Reply {
    Handled(MaestroResult<TaskResult>),
    TimedOut(Duration),
}

struct DispatchOutcome {
    task: Task,
    agent_id: String,
    reply: Reply,
}

enum Wake {
    Finished(Option<DispatchOutcome>),
    Released,
}

/// The multi-agent workflow orchestrator.
/// Implements the decompose → dispatch → aggregate pattern.
///
/// One orchestrator owns its agent pool and task manager; any number of
/// workflows may run through it concurrently.
pub struct Orchestrator {
    registry: AgentRegistry,
    tasks: Mutex<TaskManager>,
    engine: WorkflowEngine,
    monitor: Arc<AgentMonitor>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator with the default configuration and pipeline.
    pub fn new() -> Self {
        Self::build(OrchestratorConfig::default(), WorkflowEngine::new())
    }

    /// Create from a configuration, registering its pipelines.
    pub fn from_config(config: OrchestratorConfig) -> MaestroResult<Self> {
        config.validate()?;
        let engine = config.workflow_engine()?;
        Ok(Self::build(config, engine))
    }

    fn build(config: OrchestratorConfig, engine: WorkflowEngine) -> Self {
        Self {
            registry: AgentRegistry::new(),
            tasks: Mutex::new(TaskManager::with_policy(config.match_policy)),
            engine,
            monitor: Arc::new(AgentMonitor::new()),
            config,
        }
    }

    /// Replace the decomposition engine.
    pub fn with_workflow_engine(mut self, engine: WorkflowEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Insert or overwrite an agent by id. Running workflows keep the pool
    /// they started with.
    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        let agent_id = agent.id().to_string();
        let agent_type = agent.agent_type();
        let replaced = self.registry.register(agent).is_some();
        info!(agent_id = %agent_id, agent_type = %agent_type, replaced, "Agent registered");
    }

    /// Remove an agent by id. Returns whether it was registered.
    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let removed = self.registry.remove(agent_id).is_some();
        if removed {
            info!(agent_id = %agent_id, "Agent removed");
        }
        removed
    }

    /// Registered agent ids in registration order.
    pub fn agent_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn monitor(&self) -> &Arc<AgentMonitor> {
        &self.monitor
    }

    pub fn task_manager(&self) -> &Mutex<TaskManager> {
        &self.tasks
    }

    pub fn workflow_engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Look up a subtask of a workflow that is still running.
    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.tasks.lock().get_task(task_id).cloned()
    }

    /// Run one top-level task to a terminal state.
    ///
    /// Never returns an error: every failure is carried in the returned
    /// result's `error` with status `FAILED`.
    pub async fn execute_workflow(&self, main: Task) -> WorkflowResult {
        let start = Instant::now();
        let workflow_id = format!("workflow-{}-{}", main.id, Uuid::new_v4().simple());
        let mut workflow = WorkflowResult::new(workflow_id, main.clone());
        workflow.start();

        info!(
            workflow_id = %workflow.id,
            task_id = %main.id,
            task_type = %main.task_type,
            "Workflow started"
        );

        let subtasks = match self.engine.decompose_tasks(&main) {
            Ok(subtasks) => subtasks,
            Err(e) => {
                let err = WorkflowError::Decomposition {
                    task_id: main.id.clone(),
                    cause: Arc::new(e),
                };
                return self.finish(workflow, Err(err), start);
            }
        };
        workflow.append_tasks(subtasks.iter().cloned());

        let claimed = self.tasks.lock().claim(&subtasks);
        if let Err(task_id) = claimed {
            let err = WorkflowError::Conflict { task_id };
            return self.finish(workflow, Err(err), start);
        }

        let outcome = match TaskGraph::build(&subtasks) {
            Ok(graph) => self.run_graph(&mut workflow, graph).await,
            Err(e) => Err(e),
        };

        self.tasks
            .lock()
            .forget(subtasks.iter().map(|t| t.id.as_str()));

        self.finish(workflow, outcome, start)
    }

    /// Dispatch ready subtasks until the graph drains or something fails.
    ///
    /// After the first failure nothing new is dispatched; subtasks already
    /// with an agent run to completion and their statuses are recorded.
    async fn run_graph(
        &self,
        workflow: &mut WorkflowResult,
        mut graph: TaskGraph,
    ) -> Result<(), WorkflowError> {
        let candidates = self.registry.candidates();
        let mut released = self.registry.subscribe();
        let max_in_flight = self.config.max_concurrent_dispatches.max(1);
        let mut in_flight = FuturesUnordered::new();
        let mut failure: Option<WorkflowError> = None;

        loop {
            let mut waiting = false;

            if failure.is_none() {
                // Anything released from here on wakes us again.
                released.borrow_and_update();

                for task_id in graph.ready() {
                    if in_flight.len() >= max_in_flight {
                        break;
                    }
                    let Some(mut task) = workflow.task(&task_id).cloned() else {
                        continue;
                    };

                    let assignment = self.tasks.lock().assign_task(&mut task, &candidates);
                    match assignment {
                        Assignment::Assigned(lease) => {
                            graph.mark_dispatched(&task.id);
                            workflow.update_task(&task);
                            in_flight.push(self.dispatch(task, lease));
                        }
                        Assignment::Held => {
                            debug!(
                                workflow_id = %workflow.id,
                                task_id = %task.id,
                                "Capable agents are busy, waiting for a release"
                            );
                            waiting = true;
                        }
                        Assignment::NoCapableAgent => {
                            warn!(
                                workflow_id = %workflow.id,
                                task_id = %task.id,
                                task_type = %task.task_type,
                                "No suitable agent"
                            );
                            failure = Some(WorkflowError::Unassigned {
                                task_id: task.id.clone(),
                                task_type: task.task_type.clone(),
                            });
                            break;
                        }
                    }
                }
            }

            if in_flight.is_empty() && !(waiting && failure.is_none()) {
                break;
            }

            // The candidates hold the sender, so `changed` cannot fail here.
            let wake = tokio::select! {
                outcome = in_flight.next(), if !in_flight.is_empty() => Wake::Finished(outcome),
                _ = released.changed(), if waiting => Wake::Released,
            };

            match wake {
                Wake::Finished(Some(outcome)) => {
                    if let Err(e) = self.record_outcome(workflow, &mut graph, outcome).await {
                        failure.get_or_insert(e);
                    }
                }
                Wake::Finished(None) | Wake::Released => {}
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if !graph.is_done() {
            let mut task_ids = graph.blocked();
            if task_ids.is_empty() {
                task_ids = graph.pending_ids();
            }
            return Err(WorkflowError::Blocked { task_ids });
        }
        Ok(())
    }

    /// Hand one subtask to its leased agent and wait for the reply.
    ///
    /// The lease is released before this returns.
    async fn dispatch(&self, task: Task, lease: AgentLease) -> DispatchOutcome {
        let agent = Arc::clone(lease.agent());
        let agent_id = lease.id().to_string();

        self.monitor.start_task(&agent_id, &task.id).await;
        info!(task_id = %task.id, agent_id = %agent_id, "Dispatching task");

        let notice = Message::assignment(ORCHESTRATOR_ID, &agent_id, &task.id);
        if let Err(e) = agent.communicate(&notice).await {
            warn!(
                task_id = %task.id,
                agent_id = %agent_id,
                error = %e,
                "Assignment notice not delivered"
            );
        }

        let started = Instant::now();
        let reply = match self.config.dispatch_timeout() {
            Some(limit) => match tokio::time::timeout(limit, agent.handle_task(&task)).await {
                Ok(result) => Reply::Handled(result),
                Err(_) => Reply::TimedOut(limit),
            },
            None => Reply::Handled(agent.handle_task(&task).await),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.monitor.record_duration(&agent_id, elapsed_ms).await;

        drop(lease);
        DispatchOutcome {
            task,
            agent_id,
            reply,
        }
    }

    /// Forward a dispatch outcome to the task manager, graph, workflow and monitor.
    async fn record_outcome(
        &self,
        workflow: &mut WorkflowResult,
        graph: &mut TaskGraph,
        outcome: DispatchOutcome,
    ) -> Result<(), WorkflowError> {
        let DispatchOutcome {
            mut task,
            agent_id,
            reply,
        } = outcome;

        let (status, failure) = match reply {
            Reply::Handled(Ok(result)) => {
                if result.task_id != task.id {
                    warn!(
                        task_id = %task.id,
                        reported_task_id = %result.task_id,
                        agent_id = %agent_id,
                        "Agent reported a result for a different task id"
                    );
                }
                if !result.result.is_null() {
                    workflow.outputs.insert(task.id.clone(), result.result);
                }
                let failure = result.error.map(|message| WorkflowError::AgentFailed {
                    task_id: task.id.clone(),
                    agent_id: agent_id.clone(),
                    cause: Arc::new(MaestroError::Agent(message)),
                });
                (result.status, failure)
            }
            Reply::Handled(Err(e)) => {
                let failure = WorkflowError::AgentFailed {
                    task_id: task.id.clone(),
                    agent_id: agent_id.clone(),
                    cause: Arc::new(e),
                };
                (TaskStatus::Failed, Some(failure))
            }
            Reply::TimedOut(limit) => {
                let failure = WorkflowError::Timeout {
                    task_id: task.id.clone(),
                    agent_id: agent_id.clone(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                };
                (TaskStatus::Failed, Some(failure))
            }
        };

        self.tasks.lock().update_task_status(&task.id, status);
        task.status = status;
        workflow.update_task(&task);
        graph.mark_finished(&task.id, status);

        match &failure {
            Some(WorkflowError::Timeout { .. }) => {
                self.monitor.record_timeout(&agent_id).await;
                error!(task_id = %task.id, agent_id = %agent_id, "Task timed out");
            }
            Some(e) => {
                self.monitor.record_error(&agent_id).await;
                error!(task_id = %task.id, agent_id = %agent_id, error = %e, "Task failed");
            }
            None if status == TaskStatus::Completed => {
                self.monitor.finish_task(&agent_id).await;
                info!(task_id = %task.id, agent_id = %agent_id, "Task completed");
            }
            None => {
                self.monitor.record_error(&agent_id).await;
                warn!(
                    task_id = %task.id,
                    agent_id = %agent_id,
                    status = %status,
                    "Task finished without completing"
                );
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn finish(
        &self,
        mut workflow: WorkflowResult,
        outcome: Result<(), WorkflowError>,
        start: Instant,
    ) -> WorkflowResult {
        let duration_ms = start.elapsed().as_millis();
        match outcome {
            Ok(()) => {
                workflow.complete();
                info!(
                    workflow_id = %workflow.id,
                    duration_ms,
                    tasks = workflow.tasks.len(),
                    "Workflow completed"
                );
            }
            Err(e) => {
                error!(
                    workflow_id = %workflow.id,
                    kind = e.kind(),
                    error = %e,
                    duration_ms,
                    "Workflow failed"
                );
                workflow.fail(e);
            }
        }
        workflow
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.registry.ids())
            .field("config", &self.config)
            .finish()
    }
}
