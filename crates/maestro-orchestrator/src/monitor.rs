use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What an agent is doing from the orchestrator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Working,
    Error,
}

/// Counters accumulated per agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_handled: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub duration_ms: u64,
}

impl AgentMetrics {
    fn absorb(&mut self, other: &AgentMetrics) {
        self.tasks_handled += other.tasks_handled;
        self.errors += other.errors;
        self.timeouts += other.timeouts;
        self.duration_ms += other.duration_ms;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,
    pub current_task: Option<String>,
    pub status: WorkerStatus,
    pub metrics: AgentMetrics,
}

impl AgentState {
    fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            current_task: None,
            status: WorkerStatus::Idle,
            metrics: AgentMetrics::default(),
        }
    }
}

/// Tracks dispatch state and metrics for every agent an orchestrator has used.
///
/// Entries are created on first sight of an agent id and kept after the agent
/// is removed from the registry, so counters survive re-registration.
#[derive(Clone)]
pub struct AgentMonitor {
    states: Arc<RwLock<HashMap<String, AgentState>>>,
}

impl AgentMonitor {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Mark an agent as working on a task.
    pub async fn start_task(&self, agent_id: &str, task_id: &str) {
        let mut states = self.states.write().await;
        let state = states
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentState::new(agent_id));
        state.current_task = Some(task_id.to_string());
        state.status = WorkerStatus::Working;
    }

    /// Mark a dispatch as successfully handled.
    pub async fn finish_task(&self, agent_id: &str) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(agent_id) {
            state.current_task = None;
            state.status = WorkerStatus::Idle;
            state.metrics.tasks_handled += 1;
        }
    }

    /// Record a failed dispatch.
    pub async fn record_error(&self, agent_id: &str) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(agent_id) {
            state.current_task = None;
            state.metrics.errors += 1;
            state.status = WorkerStatus::Error;
        }
    }

    /// Record a dispatch that exceeded its time bound. Counts as an error too.
    pub async fn record_timeout(&self, agent_id: &str) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(agent_id) {
            state.current_task = None;
            state.metrics.timeouts += 1;
            state.metrics.errors += 1;
            state.status = WorkerStatus::Error;
        }
    }

    pub async fn record_duration(&self, agent_id: &str, duration_ms: u64) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(agent_id) {
            state.metrics.duration_ms += duration_ms;
        }
    }

    /// All tracked agents, sorted by id.
    pub async fn snapshot(&self) -> Vec<AgentState> {
        let states = self.states.read().await;
        let mut snapshot: Vec<AgentState> = states.values().cloned().collect();
        snapshot.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        snapshot
    }

    pub async fn get_state(&self, agent_id: &str) -> Option<AgentState> {
        let states = self.states.read().await;
        states.get(agent_id).cloned()
    }

    /// Get aggregate metrics across all agents.
    pub async fn aggregate_metrics(&self) -> AgentMetrics {
        let states = self.states.read().await;
        let mut total = AgentMetrics::default();
        for state in states.values() {
            total.absorb(&state.metrics);
        }
        total
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let states = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        serde_json::json!({
            "agents": states,
            "aggregate": aggregate,
        })
    }
}

impl Default for AgentMonitor {
    fn default() -> Self {
        Self::new()
    }
}
