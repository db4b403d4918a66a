//! Minimal agent used by unit tests.

use crate::agent::Agent;
use crate::types::{AgentStatus, AgentType, Task, TaskResult};
use async_trait::async_trait;
use maestro_core::MaestroResult;
use std::sync::Arc;

pub(crate) struct StubAgent {
    id: String,
    status: AgentStatus,
    capabilities: Vec<String>,
}

impl StubAgent {
    pub(crate) fn with_status(
        id: &str,
        capabilities: &[&str],
        status: AgentStatus,
    ) -> Arc<dyn Agent> {
        Arc::new(Self {
            id: id.to_string(),
            status,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        })
    }

    pub(crate) fn arc(id: &str, capabilities: &[&str]) -> Arc<dyn Agent> {
        Self::with_status(id, capabilities, AgentStatus::Idle)
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Coder
    }

    fn status(&self) -> AgentStatus {
        self.status
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    async fn handle_task(&self, task: &Task) -> MaestroResult<TaskResult> {
        Ok(TaskResult::completed(&task.id, serde_json::Value::Null))
    }
}
