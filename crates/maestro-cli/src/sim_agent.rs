//! Agents that pretend to work, for trying pipelines out from the command line.

use crate::config::AgentConfig;
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult, Message};
use maestro_orchestrator::{Agent, AgentStatus, AgentType, Task, TaskResult};
use std::time::Duration;
use tracing::debug;

pub struct SimulatedAgent {
    id: String,
    agent_type: AgentType,
    capabilities: Vec<String>,
    latency: Duration,
    fail_types: Vec<String>,
}

impl SimulatedAgent {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            id: config.id.clone(),
            agent_type: config.agent_type,
            capabilities: config.capabilities.clone(),
            latency: Duration::from_millis(config.latency_ms),
            fail_types: config.fail_types.clone(),
        }
    }
}

#[async_trait]
impl Agent for SimulatedAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    fn status(&self) -> AgentStatus {
        AgentStatus::Idle
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    async fn handle_task(&self, task: &Task) -> MaestroResult<TaskResult> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_types.iter().any(|t| t == &task.task_type) {
            return Err(MaestroError::Agent(format!(
                "{} is configured to fail {} tasks",
                self.id, task.task_type
            )));
        }
        Ok(TaskResult::completed(
            &task.id,
            serde_json::json!({
                "agent": self.id,
                "summary": format!("{} done", task.description),
            }),
        ))
    }

    async fn communicate(&self, message: &Message) -> MaestroResult<()> {
        debug!(
            agent_id = %self.id,
            from = %message.from,
            content = %message.content,
            "Simulated agent received message"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(fail_types: &[&str]) -> AgentConfig {
        AgentConfig {
            id: "coder-1".to_string(),
            agent_type: AgentType::Coder,
            capabilities: vec!["CODING".to_string()],
            latency_ms: 0,
            fail_types: fail_types.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_completes_task() {
        let agent = SimulatedAgent::from_config(&config(&[]));
        let task = Task::new("t1-implementation", "CODING", "Implement: x");
        let result = agent.handle_task(&task).await.unwrap();
        assert_eq!(result.task_id, "t1-implementation");
        assert_eq!(result.result["agent"], "coder-1");
        assert_eq!(result.result["summary"], "Implement: x done");
    }

    #[tokio::test]
    async fn test_fails_configured_types() {
        let agent = SimulatedAgent::from_config(&config(&["CODING"]));
        let task = Task::new("t1-implementation", "CODING", "Implement: x");
        let err = agent.handle_task(&task).await.unwrap_err();
        assert!(err.to_string().contains("configured to fail CODING"));
    }
}
