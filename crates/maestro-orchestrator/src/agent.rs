use crate::types::{AgentStatus, AgentType, Task, TaskResult};
use async_trait::async_trait;
use maestro_core::{MaestroResult, Message};

/// The capability contract every worker agent exposes to the orchestrator.
///
/// The orchestrator never depends on a concrete worker; anything that can
/// report its identity, status and capability tags and handle a [`Task`] can
/// be registered.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique id within one orchestrator.
    fn id(&self) -> &str;

    fn agent_type(&self) -> AgentType;

    /// Current self-reported status. Only `Idle` agents receive work.
    fn status(&self) -> AgentStatus;

    /// Capability tags matched against task types.
    fn capabilities(&self) -> &[String];

    /// Perform the task and report the outcome.
    async fn handle_task(&self, task: &Task) -> MaestroResult<TaskResult>;

    /// Receive an out-of-band notice. The default implementation drops it.
    async fn communicate(&self, message: &Message) -> MaestroResult<()> {
        tracing::debug!(
            agent_id = %self.id(),
            message_type = ?message.message_type,
            "Agent ignored message"
        );
        Ok(())
    }
}
