//! The `maestro.toml` file: orchestrator tunables plus the simulated agents
//! to register before a run.

use maestro_core::{MaestroError, MaestroResult};
use maestro_orchestrator::{AgentType, OrchestratorConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct MaestroConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

/// One simulated agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub agent_type: AgentType,
    pub capabilities: Vec<String>,
    /// Simulated work time per task.
    #[serde(default)]
    pub latency_ms: u64,
    /// Task types this agent reports an error for.
    #[serde(default)]
    pub fail_types: Vec<String>,
}

impl MaestroConfig {
    pub fn validate(&self) -> MaestroResult<()> {
        self.orchestrator.validate()?;
        let mut ids = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(MaestroError::Config("agent id must not be empty".to_string()));
            }
            if !ids.insert(agent.id.as_str()) {
                return Err(MaestroError::Config(format!(
                    "agent '{}' is declared more than once",
                    agent.id
                )));
            }
            if agent.capabilities.is_empty() {
                tracing::warn!(
                    agent_id = %agent.id,
                    "Agent declares no capabilities and will never be assigned"
                );
            }
        }
        Ok(())
    }
}

/// Parse and validate a TOML document.
pub fn parse_config(content: &str, origin: &Path) -> MaestroResult<MaestroConfig> {
    let config: MaestroConfig = toml::from_str(content).map_err(|e| {
        MaestroError::Config(format!(
            "Failed to parse config '{}': {}",
            origin.display(),
            e
        ))
    })?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a config file.
pub async fn load_config(path: &Path) -> MaestroResult<MaestroConfig> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        MaestroError::Config(format!(
            "Failed to read config '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_config(&content, path)
}
