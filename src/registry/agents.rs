//! Agent registry: caller identities and their lifecycle state.

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AgentryError;
use crate::types::{validate_identifier, AgentStatus, RegisteredAgent};

/// Thread-safe registry of agents permitted to execute tools.
///
/// Registration is idempotent per id: registering an existing agent id
/// replaces the whole record, including `registered_at`. Only `active`
/// agents pass the dispatch precondition; `inactive` and `suspended`
/// agents are rejected identically.
#[derive(Clone)]
pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<String, RegisteredAgent>>>,
}

impl AgentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register an agent, replacing any previous registration of the same id.
    ///
    /// Capabilities are trimmed before storage; an empty list or any
    /// entry that is blank after trimming fails with a validation error.
    /// The new record is always `active` with fresh timestamps.
    pub async fn register(
        &self,
        agent_id: &str,
        capabilities: Vec<String>,
        metadata: Map<String, Value>,
    ) -> Result<RegisteredAgent, AgentryError> {
        validate_identifier(agent_id, "Agent id")?;

        if capabilities.is_empty() {
            return Err(AgentryError::validation_error(
                "Capabilities must be a non-empty list",
            ));
        }
        let mut trimmed = Vec::with_capacity(capabilities.len());
        for capability in &capabilities {
            let capability = capability.trim();
            if capability.is_empty() {
                return Err(AgentryError::validation_error(
                    "Capabilities must not contain empty entries",
                ));
            }
            trimmed.push(capability.to_string());
        }

        let now = Utc::now();
        let agent = RegisteredAgent {
            agent_id: agent_id.to_string(),
            capabilities: trimmed,
            status: AgentStatus::Active,
            registered_at: now,
            last_seen: now,
            metadata,
        };

        let mut agents = self.agents.write().await;
        agents.insert(agent_id.to_string(), agent.clone());
        drop(agents);

        tracing::info!(
            "Registered agent: {} with {} capabilities",
            agent_id,
            agent.capabilities.len()
        );
        Ok(agent)
    }

    /// Get an agent by id
    pub async fn get(&self, agent_id: &str) -> Option<RegisteredAgent> {
        let agents = self.agents.read().await;
        agents.get(agent_id).cloned()
    }

    /// Check whether an agent exists and is active
    pub async fn is_active(&self, agent_id: &str) -> bool {
        let agents = self.agents.read().await;
        agents
            .get(agent_id)
            .map(|agent| agent.status == AgentStatus::Active)
            .unwrap_or(false)
    }

    /// Update an agent's `last_seen` to now.
    ///
    /// No-op for unknown ids.
    pub async fn touch(&self, agent_id: &str) {
        let mut agents = self.agents.write().await;
        if let Some(agent) = agents.get_mut(agent_id) {
            agent.last_seen = Utc::now();
        }
    }

    /// Change an agent's lifecycle state
    pub async fn set_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
    ) -> Result<RegisteredAgent, AgentryError> {
        let mut agents = self.agents.write().await;
        match agents.get_mut(agent_id) {
            Some(agent) => {
                agent.status = status;
                Ok(agent.clone())
            }
            None => Err(AgentryError::not_found(format!(
                "Agent '{}' not found",
                agent_id
            ))),
        }
    }

    /// List all agents, sorted by id
    pub async fn list(&self) -> Vec<RegisteredAgent> {
        let agents = self.agents.read().await;
        let mut all: Vec<RegisteredAgent> = agents.values().cloned().collect();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        all
    }

    /// Number of agents currently active
    pub async fn count_active(&self) -> usize {
        let agents = self.agents.read().await;
        agents
            .values()
            .filter(|agent| agent.status == AgentStatus::Active)
            .count()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
