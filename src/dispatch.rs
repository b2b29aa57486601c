//! Tool execution pipeline.
//!
//! Dispatch runs a fixed sequence: agent authorization, tool resolution,
//! parameter validation, then the handler under the tool's timeout budget.
//! Attempts rejected before the tool resolves leave no trace; everything
//! after that point is counted and logged exactly once.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use uuid::Uuid;

use crate::audit::ExecutionLog;
use crate::error::AgentryError;
use crate::metrics::ServerCounters;
use crate::registry::{AgentRegistry, ToolRegistry};
use crate::types::{ExecutionLogEntry, ExecutionStatus, ToolDefinition, ToolExecutionResult};
use crate::utils::logging::truncate_string;

/// One request to execute a tool on behalf of an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Agent making the attempt; must be registered and active
    pub agent_id: String,
    /// Parameters passed to the handler
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Caller context injected into the handler alongside the parameters
    #[serde(default)]
    pub user_context: Map<String, Value>,
    /// Caller-supplied correlation id; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ExecutionRequest {
    /// Create a request with no parameters or context
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            parameters: Map::new(),
            user_context: Map::new(),
            request_id: None,
        }
    }

    /// Set the parameters
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the user context
    pub fn with_user_context(mut self, user_context: Map<String, Value>) -> Self {
        self.user_context = user_context;
        self
    }

    /// Set the correlation id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Executes tools against the registries with accounting and audit.
///
/// Failure ordering is fixed: an unauthorized agent wins over an unknown
/// tool, which wins over invalid parameters. The first two reject the
/// attempt before it is accepted, so they touch neither the counters nor
/// the log. Once the agent and tool resolve, the attempt is counted in
/// `total_requests`, the agent's `last_seen` is bumped, and the outcome
/// lands in the log and in exactly one success or failure counter.
///
/// No registry lock is held while a handler runs.
#[derive(Clone)]
pub struct Dispatcher {
    tools: ToolRegistry,
    agents: AgentRegistry,
    log: ExecutionLog,
    counters: Arc<ServerCounters>,
}

impl Dispatcher {
    /// Create a dispatcher over shared registries, log, and counters
    pub fn new(
        tools: ToolRegistry,
        agents: AgentRegistry,
        log: ExecutionLog,
        counters: Arc<ServerCounters>,
    ) -> Self {
        Self {
            tools,
            agents,
            log,
            counters,
        }
    }

    /// Execute a tool on behalf of an agent.
    ///
    /// Returns the handler's result on success. Authorization, lookup,
    /// validation, handler, and timeout failures all surface as the
    /// corresponding [`AgentryError`]; the raw failure text is also
    /// recorded in the execution log for accepted attempts.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        request: ExecutionRequest,
    ) -> Result<ToolExecutionResult, AgentryError> {
        let execution_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if !self.agents.is_active(&request.agent_id).await {
            return Err(AgentryError::authorization_error(format!(
                "Agent {} is not registered or inactive",
                request.agent_id
            )));
        }

        let (definition, handler) = self
            .tools
            .lookup(tool_name)
            .await
            .ok_or_else(|| AgentryError::not_found(format!("Tool '{}' not found", tool_name)))?;

        // Accepted: from here on the attempt is counted and logged
        self.counters.record_request();
        self.agents.touch(&request.agent_id).await;
        let started_at = Instant::now();

        if let Err(err) = validate_parameters(&definition, &request.parameters) {
            let message = match &err {
                AgentryError::ValidationError { message } => message.clone(),
                other => other.to_string(),
            };
            self.record_failure(&execution_id, tool_name, &request, started_at, message)
                .await;
            return Err(err);
        }

        tracing::debug!("Executing tool: {} for agent: {}", tool_name, request.agent_id);

        let budget = Duration::from_secs(definition.timeout_seconds);
        let outcome = timeout(
            budget,
            handler.call(request.parameters.clone(), request.user_context.clone()),
        )
        .await;

        match outcome {
            Ok(Ok(value)) => {
                let execution_time_ms = elapsed_ms(started_at);
                self.counters.record_success();
                self.log
                    .append(ExecutionLogEntry {
                        execution_id,
                        timestamp: chrono::Utc::now(),
                        tool: tool_name.to_string(),
                        agent_id: request.agent_id.clone(),
                        parameters: request.parameters,
                        status: ExecutionStatus::Success,
                        execution_time_ms,
                        result: Some(value.clone()),
                        error: None,
                    })
                    .await;
                tracing::debug!(
                    "Tool {} completed in {:.1}ms for agent {} (result: {})",
                    tool_name,
                    execution_time_ms,
                    request.agent_id,
                    truncate_string(&value.to_string(), 100)
                );
                Ok(ToolExecutionResult::success(value, execution_time_ms))
            }
            Ok(Err(tool_error)) => {
                let message = tool_error.to_string();
                tracing::warn!("Tool {} failed: {}", tool_name, message);
                self.record_failure(
                    &execution_id,
                    tool_name,
                    &request,
                    started_at,
                    message.clone(),
                )
                .await;
                Err(AgentryError::handler_error(message))
            }
            Err(_) => {
                let err = AgentryError::timeout_error(definition.timeout_seconds);
                tracing::warn!(
                    "Tool {} timed out after {} seconds",
                    tool_name,
                    definition.timeout_seconds
                );
                self.record_failure(
                    &execution_id,
                    tool_name,
                    &request,
                    started_at,
                    err.to_string(),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn record_failure(
        &self,
        execution_id: &str,
        tool_name: &str,
        request: &ExecutionRequest,
        started_at: Instant,
        error: String,
    ) {
        self.counters.record_failure();
        self.log
            .append(ExecutionLogEntry {
                execution_id: execution_id.to_string(),
                timestamp: chrono::Utc::now(),
                tool: tool_name.to_string(),
                agent_id: request.agent_id.clone(),
                parameters: request.parameters.clone(),
                status: ExecutionStatus::Error,
                execution_time_ms: elapsed_ms(started_at),
                result: None,
                error: Some(error),
            })
            .await;
    }
}

fn elapsed_ms(started_at: Instant) -> f64 {
    started_at.elapsed().as_secs_f64() * 1000.0
}

/// Check supplied parameters against a tool definition.
///
/// Every required name must be present, and every supplied value whose
/// name is declared must structurally match the declared type. Names the
/// definition does not declare pass through untouched.
fn validate_parameters(
    definition: &ToolDefinition,
    parameters: &Map<String, Value>,
) -> Result<(), AgentryError> {
    for name in &definition.required {
        if !parameters.contains_key(name) {
            return Err(AgentryError::validation_error(format!(
                "Missing required parameter: {}",
                name
            )));
        }
    }

    for (name, value) in parameters {
        if let Some(schema) = definition.parameters.get(name) {
            if !schema.kind.matches(value) {
                return Err(AgentryError::validation_error(format!(
                    "Parameter '{}' should be of type {}",
                    name, schema.kind
                )));
            }
        }
    }

    Ok(())
}
