//! The MCP server context object.
//!
//! [`McpServer`] owns the tool and agent registries, the execution log,
//! and the counters, and wires them into a [`Dispatcher`]. Everything is
//! held behind `Arc`, so clones share state and the server can be passed
//! freely between tasks and transport layers.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::audit::ExecutionLog;
use crate::dispatch::{Dispatcher, ExecutionRequest};
use crate::error::AgentryError;
use crate::metrics::ServerCounters;
use crate::registry::{AgentRegistry, ToolHandler, ToolRegistry};
use crate::types::{RegisteredAgent, ServerMetrics, ToolDefinition, ToolExecutionResult};

/// Core server: registries, execution log, counters, and dispatch.
///
/// # Example
///
/// ```no_run
/// use agentry::server::McpServer;
/// use agentry::dispatch::ExecutionRequest;
/// use agentry::registry::FnHandler;
/// use agentry::types::ToolDefinition;
/// use serde_json::{json, Map, Value};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> agentry::Result<()> {
///     let server = McpServer::new();
///     server.start();
///
///     let definition = ToolDefinition::new("ping", "Reply with pong");
///     let handler = Arc::new(FnHandler::new(|_params: Map<String, Value>, _ctx: Map<String, Value>| async {
///         Ok(json!("pong"))
///     }));
///     server.register_tool(definition, handler).await?;
///     server.register_agent("pinger", vec!["ping".into()], Map::new()).await?;
///
///     let result = server.execute_tool("ping", ExecutionRequest::new("pinger")).await?;
///     assert_eq!(result.result, json!("pong"));
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct McpServer {
    tools: ToolRegistry,
    agents: AgentRegistry,
    log: ExecutionLog,
    counters: Arc<ServerCounters>,
    dispatcher: Dispatcher,
}

impl McpServer {
    /// Create a server with empty registries and zeroed counters
    pub fn new() -> Self {
        let tools = ToolRegistry::new();
        let agents = AgentRegistry::new();
        let log = ExecutionLog::new();
        let counters = Arc::new(ServerCounters::new());
        let dispatcher = Dispatcher::new(
            tools.clone(),
            agents.clone(),
            log.clone(),
            counters.clone(),
        );
        Self {
            tools,
            agents,
            log,
            counters,
            dispatcher,
        }
    }

    /// Mark the server as started; uptime is measured from the first call
    pub fn start(&self) {
        self.counters.mark_started();
        tracing::info!("MCP server started (version {})", Self::version());
    }

    /// Crate version reported by the health endpoint
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// The tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The agent registry
    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// The execution log
    pub fn execution_log(&self) -> &ExecutionLog {
        &self.log
    }

    /// Register a tool definition with its handler
    pub async fn register_tool(
        &self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), AgentryError> {
        self.tools.register(definition, handler).await
    }

    /// Register an agent
    pub async fn register_agent(
        &self,
        agent_id: &str,
        capabilities: Vec<String>,
        metadata: Map<String, Value>,
    ) -> Result<RegisteredAgent, AgentryError> {
        self.agents.register(agent_id, capabilities, metadata).await
    }

    /// Execute a tool through the dispatch pipeline
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        request: ExecutionRequest,
    ) -> Result<ToolExecutionResult, AgentryError> {
        self.dispatcher.execute_tool(tool_name, request).await
    }

    /// Aggregate metrics snapshot
    pub async fn metrics(&self) -> ServerMetrics {
        self.counters
            .snapshot(self.agents.count_active().await, self.tools.count().await)
    }
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new()
    }
}
