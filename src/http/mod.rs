//! HTTP transport for the MCP server.
//!
//! Exposes registration, execution, and introspection endpoints over
//! REST. Compiled only with the `http` feature; without it a stub that
//! errors at startup is compiled instead.

#[cfg(feature = "http")]
use {
    crate::audit::{LogQuery, Page},
    crate::config::ServerConfig,
    crate::dispatch::ExecutionRequest,
    crate::error::AgentryError,
    crate::registry::{FnHandler, ToolError, ToolHandler},
    crate::server::McpServer,
    crate::types::{
        ExecutionLogEntry, ExecutionStatus, RegisteredAgent, ServerMetrics, ToolDefinition,
        ToolExecutionResult,
    },
    axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        response::Json,
        routing::{get, post},
        Router,
    },
    chrono::{DateTime, Utc},
    serde::Deserialize,
    serde_json::{json, Value},
    std::sync::Arc,
    tower::ServiceBuilder,
    tower_http::cors::CorsLayer,
    tracing::info,
};

#[cfg(feature = "http")]
/// HTTP server exposing an [`McpServer`] over REST
pub struct HttpServer {
    server: McpServer,
    config: ServerConfig,
}

#[cfg(feature = "http")]
impl HttpServer {
    /// Create an HTTP server for the given MCP server and bind configuration
    pub fn new(server: McpServer, config: ServerConfig) -> Self {
        Self { server, config }
    }

    /// Start the HTTP server and serve until the process exits
    pub async fn start(self) -> Result<(), AgentryError> {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let app = self.create_router();

        info!("Starting MCP HTTP server on {}", bind_addr);

        let listener = tokio::net::TcpListener::bind(&bind_addr).await.map_err(|e| {
            AgentryError::configuration_error(format!("Failed to bind {}: {}", bind_addr, e))
        })?;

        axum::serve(listener, app.into_make_service())
            .await
            .map_err(|e| AgentryError::configuration_error(format!("HTTP server error: {}", e)))?;

        Ok(())
    }

    /// Create the router with all endpoints
    fn create_router(&self) -> Router {
        let router = Router::new()
            .route("/agents/register", post(register_agent_handler))
            .route("/agents", get(list_agents_handler))
            .route("/tools/register", post(register_tool_handler))
            .route("/tools", get(list_tools_handler))
            .route("/tools/execute/:tool_name", post(execute_tool_handler))
            .route("/metrics", get(metrics_handler))
            .route("/logs/executions", get(execution_logs_handler))
            .route("/health", get(health_handler))
            .with_state(self.server.clone());

        router.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
    }

    /// Start the server in the background and return a handle
    pub async fn start_background(self) -> tokio::task::JoinHandle<Result<(), AgentryError>> {
        tokio::spawn(async move { self.start().await })
    }
}

#[cfg(feature = "http")]
/// Map a core error onto its status code with a JSON body
fn error_response(err: AgentryError) -> (StatusCode, Json<Value>) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": err.to_string() })))
}

#[cfg(feature = "http")]
#[derive(Debug, Deserialize)]
struct RegisterAgentRequest {
    agent_id: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    metadata: serde_json::Map<String, Value>,
}

#[cfg(feature = "http")]
/// Handler for agent registration
async fn register_agent_handler(
    State(server): State<McpServer>,
    Json(request): Json<RegisterAgentRequest>,
) -> Result<Json<RegisteredAgent>, (StatusCode, Json<Value>)> {
    let agent = server
        .register_agent(&request.agent_id, request.capabilities, request.metadata)
        .await
        .map_err(error_response)?;
    Ok(Json(agent))
}

#[cfg(feature = "http")]
/// Handler for tool registration
async fn register_tool_handler(
    State(server): State<McpServer>,
    Json(definition): Json<ToolDefinition>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let name = definition.name.clone();

    // A schema arriving over HTTP carries no code. Keep whatever handler
    // is already bound under this name, or fall back to echoing the call.
    let handler: Arc<dyn ToolHandler> = match server.tools().lookup(&name).await {
        Some((_, handler)) => handler,
        None => Arc::new(FnHandler::new(
            |parameters: serde_json::Map<String, Value>,
             _user_context: serde_json::Map<String, Value>| async move {
                Ok::<Value, ToolError>(Value::Object(parameters))
            },
        )),
    };

    server
        .register_tool(definition, handler)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": format!("Tool '{}' registered successfully", name),
        })),
    ))
}

#[cfg(feature = "http")]
/// Handler for tool execution
async fn execute_tool_handler(
    State(server): State<McpServer>,
    Path(tool_name): Path<String>,
    Json(request): Json<ExecutionRequest>,
) -> Result<Json<ToolExecutionResult>, (StatusCode, Json<Value>)> {
    let result = server
        .execute_tool(&tool_name, request)
        .await
        .map_err(error_response)?;
    Ok(Json(result))
}

#[cfg(feature = "http")]
/// Handler for listing registered tools
async fn list_tools_handler(State(server): State<McpServer>) -> Json<Vec<ToolDefinition>> {
    Json(server.tools().list().await)
}

#[cfg(feature = "http")]
/// Handler for listing registered agents
async fn list_agents_handler(State(server): State<McpServer>) -> Json<Vec<RegisteredAgent>> {
    Json(server.agents().list().await)
}

#[cfg(feature = "http")]
/// Handler for the metrics snapshot
async fn metrics_handler(State(server): State<McpServer>) -> Json<ServerMetrics> {
    Json(server.metrics().await)
}

#[cfg(feature = "http")]
#[derive(Debug, Deserialize)]
struct LogQueryParams {
    tool_name: Option<String>,
    agent_id: Option<String>,
    status: Option<ExecutionStatus>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    page: Option<usize>,
    page_size: Option<usize>,
}

#[cfg(feature = "http")]
impl From<LogQueryParams> for LogQuery {
    fn from(params: LogQueryParams) -> Self {
        let defaults = LogQuery::default();
        LogQuery {
            tool: params.tool_name,
            agent_id: params.agent_id,
            status: params.status,
            since: params.start_time,
            until: params.end_time,
            page: params.page.unwrap_or(defaults.page),
            page_size: params.page_size.unwrap_or(defaults.page_size),
        }
    }
}

#[cfg(feature = "http")]
/// Handler for querying the execution log
async fn execution_logs_handler(
    State(server): State<McpServer>,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<Page<ExecutionLogEntry>>, (StatusCode, Json<Value>)> {
    let page = server
        .execution_log()
        .query(&LogQuery::from(params))
        .await
        .map_err(error_response)?;
    Ok(Json(page))
}

#[cfg(feature = "http")]
/// Handler for the health endpoint
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": McpServer::version(),
    }))
}

#[cfg(not(feature = "http"))]
/// Stub implementation when the HTTP feature is disabled
pub struct HttpServer;

#[cfg(not(feature = "http"))]
impl HttpServer {
    pub fn new(_server: crate::server::McpServer, _config: crate::config::ServerConfig) -> Self {
        Self
    }

    pub async fn start(self) -> Result<(), crate::error::AgentryError> {
        Err(crate::error::AgentryError::configuration_error(
            "HTTP feature is not enabled. Enable with --features http",
        ))
    }

    pub async fn start_background(
        self,
    ) -> tokio::task::JoinHandle<Result<(), crate::error::AgentryError>> {
        tokio::spawn(async move { self.start().await })
    }
}


#[cfg(all(test, not(feature = "http")))]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::McpServer;

    #[tokio::test]
    async fn test_http_server_stub() {
        let server = HttpServer::new(McpServer::new(), ServerConfig::default());

        let result = server.start().await;
        assert!(result.is_err());
    }
}
