//! Agent and tool execution core for MCP-style servers.
//!
//! Agentry pairs schema-validated tool definitions with async handlers,
//! gates every execution on a registered, active agent, and keeps a
//! bounded audit trail plus running counters for everything it dispatches.
//! You get compile-time handler contracts, per-tool timeout budgets, and
//! an optional REST surface for driving the whole thing over HTTP.
//!
//! # Quick Start
//!
//! Register a tool and an agent, then execute:
//!
//! ```no_run
//! use agentry::dispatch::ExecutionRequest;
//! use agentry::registry::FnHandler;
//! use agentry::server::McpServer;
//! use agentry::types::{ParameterSchema, ParameterType, ToolDefinition};
//! use serde_json::{json, Map, Value};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> agentry::Result<()> {
//!     let server = McpServer::new();
//!     server.start();
//!
//!     let definition = ToolDefinition::new("greet", "Greet someone by name")
//!         .with_parameter("name", ParameterSchema::new(ParameterType::String))
//!         .with_required(["name"]);
//!     let handler = Arc::new(FnHandler::new(
//!         |params: Map<String, Value>, _ctx: Map<String, Value>| async move {
//!             Ok(json!(format!("Hello, {}!", params["name"].as_str().unwrap_or("you"))))
//!         },
//!     ));
//!     server.register_tool(definition, handler).await?;
//!     server.register_agent("greeter-bot", vec!["greeting".into()], Map::new()).await?;
//!
//!     let mut parameters = Map::new();
//!     parameters.insert("name".into(), json!("Ada"));
//!     let result = server
//!         .execute_tool("greet", ExecutionRequest::new("greeter-bot").with_parameters(parameters))
//!         .await?;
//!     println!("{}", result.result);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture Overview
//!
//! Four components cooperate behind [`server::McpServer`]:
//!
//! - **[`registry::ToolRegistry`]** - Validated tool definitions paired with their handlers
//! - **[`registry::AgentRegistry`]** - Agent identities, capabilities, and lifecycle status
//! - **[`dispatch::Dispatcher`]** - Authorization, parameter validation, timeout enforcement
//! - **[`audit::ExecutionLog`]** - Bounded execution history with filtered, paginated queries
//!
//! The dispatcher never holds a registry lock while a handler runs, so slow
//! tools cannot block registration or concurrent executions. Counters in
//! [`metrics`] reconcile exactly: every accepted execution is either a
//! success or a failure, and pre-dispatch rejections touch nothing.
//!
//! # Feature Flags
//!
//! - `http` - REST endpoints (axum) and the `agentryd` server binary
//!
//! # Module Organization
//!
//! - [`server`] - The server context wiring registries, log, counters, and dispatch
//! - [`registry`] - Tool and agent registries
//! - [`dispatch`] - The execution pipeline
//! - [`audit`] - Bounded execution log and query types
//! - [`metrics`] - Request counters and the metrics snapshot
//! - [`types`] - Shared data structures for definitions, agents, and results
//! - [`toolsets`] - Built-in GitHub and Slack tool integrations
//! - [`config`] - File and environment configuration
//! - [`http`] - Optional REST transport
//! - [`error`] - The crate-wide error taxonomy

pub mod audit;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod toolsets;
pub mod types;
pub mod utils;

pub use error::AgentryError;
pub use server::McpServer;

pub type Result<T> = std::result::Result<T, AgentryError>;
