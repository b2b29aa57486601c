//! Tool registry: validated definitions and the handlers that back them.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::error::AgentryError;
use crate::types::ToolDefinition;

/// Errors a tool handler can produce.
///
/// Handlers never see registry or dispatch concerns; anything they return
/// here is surfaced to the caller as an execution failure.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The supplied parameters were structurally valid but unusable
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    /// The tool ran and failed
    #[error("{message}")]
    ExecutionFailed { message: String },
}

impl ToolError {
    /// Create an invalid-parameters error
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        ToolError::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create an execution-failed error
    pub fn execution_failed(message: impl Into<String>) -> Self {
        ToolError::ExecutionFailed {
            message: message.into(),
        }
    }
}

impl From<ToolError> for AgentryError {
    fn from(err: ToolError) -> Self {
        AgentryError::handler_error(err.to_string())
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::execution_failed(format!("HTTP request failed: {}", err))
    }
}

/// The executable side of a tool.
///
/// Handlers receive the validated parameters plus the per-request user
/// context injected by the dispatcher. They run without any registry lock
/// held and under the definition's timeout budget.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        parameters: Map<String, Value>,
        user_context: Map<String, Value>,
    ) -> Result<Value, ToolError>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
///
/// # Example
///
/// ```no_run
/// # use agentry::registry::{FnHandler, ToolError};
/// # use serde_json::{json, Map, Value};
/// let handler = FnHandler::new(|params: Map<String, Value>, _ctx: Map<String, Value>| async move {
///     Ok::<Value, ToolError>(json!({ "echo": Value::Object(params) }))
/// });
/// ```
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send,
{
    async fn call(
        &self,
        parameters: Map<String, Value>,
        user_context: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        (self.f)(parameters, user_context).await
    }
}

#[derive(Default)]
struct RegistryInner {
    definitions: HashMap<String, ToolDefinition>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

/// Thread-safe registry pairing tool definitions with their handlers.
///
/// The definition map holds only serializable schema data, so the full
/// catalog can be listed to clients without touching any handler. Both
/// maps live under one lock and are always updated together.
///
/// Registration is last-write-wins: re-registering a name silently
/// replaces the previous definition and handler.
///
/// # Thread Safety
///
/// Uses `Arc<RwLock<...>>` internally; clones share the same registry and
/// are cheap to pass between tasks.
#[derive(Clone)]
pub struct ToolRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
        }
    }

    /// Register a tool, replacing any previous registration of the same name.
    ///
    /// The definition is validated first; an invalid name, description,
    /// timeout, or an undeclared required parameter fails with a
    /// validation error and leaves the registry untouched.
    pub async fn register(
        &self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), AgentryError> {
        definition.validate()?;
        let name = definition.name.clone();

        let mut inner = self.inner.write().await;
        inner.definitions.insert(name.clone(), definition);
        inner.handlers.insert(name.clone(), handler);
        drop(inner);

        tracing::info!("Registered tool: {}", name);
        Ok(())
    }

    /// Look up a tool's definition and handler together.
    ///
    /// Returns clones so the registry lock is released before the caller
    /// does anything with them.
    pub async fn lookup(&self, name: &str) -> Option<(ToolDefinition, Arc<dyn ToolHandler>)> {
        let inner = self.inner.read().await;
        let definition = inner.definitions.get(name)?.clone();
        let handler = inner.handlers.get(name)?.clone();
        Some((definition, handler))
    }

    /// Get a tool's definition by name
    pub async fn definition(&self, name: &str) -> Option<ToolDefinition> {
        let inner = self.inner.read().await;
        inner.definitions.get(name).cloned()
    }

    /// List all registered definitions, sorted by name
    pub async fn list(&self) -> Vec<ToolDefinition> {
        let inner = self.inner.read().await;
        let mut definitions: Vec<ToolDefinition> = inner.definitions.values().cloned().collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Get all registered tool names, sorted
    pub async fn tool_names(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner.definitions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a tool is registered
    pub async fn has_tool(&self, name: &str) -> bool {
        let inner = self.inner.read().await;
        inner.definitions.contains_key(name)
    }

    /// Number of registered tools
    pub async fn count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.definitions.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
