//! Core data model: tool definitions, agents, execution records, and metrics.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::AgentryError;

/// Shared identifier rule for tool names and agent ids
static IDENTIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

/// Default execution budget for tools that do not declare one
fn default_timeout_seconds() -> u64 {
    30
}

/// Validate an identifier (tool name or agent id) against the shared rule
pub(crate) fn validate_identifier(value: &str, what: &str) -> Result<(), AgentryError> {
    if value.is_empty() || value.len() > 100 || !IDENTIFIER_PATTERN.is_match(value) {
        return Err(AgentryError::validation_error(format!(
            "{} must be 1-100 characters of [a-zA-Z0-9_-], got '{}'",
            what, value
        )));
    }
    Ok(())
}

/// Primitive kind a declared parameter must structurally match.
///
/// This is a closed set; registration rejects schemas declaring anything
/// else. Matching is structural on the JSON value, not a full schema
/// validation - `number` accepts integers, `integer` rejects floats and
/// booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    /// Check whether a JSON value structurally matches this kind
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Array => value.is_array(),
            ParameterType::Object => value.is_object(),
        }
    }

    /// Schema name of this kind, as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema for a single tool parameter.
///
/// Only `type` participates in dispatch-time validation; the remaining
/// fields are declarative schema data carried for clients and docs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Primitive kind the supplied value must match
    #[serde(rename = "type")]
    pub kind: ParameterType,
    /// Human-readable description of the parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default value, advisory for callers (the dispatcher does not inject it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Closed set of allowed values, advisory
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Element schema for array parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    /// Nested property schemas for object parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, ParameterSchema>>,
    /// Required property names for object parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Format hint (e.g. "date-time"), advisory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Numeric lower bound, advisory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Numeric upper bound, advisory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// String length lower bound, advisory
    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    /// String length upper bound, advisory
    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    /// Regex the value should match, advisory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ParameterSchema {
    /// Create a schema of the given kind with no constraints
    pub fn new(kind: ParameterType) -> Self {
        Self {
            kind,
            description: None,
            default: None,
            enum_values: None,
            items: None,
            properties: None,
            required: None,
            format: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a default value
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Restrict the value to an enumerated set
    pub fn with_enum_values(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_values = Some(values.into_iter().collect());
        self
    }

    /// Declare the element schema of an array parameter
    pub fn with_items(mut self, items: ParameterSchema) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    /// Attach a numeric upper bound
    pub fn with_maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }
}

/// Definition of a tool that agents can execute.
///
/// Immutable once registered; re-registering the same name replaces the
/// whole definition (last write wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name, `[a-zA-Z0-9_-]+`, 1-100 characters
    pub name: String,
    /// What the tool does, 1-1000 characters
    pub description: String,
    /// Declared parameters, keyed by parameter name
    #[serde(default)]
    pub parameters: HashMap<String, ParameterSchema>,
    /// Names that must be present in every invocation; subset of `parameters`
    #[serde(default)]
    pub required: Vec<String>,
    /// Execution budget in seconds, 1-300
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ToolDefinition {
    /// Create a definition with no parameters and the default timeout
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: HashMap::new(),
            required: Vec::new(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Declare a parameter
    pub fn with_parameter(mut self, name: impl Into<String>, schema: ParameterSchema) -> Self {
        self.parameters.insert(name.into(), schema);
        self
    }

    /// Declare which parameters are required
    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = names.into_iter().map(Into::into).collect();
        self
    }

    /// Override the execution budget
    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Check the definition invariants
    pub fn validate(&self) -> Result<(), AgentryError> {
        validate_identifier(&self.name, "Tool name")?;

        let description_chars = self.description.chars().count();
        if description_chars == 0 || description_chars > 1000 {
            return Err(AgentryError::validation_error(format!(
                "Tool description must be 1-1000 characters, got {}",
                description_chars
            )));
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > 300 {
            return Err(AgentryError::validation_error(format!(
                "timeout_seconds must be between 1 and 300, got {}",
                self.timeout_seconds
            )));
        }

        for name in &self.required {
            if !self.parameters.contains_key(name) {
                return Err(AgentryError::validation_error(format!(
                    "Required parameter '{}' is not declared in parameters",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Lifecycle state of a registered agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
    Suspended,
}

/// A caller identity permitted to invoke tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredAgent {
    /// Unique agent id, same rule as tool names
    pub agent_id: String,
    /// Advisory capability tags, non-empty and trimmed
    pub capabilities: Vec<String>,
    /// Current lifecycle state; registration always starts active
    pub status: AgentStatus,
    /// When this registration was created (reset on re-registration)
    pub registered_at: DateTime<Utc>,
    /// Last execution attempt by this agent
    pub last_seen: DateTime<Utc>,
    /// Free-form caller-supplied metadata (transport details etc.)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Outcome classification of one execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Result of a tool execution, returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Whether the handler completed without error
    pub success: bool,
    /// Handler result payload; null on failure
    pub result: Value,
    /// Error message if execution failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock execution time in milliseconds
    pub execution_time_ms: f64,
    /// When the result was produced
    pub timestamp: DateTime<Utc>,
}

impl ToolExecutionResult {
    /// Create a successful result
    pub fn success(result: Value, execution_time_ms: f64) -> Self {
        Self {
            success: true,
            result,
            error: None,
            execution_time_ms,
            timestamp: Utc::now(),
        }
    }

    /// Create a failed result
    pub fn failure(error: impl Into<String>, execution_time_ms: f64) -> Self {
        Self {
            success: false,
            result: Value::Null,
            error: Some(error.into()),
            execution_time_ms,
            timestamp: Utc::now(),
        }
    }
}

/// One entry in the bounded execution log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Correlation id: the caller's request_id or a generated one
    pub execution_id: String,
    /// When the entry was appended
    pub timestamp: DateTime<Utc>,
    /// Name of the tool that was invoked
    pub tool: String,
    /// Agent that made the attempt
    pub agent_id: String,
    /// Snapshot of the supplied parameters
    pub parameters: Map<String, Value>,
    /// Outcome classification
    pub status: ExecutionStatus,
    /// Wall-clock execution time in milliseconds
    pub execution_time_ms: f64,
    /// Handler result payload for successful attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message for failed attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate server metrics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMetrics {
    /// Execution attempts accepted for dispatch
    pub total_requests: u64,
    /// Attempts whose handler completed without error
    pub successful_executions: u64,
    /// Attempts that failed validation, timed out, or whose handler errored
    pub failed_executions: u64,
    /// Agents currently in the active state
    pub active_agents: usize,
    /// Tools currently registered
    pub registered_tools: usize,
    /// Seconds since the server was started; 0 if never started
    pub uptime_seconds: f64,
}
