//! Built-in toolsets backed by external APIs.
//!
//! Each toolset owns an HTTP client and registers plain tool definitions
//! with handlers that delegate to it. Credentials come from
//! [`crate::config`]; a toolset registers fine without them and its tools
//! fail at call time instead.

pub mod github;
pub mod slack;

pub use github::GithubToolset;
pub use slack::SlackToolset;

use serde_json::{Map, Value};

use crate::registry::ToolError;

/// Extract a required string parameter
pub(crate) fn require_str(parameters: &Map<String, Value>, name: &str) -> Result<String, ToolError> {
    parameters
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::invalid_parameters(format!("Missing required parameter: {}", name)))
}

/// Extract a required object parameter
pub(crate) fn require_object(
    parameters: &Map<String, Value>,
    name: &str,
) -> Result<Map<String, Value>, ToolError> {
    parameters
        .get(name)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| ToolError::invalid_parameters(format!("Missing required parameter: {}", name)))
}

/// Extract an optional string parameter; explicit null counts as absent
pub(crate) fn optional_str(parameters: &Map<String, Value>, name: &str) -> Option<String> {
    parameters
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract an optional unsigned integer parameter
pub(crate) fn optional_u64(parameters: &Map<String, Value>, name: &str) -> Option<u64> {
    parameters.get(name).and_then(Value::as_u64)
}

/// Extract an optional boolean parameter
pub(crate) fn optional_bool(parameters: &Map<String, Value>, name: &str) -> Option<bool> {
    parameters.get(name).and_then(Value::as_bool)
}

/// Extract an optional list of strings, skipping non-string elements
pub(crate) fn optional_string_vec(parameters: &Map<String, Value>, name: &str) -> Option<Vec<String>> {
    parameters.get(name).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Extract an optional raw value, treating explicit null as absent
pub(crate) fn optional_value(parameters: &Map<String, Value>, name: &str) -> Option<Value> {
    match parameters.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.clone()),
    }
}

/// Prefix execution failures with the operation that was underway
pub(crate) fn with_context(err: ToolError, context: &str) -> ToolError {
    match err {
        ToolError::ExecutionFailed { message } => {
            ToolError::execution_failed(format!("{}: {}", context, message))
        }
        other => other,
    }
}

/// Turn a non-success HTTP response into an execution failure
pub(crate) async fn error_for_status(
    api: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ToolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ToolError::execution_failed(format!(
        "{} API returned {}: {}",
        api,
        status.as_u16(),
        crate::utils::logging::truncate_string(&body, 200)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("owner".into(), json!("octocat"));
        map.insert("count".into(), json!(7));
        map.insert("flag".into(), json!(true));
        map.insert("labels".into(), json!(["ci", "bug", 3]));
        map.insert("nothing".into(), Value::Null);
        map
    }

    #[test]
    fn test_require_str() {
        let p = params();
        assert_eq!(require_str(&p, "owner").unwrap(), "octocat");
        assert!(require_str(&p, "missing").is_err());
        // Wrong type reads as missing
        assert!(require_str(&p, "count").is_err());
    }

    #[test]
    fn test_optional_extractors() {
        let p = params();
        assert_eq!(optional_str(&p, "owner").as_deref(), Some("octocat"));
        assert_eq!(optional_str(&p, "nothing"), None);
        assert_eq!(optional_u64(&p, "count"), Some(7));
        assert_eq!(optional_bool(&p, "flag"), Some(true));
        assert_eq!(
            optional_string_vec(&p, "labels").unwrap(),
            vec!["ci".to_string(), "bug".to_string()]
        );
        assert!(optional_value(&p, "nothing").is_none());
        assert_eq!(optional_value(&p, "count"), Some(json!(7)));
    }

    #[test]
    fn test_with_context_prefixes_execution_failures() {
        let err = with_context(
            ToolError::execution_failed("boom"),
            "Failed to send message",
        );
        assert_eq!(err.to_string(), "Failed to send message: boom");

        let passthrough = with_context(
            ToolError::invalid_parameters("bad"),
            "Failed to send message",
        );
        assert_eq!(passthrough.to_string(), "Invalid parameters: bad");
    }
}
