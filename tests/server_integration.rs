//! End-to-end tests for the execution pipeline through the public server API

use agentry::audit::LogQuery;
use agentry::dispatch::ExecutionRequest;
use agentry::registry::{FnHandler, ToolError, ToolHandler};
use agentry::server::McpServer;
use agentry::types::{
    AgentStatus, ExecutionStatus, ParameterSchema, ParameterType, ToolDefinition,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn sum_definition() -> ToolDefinition {
    ToolDefinition::new("sum", "Add a list of numbers")
        .with_parameter(
            "numbers",
            ParameterSchema::new(ParameterType::Array)
                .with_items(ParameterSchema::new(ParameterType::Number)),
        )
        .with_required(["numbers"])
}

fn sum_handler() -> Arc<dyn ToolHandler> {
    Arc::new(FnHandler::new(
        |params: Map<String, Value>, _ctx: Map<String, Value>| async move {
            let numbers = params
                .get("numbers")
                .and_then(Value::as_array)
                .ok_or_else(|| ToolError::invalid_parameters("numbers must be an array"))?;
            let sum: f64 = numbers.iter().filter_map(Value::as_f64).sum();
            Ok(json!({ "sum": sum }))
        },
    ))
}

fn sum_request(agent_id: &str, numbers: Value) -> ExecutionRequest {
    let mut parameters = Map::new();
    parameters.insert("numbers".into(), numbers);
    ExecutionRequest::new(agent_id).with_parameters(parameters)
}

async fn server_with_sum_tool() -> McpServer {
    let server = McpServer::new();
    server.start();
    server
        .register_tool(sum_definition(), sum_handler())
        .await
        .unwrap();
    server
        .register_agent("calc-agent", vec!["math".into()], Map::new())
        .await
        .unwrap();
    server
}

#[tokio::test]
async fn test_full_execution_flow() {
    let server = server_with_sum_tool().await;

    let result = assert_ok!(
        server
            .execute_tool("sum", sum_request("calc-agent", json!([1, 2, 3])))
            .await
    );

    assert!(result.success);
    assert_eq!(result.result["sum"], 6.0);
    assert!(result.execution_time_ms >= 0.0);

    let metrics = server.metrics().await;
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.successful_executions, 1);
    assert_eq!(metrics.failed_executions, 0);
    assert_eq!(metrics.active_agents, 1);
    assert_eq!(metrics.registered_tools, 1);

    let page = server
        .execution_log()
        .query(&LogQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].tool, "sum");
    assert_eq!(page.items[0].agent_id, "calc-agent");
    assert_eq!(page.items[0].status, ExecutionStatus::Success);
}

#[tokio::test]
async fn test_unknown_agent_is_rejected_without_trace() {
    let server = server_with_sum_tool().await;

    let err = assert_err!(
        server
            .execute_tool("sum", sum_request("ghost", json!([1])))
            .await
    );

    assert!(err.is_auth_error());
    assert_eq!(
        err.to_string(),
        "Authorization error: Agent ghost is not registered or inactive"
    );

    // Rejected before dispatch: nothing counted, nothing logged
    let metrics = server.metrics().await;
    assert_eq!(metrics.total_requests, 0);
    assert!(server.execution_log().is_empty().await);
}

#[tokio::test]
async fn test_suspended_agent_cannot_execute() {
    let server = server_with_sum_tool().await;
    server
        .agents()
        .set_status("calc-agent", AgentStatus::Suspended)
        .await
        .unwrap();

    let err = assert_err!(
        server
            .execute_tool("sum", sum_request("calc-agent", json!([1])))
            .await
    );
    assert!(err.is_auth_error());

    // Re-registration replaces the record and reactivates the agent
    server
        .register_agent("calc-agent", vec!["math".into()], Map::new())
        .await
        .unwrap();
    let result = assert_ok!(
        server
            .execute_tool("sum", sum_request("calc-agent", json!([2, 2])))
            .await
    );
    assert_eq!(result.result["sum"], 4.0);
}

#[tokio::test]
async fn test_validation_failures_are_logged() {
    let server = server_with_sum_tool().await;

    let err = assert_err!(
        server
            .execute_tool("sum", ExecutionRequest::new("calc-agent"))
            .await
    );
    assert!(err.is_user_error());
    assert_eq!(
        err.to_string(),
        "Validation error: Missing required parameter: numbers"
    );

    let metrics = server.metrics().await;
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.failed_executions, 1);

    let page = server
        .execution_log()
        .query(&LogQuery::default())
        .await
        .unwrap();
    assert_eq!(page.items[0].status, ExecutionStatus::Error);
    assert_eq!(
        page.items[0].error.as_deref(),
        Some("Missing required parameter: numbers")
    );
}

#[tokio::test]
async fn test_reregistration_replaces_tool() {
    let server = server_with_sum_tool().await;

    let replacement = ToolDefinition::new("sum", "Always returns zero");
    let handler: Arc<dyn ToolHandler> = Arc::new(FnHandler::new(
        |_params: Map<String, Value>, _ctx: Map<String, Value>| async {
            Ok(json!({ "sum": 0.0 }))
        },
    ));
    server.register_tool(replacement, handler).await.unwrap();

    assert_eq!(server.tools().count().await, 1);
    let result = assert_ok!(
        server
            .execute_tool("sum", ExecutionRequest::new("calc-agent"))
            .await
    );
    assert_eq!(result.result["sum"], 0.0);
}

#[tokio::test]
async fn test_log_filters_and_pagination() {
    let server = server_with_sum_tool().await;
    server
        .register_agent("other-agent", vec!["math".into()], Map::new())
        .await
        .unwrap();

    for i in 0..12 {
        let agent = if i % 2 == 0 { "calc-agent" } else { "other-agent" };
        assert_ok!(
            server
                .execute_tool("sum", sum_request(agent, json!([i])))
                .await
        );
    }

    let all = LogQuery {
        page_size: 5,
        page: 3,
        ..LogQuery::default()
    };
    let page = server.execution_log().query(&all).await.unwrap();
    assert_eq!(page.total, 12);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 2);

    let filtered = LogQuery {
        agent_id: Some("other-agent".to_string()),
        ..LogQuery::default()
    };
    let page = server.execution_log().query(&filtered).await.unwrap();
    assert_eq!(page.total, 6);
    assert!(page.items.iter().all(|e| e.agent_id == "other-agent"));

    // A page past the end is empty, with the counts intact
    let past_the_end = LogQuery {
        page: 9,
        ..LogQuery::default()
    };
    let page = server.execution_log().query(&past_the_end).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 12);
    assert_eq!(page.total_pages, 2);
}

#[tokio::test]
async fn test_counters_reconcile_across_outcomes() {
    let server = server_with_sum_tool().await;

    server
        .register_tool(
            ToolDefinition::new("boom", "Always fails"),
            Arc::new(FnHandler::new(
                |_params: Map<String, Value>, _ctx: Map<String, Value>| async {
                    Err::<Value, ToolError>(ToolError::execution_failed("backend unavailable"))
                },
            )),
        )
        .await
        .unwrap();

    // Two successes
    for _ in 0..2 {
        assert_ok!(
            server
                .execute_tool("sum", sum_request("calc-agent", json!([1, 1])))
                .await
        );
    }
    // One validation failure, one handler failure
    assert_err!(
        server
            .execute_tool("sum", ExecutionRequest::new("calc-agent"))
            .await
    );
    assert_err!(
        server
            .execute_tool("boom", ExecutionRequest::new("calc-agent"))
            .await
    );
    // Rejections that never reach dispatch
    assert_err!(
        server
            .execute_tool("sum", sum_request("ghost", json!([1])))
            .await
    );
    assert_err!(
        server
            .execute_tool("missing", ExecutionRequest::new("calc-agent"))
            .await
    );

    let metrics = server.metrics().await;
    assert_eq!(metrics.total_requests, 4);
    assert_eq!(metrics.successful_executions, 2);
    assert_eq!(metrics.failed_executions, 2);
    assert_eq!(
        metrics.successful_executions + metrics.failed_executions,
        metrics.total_requests
    );
}

#[tokio::test]
async fn test_extra_parameters_reach_the_handler() {
    let server = McpServer::new();
    server
        .register_tool(
            ToolDefinition::new("echo", "Echo all parameters"),
            Arc::new(FnHandler::new(
                |params: Map<String, Value>, _ctx: Map<String, Value>| async move {
                    Ok(Value::Object(params))
                },
            )),
        )
        .await
        .unwrap();
    server
        .register_agent("echo-agent", vec!["echo".into()], Map::new())
        .await
        .unwrap();

    let mut parameters = Map::new();
    parameters.insert("undeclared".into(), json!("still here"));
    let result = assert_ok!(
        server
            .execute_tool(
                "echo",
                ExecutionRequest::new("echo-agent").with_parameters(parameters),
            )
            .await
    );
    assert_eq!(result.result["undeclared"], "still here");
}
