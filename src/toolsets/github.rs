//! GitHub toolset: CI/CD analysis, workflow runs, and issue creation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GithubConfig;
use crate::error::AgentryError;
use crate::registry::{ToolError, ToolHandler};
use crate::server::McpServer;
use crate::toolsets::{
    error_for_status, optional_str, optional_string_vec, optional_u64, require_str, with_context,
};
use crate::types::{ParameterSchema, ParameterType, ToolDefinition};

/// Workflow run statuses accepted by the GitHub API
const RUN_STATUSES: [&str; 13] = [
    "completed",
    "action_required",
    "cancelled",
    "failure",
    "neutral",
    "success",
    "skipped",
    "stale",
    "timed_out",
    "in_progress",
    "queued",
    "requested",
    "waiting",
];

/// Client for the GitHub REST API backing the `github_*` tools.
///
/// Authenticates with the configured bearer token; the token is checked
/// at call time so the toolset can register without one.
pub struct GithubToolset {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GithubToolset {
    /// Build the toolset from configuration
    pub fn new(config: &GithubConfig) -> Result<Self, AgentryError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                AgentryError::configuration_error(format!(
                    "Failed to build GitHub HTTP client: {}",
                    e
                ))
            })?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn token(&self) -> Result<&str, ToolError> {
        self.token
            .as_deref()
            .ok_or_else(|| ToolError::execution_failed("GitHub token not configured"))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolError> {
        let token = self.token()?;
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .query(query)
            .send()
            .await?;
        let response = error_for_status("GitHub", response).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ToolError> {
        let token = self.token()?;
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .json(body)
            .send()
            .await?;
        let response = error_for_status("GitHub", response).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Fetch all workflow runs for a branch created at or after `since`
    async fn fetch_runs_since(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<WorkflowRun>, ToolError> {
        let path = format!("/repos/{}/{}/actions/runs", owner, repo);
        let created = format!(">={}", since.format("%Y-%m-%dT%H:%M:%SZ"));
        let mut all = Vec::new();

        // The listing endpoint caps out at 1000 results
        for page in 1..=10u32 {
            let query = [
                ("branch", branch.to_string()),
                ("created", created.clone()),
                ("per_page", "100".to_string()),
                ("page", page.to_string()),
            ];
            let response: WorkflowRunsResponse = self.get_json(&path, &query).await?;
            let fetched = response.workflow_runs.len();
            all.extend(response.workflow_runs);
            if fetched < 100 {
                break;
            }
        }
        Ok(all)
    }

    async fn count_open_vulnerability_alerts(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<u64, ToolError> {
        let path = format!("/repos/{}/{}/dependabot/alerts", owner, repo);
        let mut count = 0u64;

        // Same 1000-result cap as the runs listing
        for page in 1..=10u32 {
            let query = [
                ("state", "open".to_string()),
                ("per_page", "100".to_string()),
                ("page", page.to_string()),
            ];
            let alerts: Vec<Value> = self.get_json(&path, &query).await?;
            let fetched = alerts.len();
            count += fetched as u64;
            if fetched < 100 {
                break;
            }
        }
        Ok(count)
    }

    /// Analyze a repository's recent workflow runs for CI/CD inefficiencies
    pub async fn analyze_repository(
        &self,
        parameters: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let owner = require_str(parameters, "owner")?;
        let repo = require_str(parameters, "repo")?;
        let branch = optional_str(parameters, "branch").unwrap_or_else(|| "main".to_string());
        let lookback_days = optional_u64(parameters, "lookback_days").unwrap_or(30);

        // Very large lookbacks exceed the representable date range
        let since = i64::try_from(lookback_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                ToolError::invalid_parameters(format!(
                    "lookback_days {} is out of range",
                    lookback_days
                ))
            })?;
        let runs = self
            .fetch_runs_since(&owner, &repo, &branch, since)
            .await
            .map_err(|e| with_context(e, "Failed to analyze repository"))?;

        // Fetch both enrichment lookups concurrently
        let (languages_result, alerts_result) = futures::future::join(
            self.get_json::<Value>(&format!("/repos/{}/{}/languages", owner, repo), &[]),
            self.count_open_vulnerability_alerts(&owner, &repo),
        )
        .await;

        let languages = match languages_result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to get repository languages: {}", e);
                json!({})
            }
        };

        // Alerts need extra permissions; treat denial as zero findings
        let vulnerability_alerts = match alerts_result {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Failed to get vulnerability alerts: {}", e);
                0
            }
        };

        Ok(build_analysis(
            &owner,
            &repo,
            &branch,
            lookback_days,
            &runs,
            languages,
            vulnerability_alerts,
        ))
    }

    /// List workflow runs with the caller's filters and pagination
    pub async fn get_workflow_runs(
        &self,
        parameters: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let owner = require_str(parameters, "owner")?;
        let repo = require_str(parameters, "repo")?;
        let per_page = optional_u64(parameters, "per_page").unwrap_or(30);
        let page = optional_u64(parameters, "page").unwrap_or(1);

        let mut query = vec![
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(branch) = optional_str(parameters, "branch") {
            query.push(("branch", branch));
        }
        if let Some(event) = optional_str(parameters, "event") {
            query.push(("event", event));
        }
        if let Some(status) = optional_str(parameters, "status") {
            query.push(("status", status));
        }

        let path = format!("/repos/{}/{}/actions/runs", owner, repo);
        let response: WorkflowRunsResponse = self
            .get_json(&path, &query)
            .await
            .map_err(|e| with_context(e, "Failed to get workflow runs"))?;

        let runs: Vec<Value> = response.workflow_runs.iter().map(run_to_json).collect();
        Ok(json!({
            "total_count": response.total_count,
            "page": page,
            "per_page": per_page,
            "workflow_runs": runs,
        }))
    }

    /// Locate the log archive and related URLs for one workflow run
    pub async fn get_workflow_run_logs(
        &self,
        parameters: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let owner = require_str(parameters, "owner")?;
        let repo = require_str(parameters, "repo")?;
        let run_id = optional_u64(parameters, "run_id").ok_or_else(|| {
            ToolError::invalid_parameters("Missing required parameter: run_id")
        })?;

        let path = format!("/repos/{}/{}/actions/runs/{}", owner, repo, run_id);
        let run: WorkflowRun = self
            .get_json(&path, &[])
            .await
            .map_err(|e| with_context(e, "Failed to get workflow run logs"))?;

        let logs_url = format!(
            "{}/repos/{}/{}/actions/runs/{}/logs",
            self.api_base, owner, repo, run_id
        );
        Ok(json!({
            "run_id": run.id,
            "status": run.status,
            "conclusion": run.conclusion,
            "logs_url": logs_url,
            "artifacts_url": run.artifacts_url,
            "jobs_url": run.jobs_url,
        }))
    }

    /// Create an issue in a repository
    pub async fn create_issue(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        let owner = require_str(parameters, "owner")?;
        let repo = require_str(parameters, "repo")?;
        let title = require_str(parameters, "title")?;
        let body = optional_str(parameters, "body").unwrap_or_default();
        let labels = optional_string_vec(parameters, "labels").unwrap_or_default();
        let assignees = optional_string_vec(parameters, "assignees").unwrap_or_default();

        let path = format!("/repos/{}/{}/issues", owner, repo);
        let payload = json!({
            "title": title,
            "body": body,
            "labels": labels,
            "assignees": assignees,
        });
        let issue: IssueResponse = self
            .post_json(&path, &payload)
            .await
            .map_err(|e| with_context(e, "Failed to create issue"))?;

        Ok(json!({
            "id": issue.id,
            "number": issue.number,
            "title": issue.title,
            "body": issue.body,
            "state": issue.state,
            "url": issue.html_url,
            "created_at": issue.created_at,
            "updated_at": issue.updated_at,
            "labels": issue.labels.iter().map(|l| l.name.clone()).collect::<Vec<_>>(),
            "assignees": issue.assignees.iter().map(|a| a.login.clone()).collect::<Vec<_>>(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    total_count: u64,
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WorkflowRun {
    id: u64,
    name: Option<String>,
    head_branch: Option<String>,
    head_sha: Option<String>,
    #[serde(default)]
    run_number: u64,
    event: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    workflow_id: Option<u64>,
    html_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    run_started_at: Option<DateTime<Utc>>,
    artifacts_url: Option<String>,
    jobs_url: Option<String>,
}

impl WorkflowRun {
    /// Wall-clock seconds from creation to last update, when both are known
    fn duration_seconds(&self) -> Option<f64> {
        match (self.created_at, self.updated_at) {
            (Some(created), Some(updated)) => {
                Some((updated - created).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

fn run_to_json(run: &WorkflowRun) -> Value {
    json!({
        "id": run.id,
        "name": run.name,
        "head_branch": run.head_branch,
        "head_sha": run.head_sha,
        "run_number": run.run_number,
        "event": run.event,
        "status": run.status,
        "conclusion": run.conclusion,
        "workflow_id": run.workflow_id,
        "url": run.html_url,
        "created_at": run.created_at,
        "updated_at": run.updated_at,
        "run_started_at": run.run_started_at,
        "duration_seconds": run.duration_seconds(),
    })
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    id: u64,
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    html_url: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    labels: Vec<IssueLabel>,
    #[serde(default)]
    assignees: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct IssueLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Default)]
struct WorkflowStats {
    total_runs: u64,
    successful_runs: u64,
    durations: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct WorkflowMetrics {
    name: String,
    total_runs: u64,
    success_rate: f64,
    avg_duration_seconds: f64,
    failure_rate: f64,
}

/// Summarize fetched runs into the analysis payload
fn build_analysis(
    owner: &str,
    repo: &str,
    branch: &str,
    lookback_days: u64,
    runs: &[WorkflowRun],
    languages: Value,
    vulnerability_alerts: u64,
) -> Value {
    let total_runs = runs.len() as u64;
    let mut successful_runs = 0u64;
    let mut failed_runs = 0u64;
    let mut cancelled_runs = 0u64;
    let mut durations: Vec<f64> = Vec::new();
    let mut workflows: BTreeMap<String, WorkflowStats> = BTreeMap::new();

    for run in runs {
        match run.conclusion.as_deref() {
            Some("success") => successful_runs += 1,
            Some("failure") => failed_runs += 1,
            Some("cancelled") => cancelled_runs += 1,
            _ => {}
        }

        // Only completed runs carry a meaningful duration
        let completed_duration = if run.status.as_deref() == Some("completed") {
            run.duration_seconds()
        } else {
            None
        };
        if let Some(duration) = completed_duration {
            durations.push(duration);
        }

        let Some(workflow_id) = run.workflow_id else {
            continue;
        };
        let name = run
            .name
            .clone()
            .unwrap_or_else(|| format!("Workflow {}", workflow_id));
        let stats = workflows.entry(name).or_default();
        stats.total_runs += 1;
        if run.conclusion.as_deref() == Some("success") {
            stats.successful_runs += 1;
        }
        if let Some(duration) = completed_duration {
            stats.durations.push(duration);
        }
    }

    let success_rate = if total_runs > 0 {
        successful_runs as f64 / total_runs as f64 * 100.0
    } else {
        0.0
    };
    let avg_duration = mean(&durations);

    let mut workflow_metrics: Vec<WorkflowMetrics> = workflows
        .into_iter()
        .map(|(name, stats)| {
            let workflow_success = stats.successful_runs as f64 / stats.total_runs as f64 * 100.0;
            WorkflowMetrics {
                name,
                total_runs: stats.total_runs,
                success_rate: round2(workflow_success),
                avg_duration_seconds: round2(mean(&stats.durations)),
                failure_rate: round2(100.0 - workflow_success),
            }
        })
        .collect();

    // Most failure-prone first
    workflow_metrics.sort_by(|a, b| {
        b.failure_rate
            .partial_cmp(&a.failure_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut recommendations: Vec<Value> = Vec::new();
    for workflow in &workflow_metrics {
        if workflow.avg_duration_seconds > 600.0 {
            recommendations.push(json!({
                "type": "performance",
                "severity": "high",
                "message": format!(
                    "Workflow '{}' is slow (avg {:.1}s)",
                    workflow.name, workflow.avg_duration_seconds
                ),
                "suggestion": "Consider optimizing the workflow by caching dependencies, running jobs in parallel, or using matrix builds.",
            }));
        }
    }
    for workflow in &workflow_metrics {
        if workflow.failure_rate > 20.0 {
            let severity = if workflow.failure_rate > 50.0 {
                "critical"
            } else {
                "high"
            };
            recommendations.push(json!({
                "type": "reliability",
                "severity": severity,
                "message": format!(
                    "High failure rate in workflow '{}' ({:.1}%)",
                    workflow.name, workflow.failure_rate
                ),
                "suggestion": "Investigate test failures and add retry logic for flaky tests.",
            }));
        }
    }
    if vulnerability_alerts > 0 {
        recommendations.push(json!({
            "type": "security",
            "severity": "high",
            "message": format!("{} security vulnerabilities found", vulnerability_alerts),
            "suggestion": "Update dependencies to their latest secure versions using Dependabot or similar tools.",
        }));
    }

    json!({
        "repository": format!("{}/{}", owner, repo),
        "branch": branch,
        "analysis_period_days": lookback_days,
        "total_workflow_runs": total_runs,
        "success_rate_percent": round2(success_rate),
        "failed_runs": failed_runs,
        "cancelled_runs": cancelled_runs,
        "avg_workflow_duration_seconds": round2(avg_duration),
        "workflow_metrics": workflow_metrics,
        "languages": languages,
        "recommendations": recommendations,
        "analysis_timestamp": Utc::now().to_rfc3339(),
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

struct AnalyzeRepository(Arc<GithubToolset>);

#[async_trait]
impl ToolHandler for AnalyzeRepository {
    async fn call(
        &self,
        parameters: Map<String, Value>,
        _user_context: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        self.0.analyze_repository(&parameters).await
    }
}

struct GetWorkflowRuns(Arc<GithubToolset>);

#[async_trait]
impl ToolHandler for GetWorkflowRuns {
    async fn call(
        &self,
        parameters: Map<String, Value>,
        _user_context: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        self.0.get_workflow_runs(&parameters).await
    }
}

struct GetWorkflowRunLogs(Arc<GithubToolset>);

#[async_trait]
impl ToolHandler for GetWorkflowRunLogs {
    async fn call(
        &self,
        parameters: Map<String, Value>,
        _user_context: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        self.0.get_workflow_run_logs(&parameters).await
    }
}

struct CreateIssue(Arc<GithubToolset>);

#[async_trait]
impl ToolHandler for CreateIssue {
    async fn call(
        &self,
        parameters: Map<String, Value>,
        _user_context: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        self.0.create_issue(&parameters).await
    }
}

/// Register the GitHub tools with the server
pub async fn register_tools(server: &McpServer, config: &GithubConfig) -> Result<(), AgentryError> {
    let toolset = Arc::new(GithubToolset::new(config)?);

    server
        .register_tool(
            ToolDefinition::new(
                "github_analyze_repository",
                "Analyze a GitHub repository for CI/CD inefficiencies",
            )
            .with_parameter(
                "owner",
                ParameterSchema::new(ParameterType::String).with_description("Repository owner"),
            )
            .with_parameter(
                "repo",
                ParameterSchema::new(ParameterType::String).with_description("Repository name"),
            )
            .with_parameter(
                "branch",
                ParameterSchema::new(ParameterType::String)
                    .with_description("Branch to analyze")
                    .with_default(json!("main")),
            )
            .with_parameter(
                "lookback_days",
                ParameterSchema::new(ParameterType::Integer)
                    .with_description("Number of days of workflow runs to analyze")
                    .with_default(json!(30)),
            )
            .with_required(["owner", "repo"]),
            Arc::new(AnalyzeRepository(toolset.clone())),
        )
        .await?;

    server
        .register_tool(
            ToolDefinition::new("github_get_workflow_runs", "Get workflow runs for a repository")
                .with_parameter(
                    "owner",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("Repository owner"),
                )
                .with_parameter(
                    "repo",
                    ParameterSchema::new(ParameterType::String).with_description("Repository name"),
                )
                .with_parameter(
                    "branch",
                    ParameterSchema::new(ParameterType::String).with_description("Filter by branch"),
                )
                .with_parameter(
                    "event",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("Filter by event that triggered the workflow"),
                )
                .with_parameter(
                    "status",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("Filter by workflow run status")
                        .with_enum_values(RUN_STATUSES.iter().map(|s| json!(s))),
                )
                .with_parameter(
                    "per_page",
                    ParameterSchema::new(ParameterType::Integer)
                        .with_description("Results per page")
                        .with_default(json!(30))
                        .with_maximum(100.0),
                )
                .with_parameter(
                    "page",
                    ParameterSchema::new(ParameterType::Integer)
                        .with_description("Page number")
                        .with_default(json!(1)),
                )
                .with_required(["owner", "repo"]),
            Arc::new(GetWorkflowRuns(toolset.clone())),
        )
        .await?;

    server
        .register_tool(
            ToolDefinition::new(
                "github_get_workflow_run_logs",
                "Get logs for a specific workflow run",
            )
            .with_parameter(
                "owner",
                ParameterSchema::new(ParameterType::String).with_description("Repository owner"),
            )
            .with_parameter(
                "repo",
                ParameterSchema::new(ParameterType::String).with_description("Repository name"),
            )
            .with_parameter(
                "run_id",
                ParameterSchema::new(ParameterType::Integer)
                    .with_description("ID of the workflow run"),
            )
            .with_required(["owner", "repo", "run_id"]),
            Arc::new(GetWorkflowRunLogs(toolset.clone())),
        )
        .await?;

    server
        .register_tool(
            ToolDefinition::new("github_create_issue", "Create a new GitHub issue")
                .with_parameter(
                    "owner",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("Repository owner"),
                )
                .with_parameter(
                    "repo",
                    ParameterSchema::new(ParameterType::String).with_description("Repository name"),
                )
                .with_parameter(
                    "title",
                    ParameterSchema::new(ParameterType::String).with_description("Issue title"),
                )
                .with_parameter(
                    "body",
                    ParameterSchema::new(ParameterType::String).with_description("Issue body"),
                )
                .with_parameter(
                    "labels",
                    ParameterSchema::new(ParameterType::Array)
                        .with_description("Labels to apply to the issue")
                        .with_items(ParameterSchema::new(ParameterType::String)),
                )
                .with_parameter(
                    "assignees",
                    ParameterSchema::new(ParameterType::Array)
                        .with_description("Usernames to assign to the issue")
                        .with_items(ParameterSchema::new(ParameterType::String)),
                )
                .with_required(["owner", "repo", "title"]),
            Arc::new(CreateIssue(toolset)),
        )
        .await?;

    tracing::info!("Registered GitHub tools");
    Ok(())
}
