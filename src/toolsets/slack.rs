//! Slack toolset: messaging and modal interactions.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config::SlackConfig;
use crate::error::AgentryError;
use crate::registry::{ToolError, ToolHandler};
use crate::server::McpServer;
use crate::toolsets::{
    error_for_status, optional_bool, optional_value, require_object, require_str, with_context,
};
use crate::types::{ParameterSchema, ParameterType, ToolDefinition};

/// Client for the Slack Web API backing the `slack_*` tools.
pub struct SlackToolset {
    client: reqwest::Client,
    api_base: String,
    bot_token: Option<String>,
}

impl SlackToolset {
    /// Build the toolset from configuration
    pub fn new(config: &SlackConfig) -> Result<Self, AgentryError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                AgentryError::configuration_error(format!(
                    "Failed to build Slack HTTP client: {}",
                    e
                ))
            })?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn token(&self) -> Result<&str, ToolError> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| ToolError::execution_failed("Slack bot token not configured"))
    }

    /// POST to a Web API method and unwrap Slack's `ok` envelope
    async fn call_api(&self, method: &str, payload: &Value) -> Result<Value, ToolError> {
        let token = self.token()?;
        let response = self
            .client
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        let response = error_for_status("Slack", response).await?;
        let data: Value = response.json().await?;

        if !data["ok"].as_bool().unwrap_or(false) {
            let error = data["error"].as_str().unwrap_or("unknown_error");
            return Err(ToolError::execution_failed(format!(
                "Slack API error: {}",
                error
            )));
        }
        Ok(data)
    }

    /// Send a message to a channel or user
    pub async fn send_message(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        let payload = build_message_payload(parameters)?;
        let data = self
            .call_api("chat.postMessage", &payload)
            .await
            .map_err(|e| with_context(e, "Failed to send message"))?;

        let message = &data["message"];
        Ok(json!({
            "channel": data["channel"],
            "ts": data["ts"],
            "message": {
                "text": message["text"],
                "user": message["user"],
                "bot_id": message["bot_id"],
                "type": message["type"],
            },
            "response_metadata": data.get("response_metadata").cloned().unwrap_or_else(|| json!({})),
        }))
    }

    /// Open a modal dialog from an interaction trigger
    pub async fn open_modal(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        let trigger_id = require_str(parameters, "trigger_id")?;
        let view = require_object(parameters, "view")?;

        let payload = json!({
            "trigger_id": trigger_id,
            "view": view,
        });
        let data = self
            .call_api("views.open", &payload)
            .await
            .map_err(|e| with_context(e, "Failed to open modal"))?;

        Ok(json!({
            "view_id": data["view"]["id"],
            "response_metadata": data.get("response_metadata").cloned().unwrap_or_else(|| json!({})),
        }))
    }

    /// Update an existing message in place
    pub async fn update_message(
        &self,
        parameters: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let payload = build_update_payload(parameters)?;
        let data = self
            .call_api("chat.update", &payload)
            .await
            .map_err(|e| with_context(e, "Failed to update message"))?;

        Ok(json!({
            "channel": data["channel"],
            "ts": data["ts"],
            "text": data["text"],
            "message": data.get("message").cloned().unwrap_or_else(|| json!({})),
        }))
    }
}

fn build_message_payload(parameters: &Map<String, Value>) -> Result<Value, ToolError> {
    let channel = require_str(parameters, "channel")?;
    let text = require_str(parameters, "text")?;
    let as_user = optional_bool(parameters, "as_user").unwrap_or(false);

    let mut payload = json!({
        "channel": channel,
        "text": text,
        "as_user": as_user,
    });
    for key in ["blocks", "attachments", "thread_ts"] {
        if let Some(value) = optional_value(parameters, key) {
            payload[key] = value;
        }
    }
    Ok(payload)
}

fn build_update_payload(parameters: &Map<String, Value>) -> Result<Value, ToolError> {
    let channel = require_str(parameters, "channel")?;
    let ts = require_str(parameters, "ts")?;

    let mut payload = json!({
        "channel": channel,
        "ts": ts,
    });
    for key in ["text", "blocks", "attachments"] {
        if let Some(value) = optional_value(parameters, key) {
            payload[key] = value;
        }
    }
    Ok(payload)
}

struct SendMessage(Arc<SlackToolset>);

#[async_trait]
impl ToolHandler for SendMessage {
    async fn call(
        &self,
        parameters: Map<String, Value>,
        _user_context: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        self.0.send_message(&parameters).await
    }
}

struct OpenModal(Arc<SlackToolset>);

#[async_trait]
impl ToolHandler for OpenModal {
    async fn call(
        &self,
        parameters: Map<String, Value>,
        _user_context: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        self.0.open_modal(&parameters).await
    }
}

struct UpdateMessage(Arc<SlackToolset>);

#[async_trait]
impl ToolHandler for UpdateMessage {
    async fn call(
        &self,
        parameters: Map<String, Value>,
        _user_context: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        self.0.update_message(&parameters).await
    }
}

/// Register the Slack tools with the server
pub async fn register_tools(server: &McpServer, config: &SlackConfig) -> Result<(), AgentryError> {
    let toolset = Arc::new(SlackToolset::new(config)?);

    server
        .register_tool(
            ToolDefinition::new("slack_send_message", "Send a message to a Slack channel or user")
                .with_parameter(
                    "channel",
                    ParameterSchema::new(ParameterType::String).with_description(
                        "Channel or user ID to send the message to (e.g., 'C1234567890' or '@username')",
                    ),
                )
                .with_parameter(
                    "text",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("The message text"),
                )
                .with_parameter(
                    "blocks",
                    ParameterSchema::new(ParameterType::Array)
                        .with_description("Message blocks for rich formatting")
                        .with_items(ParameterSchema::new(ParameterType::Object)),
                )
                .with_parameter(
                    "attachments",
                    ParameterSchema::new(ParameterType::Array)
                        .with_description("Message attachments")
                        .with_items(ParameterSchema::new(ParameterType::Object)),
                )
                .with_parameter(
                    "thread_ts",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("Thread timestamp to reply to a thread"),
                )
                .with_parameter(
                    "as_user",
                    ParameterSchema::new(ParameterType::Boolean)
                        .with_description("Pass true to post the message as the authed user")
                        .with_default(json!(false)),
                )
                .with_required(["channel", "text"]),
            Arc::new(SendMessage(toolset.clone())),
        )
        .await?;

    server
        .register_tool(
            ToolDefinition::new("slack_open_modal", "Open a Slack modal dialog")
                .with_parameter(
                    "trigger_id",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("Trigger ID from a Slack interaction"),
                )
                .with_parameter(
                    "view",
                    ParameterSchema::new(ParameterType::Object)
                        .with_description("View payload for the modal"),
                )
                .with_required(["trigger_id", "view"]),
            Arc::new(OpenModal(toolset.clone())),
        )
        .await?;

    server
        .register_tool(
            ToolDefinition::new("slack_update_message", "Update an existing Slack message")
                .with_parameter(
                    "channel",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("Channel containing the message"),
                )
                .with_parameter(
                    "ts",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("Timestamp of the message to update"),
                )
                .with_parameter(
                    "text",
                    ParameterSchema::new(ParameterType::String)
                        .with_description("New text for the message"),
                )
                .with_parameter(
                    "blocks",
                    ParameterSchema::new(ParameterType::Array)
                        .with_description("New blocks for the message")
                        .with_items(ParameterSchema::new(ParameterType::Object)),
                )
                .with_parameter(
                    "attachments",
                    ParameterSchema::new(ParameterType::Array)
                        .with_description("New attachments for the message")
                        .with_items(ParameterSchema::new(ParameterType::Object)),
                )
                .with_required(["channel", "ts"]),
            Arc::new(UpdateMessage(toolset)),
        )
        .await?;

    tracing::info!("Registered Slack tools");
    Ok(())
}
