// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenRouter API provider implementation
//!
//! Implements the LlmProvider trait against an OpenAI-compatible chat
//! completions endpoint. OpenRouter is the default; any compatible base URL
//! works.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::common::{parse_retry_after_seconds, server_error};
use crate::config::settings::ProviderConfig;
use crate::error::{ApiError, Result, TravelError};
use crate::llm::message::{ContentBlock, Message, MessageContent, Role};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentBlockResponse, LlmProvider, StopReason,
    ToolDefinition, Usage,
};

/// OpenAI-compatible provider, OpenRouter by default
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    site_name: Option<String>,
}

impl OpenRouterProvider {
    /// Create a provider from settings
    pub fn from_config(config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.clone(),
            site_name: Some("Travel Assistant".to_string()),
        })
    }

    /// Create with a custom base URL and request timeout
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            base_url: base_url.into(),
            site_name: None,
        })
    }

    /// Convert internal messages to the OpenAI wire format
    fn convert_messages(messages: &[Message], system: Option<&str>) -> Vec<OpenRouterMessage> {
        let mut result = Vec::with_capacity(messages.len() + 1);

        if let Some(sys) = system {
            result.push(OpenRouterMessage::text("system", sys));
        }

        for m in messages {
            match (m.role, &m.content) {
                (Role::User, _) => result.push(OpenRouterMessage::text("user", m.text())),
                // Corrective directives travel as user turns, marked so the
                // model reads them as instructions rather than user speech.
                (Role::Corrective, _) => result.push(OpenRouterMessage::text(
                    "user",
                    format!("[SYSTEM: {}]", m.text()),
                )),
                (Role::Assistant, MessageContent::Text(text)) => {
                    result.push(OpenRouterMessage::text("assistant", text.clone()))
                }
                (Role::Assistant, MessageContent::Blocks(blocks)) => {
                    let tool_calls: Vec<OpenRouterToolCall> = blocks
                        .iter()
                        .filter_map(|b| match b {
                            ContentBlock::ToolUse { id, name, input } => Some(OpenRouterToolCall {
                                id: id.clone(),
                                r#type: "function".to_string(),
                                function: OpenRouterFunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            }),
                            _ => None,
                        })
                        .collect();
                    let text = m.text();

                    result.push(OpenRouterMessage {
                        role: "assistant".to_string(),
                        content: (!text.is_empty()).then_some(text),
                        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                        tool_call_id: None,
                    });
                }
                (Role::Tool, _) => {
                    for (tool_use_id, _, tool_result) in m.tool_results() {
                        let content = serde_json::to_string(tool_result).unwrap_or_else(|e| {
                            format!(r#"{{"outcome":"failure","kind":"unexpected","message":"{}"}}"#, e)
                        });
                        result.push(OpenRouterMessage {
                            role: "tool".to_string(),
                            content: Some(content),
                            tool_calls: None,
                            tool_call_id: Some(tool_use_id.to_string()),
                        });
                    }
                }
            }
        }

        result
    }

    /// Convert tools to the OpenAI function format
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenRouterTool> {
        tools
            .iter()
            .map(|t| OpenRouterTool {
                r#type: "function".to_string(),
                function: OpenRouterFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: serde_json::json!({
                        "type": t.input_schema.schema_type,
                        "properties": t.input_schema.properties,
                        "required": t.input_schema.required,
                    }),
                },
            })
            .collect()
    }

    /// Build the request body
    fn build_request(request: &CompletionRequest) -> OpenRouterRequest {
        let tools = (!request.tools.is_empty()).then(|| Self::convert_tools(&request.tools));
        OpenRouterRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(&request.messages, request.system.as_deref()),
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
        }
    }

    /// Map an unsuccessful HTTP status and body to an error
    fn parse_error(status: u16, retry_after: Option<u64>, body: &str) -> TravelError {
        match status {
            401 | 403 => return TravelError::Api(ApiError::AuthenticationFailed),
            429 => {
                let secs = retry_after.unwrap_or(60).min(u32::MAX as u64) as u32;
                return TravelError::Api(ApiError::RateLimited(secs));
            }
            _ => {}
        }

        match serde_json::from_str::<OpenRouterError>(body) {
            Ok(error_response) => {
                let message = error_response.error.message;
                let code = error_response.error.code.as_ref().map(|c| match c {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
                match code.as_deref() {
                    Some("invalid_api_key") | Some("authentication_error") => {
                        TravelError::Api(ApiError::AuthenticationFailed)
                    }
                    Some("rate_limit_exceeded") => TravelError::Api(ApiError::RateLimited(60)),
                    Some("model_not_found") => TravelError::Api(ApiError::ModelNotFound(message)),
                    _ if status == 404 => TravelError::Api(ApiError::ModelNotFound(message)),
                    _ => server_error(status, message),
                }
            }
            Err(_) => server_error(status, body),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = Self::build_request(&request);

        let mut req = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json");

        if let Some(ref site_name) = self.site_name {
            req = req.header("X-Title", site_name);
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| TravelError::Api(ApiError::from_transport(&e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, retry_after, &body));
        }

        let api_response: OpenRouterResponse = response
            .json()
            .await
            .map_err(|e| TravelError::Api(ApiError::from_transport(&e)))?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            TravelError::Api(ApiError::InvalidResponse(
                "No choices in response".to_string(),
            ))
        })?;

        let mut content = Vec::new();

        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlockResponse::Text { text });
            }
        }

        if let Some(tool_calls) = choice.message.tool_calls {
            for tc in tool_calls {
                // Malformed arguments reach the tool as an empty object and
                // come back as an invalid_arguments observation.
                let input: serde_json::Value = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| serde_json::json!({}));
                content.push(ContentBlockResponse::ToolUse {
                    id: tc.id,
                    name: tc.function.name,
                    input,
                });
            }
        }

        let stop_reason = choice.finish_reason.as_deref().map(|r| match r {
            "length" => StopReason::MaxTokens,
            "tool_calls" | "function_call" => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        });

        let usage = api_response.usage.unwrap_or_default();
        Ok(CompletionResponse {
            id: api_response.id.unwrap_or_default(),
            model: api_response.model.unwrap_or(request.model),
            content,
            stop_reason,
            usage: Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}

// OpenAI-compatible wire types

#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<OpenRouterMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenRouterTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenRouterMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenRouterToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenRouterMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenRouterToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: OpenRouterFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenRouterFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenRouterTool {
    r#type: String,
    function: OpenRouterFunction,
}

#[derive(Debug, Serialize)]
struct OpenRouterFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenRouterChoice>,
    #[serde(default)]
    usage: Option<OpenRouterUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenRouterToolCall>>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenRouterUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenRouterError {
    error: OpenRouterErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenRouterErrorDetail {
    message: String,
    // Some upstreams send numeric codes
    code: Option<serde_json::Value>,
}
