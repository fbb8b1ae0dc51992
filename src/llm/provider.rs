// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM Provider trait and related types
//!
//! The model is a black-box completion function: ordered history plus an
//! optional set of callable tools in, either final text or tool calls out.
//! [`CompletionResponse::next_action`] collapses a response into the tagged
//! [`NextAction`] the reasoning loop switches on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::message::{ContentBlock, Message};

/// Main trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openrouter", "mock")
    fn name(&self) -> &str;

    /// Non-streaming completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Request for completion
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,

    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// System prompt
    pub system: Option<String>,

    /// Maximum tokens in response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Tools the model may call; empty means no tool calling this request
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    /// Create a new completion request
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            system: None,
            max_tokens: 2048,
            temperature: 0.3,
            tools: Vec::new(),
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set available tools
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Response ID
    pub id: String,

    /// Model used
    pub model: String,

    /// Response content
    pub content: Vec<ContentBlockResponse>,

    /// Stop reason
    pub stop_reason: Option<StopReason>,

    /// Token usage
    pub usage: Usage,
}

impl CompletionResponse {
    /// All text blocks joined with newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlockResponse::Text { text } => Some(text.as_str()),
                ContentBlockResponse::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Collapse the response into the loop's next action.
    ///
    /// Any tool call wins over text: text that accompanies tool calls is kept
    /// as the model's reasoning, not treated as a final answer.
    pub fn next_action(&self) -> NextAction {
        let calls: Vec<ToolCall> = self
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlockResponse::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                ContentBlockResponse::Text { .. } => None,
            })
            .collect();

        let text = self.text();
        if calls.is_empty() {
            NextAction::Final { text }
        } else {
            NextAction::CallTools {
                reasoning: (!text.trim().is_empty()).then_some(text),
                calls,
            }
        }
    }
}

/// What the model wants to do next
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    /// A final answer for the user
    Final { text: String },
    /// One or more tool calls, optionally with accompanying reasoning text
    CallTools {
        reasoning: Option<String>,
        calls: Vec<ToolCall>,
    },
}

impl NextAction {
    /// Content blocks to record as the assistant's message
    pub fn to_blocks(&self) -> Vec<ContentBlock> {
        match self {
            NextAction::Final { text } => vec![ContentBlock::Text { text: text.clone() }],
            NextAction::CallTools { reasoning, calls } => {
                let mut blocks = Vec::with_capacity(calls.len() + 1);
                if let Some(reasoning) = reasoning {
                    blocks.push(ContentBlock::Text {
                        text: reasoning.clone(),
                    });
                }
                blocks.extend(calls.iter().map(|c| ContentBlock::ToolUse {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    input: c.arguments.clone(),
                }));
                blocks
            }
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A content block in the response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockResponse {
    /// Text content
    Text { text: String },

    /// Tool use request
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of message
    EndTurn,
    /// Hit max tokens
    MaxTokens,
    /// Wants to use a tool
    ToolUse,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    pub input_tokens: u32,
    /// Output tokens
    pub output_tokens: u32,
}

/// Tool definition offered to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON Schema for input
    pub input_schema: ToolInputSchema,
}

/// JSON Schema for tool input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Properties
    pub properties: serde_json::Value,
    /// Required properties
    #[serde(default)]
    pub required: Vec<String>,
}
