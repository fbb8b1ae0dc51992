// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for LLM interactions
//!
//! A session's history is an ordered `Vec<Message>`. Tool observations carry
//! the structured [`ToolResult`] rather than a pre-rendered string, so the
//! grounding judge and the debug trace see exactly what the model saw.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::ToolResult;

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique identifier for the message
    pub id: Uuid,

    /// Role of the message sender
    pub role: Role,

    /// Content of the message
    pub content: MessageContent,

    /// When the message was created
    pub timestamp: DateTime<Utc>,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// User message
    User,
    /// Assistant response (text and/or tool calls)
    Assistant,
    /// Tool observation
    Tool,
    /// Corrective directive injected after a failed grounding check
    Corrective,
}

/// Content of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multiple content blocks (text, tool use, tool result)
    Blocks(Vec<ContentBlock>),
}

/// A block of content within a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content
    Text { text: String },

    /// Tool call requested by the assistant
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Outcome of a tool call
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        result: ToolResult,
    },
}

impl Message {
    fn with_role(role: Role, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, MessageContent::Text(content.into()))
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, MessageContent::Text(content.into()))
    }

    /// Create an assistant message with content blocks
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::with_role(Role::Assistant, MessageContent::Blocks(blocks))
    }

    /// Create a tool observation message
    pub fn tool_observation(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: ToolResult,
    ) -> Self {
        Self::with_role(
            Role::Tool,
            MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                tool_name: tool_name.into(),
                result,
            }]),
        )
    }

    /// Create a corrective directive
    pub fn corrective(content: impl Into<String>) -> Self {
        Self::with_role(Role::Corrective, MessageContent::Text(content.into()))
    }

    /// Concatenated text content, empty when the message only carries tool blocks
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Tool calls carried by this message as `(id, name, input)`
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.as_str(), name.as_str(), input))
                    }
                    _ => None,
                })
                .collect(),
        }
    }

    /// Check if this message requests tool calls
    pub fn has_tool_use(&self) -> bool {
        !self.tool_uses().is_empty()
    }

    /// Tool results carried by this message as `(tool_use_id, tool_name, result)`
    pub fn tool_results(&self) -> Vec<(&str, &str, &ToolResult)> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolResult {
                        tool_use_id,
                        tool_name,
                        result,
                    } => Some((tool_use_id.as_str(), tool_name.as_str(), result)),
                    _ => None,
                })
                .collect(),
        }
    }
}
