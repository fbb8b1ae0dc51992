// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-turn diagnostics
//!
//! [`TurnTrace`] collects what the guardrails did during one turn (selection,
//! retries, grounding verdicts, regeneration). [`debug_trace`] flattens the
//! turn's messages for display. Neither is persisted.

use serde::Serialize;
use serde_json::Value;

use crate::llm::message::{Message, Role};

/// Which part of the turn produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    ToolSelector,
    ModelRetry,
    ToolRetry,
    Grounding,
    Regeneration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Success,
    Recovered,
    Failed,
    Passed,
    Error,
    Skipped,
    Regenerated,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub component: Component,
    pub status: EventStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Ordered events for one turn
#[derive(Debug, Default)]
pub struct TurnTrace {
    events: Vec<TraceEvent>,
}

impl TurnTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, component: Component, status: EventStatus, message: impl Into<String>) {
        self.push(component, status, message.into(), None);
    }

    pub fn record_with(
        &mut self,
        component: Component,
        status: EventStatus,
        message: impl Into<String>,
        details: Value,
    ) {
        self.push(component, status, message.into(), Some(details));
    }

    fn push(
        &mut self,
        component: Component,
        status: EventStatus,
        message: String,
        details: Option<Value>,
    ) {
        self.events.push(TraceEvent {
            component,
            status,
            message,
            details,
        });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Whether an event with this component and status was recorded
    pub fn has(&self, component: Component, status: EventStatus) -> bool {
        self.events
            .iter()
            .any(|e| e.component == component && e.status == status)
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

/// One displayable line of the turn's transcript
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DebugEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<DebugToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DebugToolCall {
    pub name: String,
    pub args: Value,
}

impl DebugEntry {
    fn plain(kind: &str, content: String) -> Self {
        Self {
            kind: kind.to_string(),
            content,
            tool_calls: None,
            reasoning: None,
            tool_name: None,
        }
    }
}

/// Flatten messages into display entries, one per message (one per result
/// for tool observations)
pub fn debug_trace(messages: &[Message]) -> Vec<DebugEntry> {
    let mut entries = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::User => entries.push(DebugEntry::plain("user", message.text())),
            Role::Corrective => entries.push(DebugEntry::plain("corrective", message.text())),
            Role::Assistant => {
                let text = message.text();
                let calls: Vec<DebugToolCall> = message
                    .tool_uses()
                    .into_iter()
                    .map(|(_, name, input)| DebugToolCall {
                        name: name.to_string(),
                        args: input.clone(),
                    })
                    .collect();

                let mut entry = DebugEntry::plain("assistant", text.clone());
                if !calls.is_empty() {
                    entry.tool_calls = Some(calls);
                    if !text.trim().is_empty() {
                        entry.reasoning = Some(text);
                    }
                }
                entries.push(entry);
            }
            Role::Tool => {
                for (_, tool_name, result) in message.tool_results() {
                    let content = serde_json::to_string(result).unwrap_or_default();
                    let mut entry = DebugEntry::plain("tool", content);
                    entry.tool_name = Some(tool_name.to_string());
                    entries.push(entry);
                }
            }
        }
    }

    entries
}
