// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool selection
//!
//! One classifier call per turn decides which registered tools the reasoning
//! loop may see. Any problem with that call (transport failure, unparseable
//! output, unknown names) degrades to offering every registered tool.

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

use crate::llm::message::Message;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::llm::retry::{self, RetryConfig};
use crate::tools::{ToolRegistry, ToolSelection};

use super::prompts::render;
use super::trace::{Component, EventStatus, TurnTrace};

const SELECTOR_MAX_TOKENS: u32 = 64;

pub struct ToolSelector {
    provider: Arc<dyn LlmProvider>,
    model: String,
    prompt: String,
    retry: RetryConfig,
}

impl ToolSelector {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            prompt: prompt.into(),
            retry,
        }
    }

    /// Choose the tools for a turn. Never fails.
    pub async fn select(
        &self,
        latest_user_message: &str,
        today: NaiveDate,
        registry: &ToolRegistry,
        trace: &mut TurnTrace,
    ) -> ToolSelection {
        if registry.is_empty() {
            trace.record(
                Component::ToolSelector,
                EventStatus::Skipped,
                "no tools registered",
            );
            return ToolSelection::empty();
        }

        let tool_list = registry
            .definitions()
            .iter()
            .map(|d| format!("- {}: {}", d.name, d.description))
            .collect::<Vec<_>>()
            .join("\n");
        let today = today.format("%Y-%m-%d").to_string();
        let system = render(&self.prompt, &[("today", &today), ("tools", &tool_list)]);

        let request = CompletionRequest::new(
            self.model.clone(),
            vec![Message::user(latest_user_message)],
        )
        .with_system(system)
        .with_max_tokens(SELECTOR_MAX_TOKENS)
        .with_temperature(0.0);

        let provider = self.provider.clone();
        let report = retry::run(
            || {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.complete(request).await }
            },
            &self.retry,
            "tool_selector",
        )
        .await;

        let raw = match report.into_result() {
            Ok(response) => response.text(),
            Err(e) => {
                tracing::warn!(
                    target: "travel.agent.selector",
                    error = %e,
                    "selector call failed, offering all tools"
                );
                trace.record(
                    Component::ToolSelector,
                    EventStatus::Error,
                    format!("selector call failed, offering all tools: {}", e),
                );
                return registry.select_all();
            }
        };

        let Some(names) = parse_selection(&raw) else {
            tracing::warn!(
                target: "travel.agent.selector",
                output = %raw,
                "unparseable selector output, offering all tools"
            );
            trace.record_with(
                Component::ToolSelector,
                EventStatus::Error,
                "could not parse selector output, offering all tools",
                json!({ "output": raw }),
            );
            return registry.select_all();
        };

        if let Some(unknown) = names.iter().find(|n| !registry.contains(n)) {
            tracing::warn!(
                target: "travel.agent.selector",
                tool = %unknown,
                "selector named an unknown tool, offering all tools"
            );
            trace.record_with(
                Component::ToolSelector,
                EventStatus::Error,
                format!("unknown tool '{}', offering all tools", unknown),
                json!({ "output": raw }),
            );
            return registry.select_all();
        }

        let selection = ToolSelection::from_names(&names);
        tracing::debug!(
            target: "travel.agent.selector",
            tools = ?selection.names(),
            "tools selected"
        );
        trace.record_with(
            Component::ToolSelector,
            EventStatus::Success,
            if selection.is_empty() {
                "no tools needed".to_string()
            } else {
                format!("selected {}", selection.names().join(", "))
            },
            json!({ "tools": selection.names() }),
        );
        selection
    }
}

/// Parse the classifier's reply as a JSON array of tool names.
///
/// Tolerates a markdown code fence and surrounding prose as long as exactly
/// one `[...]` span can be found.
pub fn parse_selection(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Vec<String>>(&trimmed[start..=end]).ok()
}
