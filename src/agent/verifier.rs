// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Grounding verification
//!
//! A judge model compares the answer with the turn's tool observations and
//! replies PASS or FAIL. The judge is advisory: if it cannot be reached or
//! says something else, the answer is accepted and the problem is recorded.

use serde_json::json;
use std::sync::Arc;

use crate::llm::message::{Message, Role};
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::llm::retry::{self, RetryConfig};

use super::prompts::{render, NO_TOOL_RESULTS};
use super::react::Observation;
use super::trace::{Component, EventStatus, TurnTrace};

const DEFAULT_FAIL_REASON: &str = "ungrounded content detected";
const SUMMARY_LINES: usize = 10;
const ASSISTANT_PREVIEW_CHARS: usize = 100;
const JUDGE_MAX_TOKENS: u32 = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { reason: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

pub struct GroundingVerifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
    prompt: String,
    retry: RetryConfig,
}

impl GroundingVerifier {
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

    /// Judge `answer` against `observations`.
    ///
    /// `context` is the conversation the answer responds to. Always returns a
    /// verdict; judge problems resolve to [`Verdict::Pass`].
    pub async fn verify(
        &self,
        answer: &str,
        observations: &[Observation],
        context: &[Message],
        trace: &mut TurnTrace,
    ) -> Verdict {
        if answer.trim().is_empty() {
            trace.record(Component::Grounding, EventStatus::Skipped, "empty answer");
            return Verdict::Pass;
        }

        let summary = summarize_conversation(context);
        let rendered_observations = format_observations(observations);
        let prompt = render(
            &self.prompt,
            &[
                ("conversation_summary", &summary),
                ("tool_observations", &rendered_observations),
                ("response", answer),
            ],
        );

        let request = CompletionRequest::new(self.model.clone(), vec![Message::user(prompt)])
            .with_max_tokens(JUDGE_MAX_TOKENS)
            .with_temperature(0.0);

        let provider = self.provider.clone();
        let report = retry::run(
            || {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.complete(request).await }
            },
            &self.retry,
            "grounding_judge",
        )
        .await;

        let raw = match report.into_result() {
            Ok(response) => response.text(),
            Err(e) => {
                tracing::warn!(
                    target: "travel.agent.verifier",
                    error = %e,
                    "grounding judge unavailable, accepting answer"
                );
                trace.record(
                    Component::Grounding,
                    EventStatus::Error,
                    format!("judge call failed, answer accepted: {}", e),
                );
                return Verdict::Pass;
            }
        };

        match parse_verdict(&raw) {
            Some(Verdict::Pass) => {
                tracing::debug!(target: "travel.agent.verifier", "grounding check passed");
                trace.record(Component::Grounding, EventStatus::Passed, "answer is grounded");
                Verdict::Pass
            }
            Some(Verdict::Fail { reason }) => {
                tracing::info!(
                    target: "travel.agent.verifier",
                    reason = %reason,
                    "grounding check failed"
                );
                trace.record_with(
                    Component::Grounding,
                    EventStatus::Failed,
                    reason.clone(),
                    json!({ "observations": observations.len() }),
                );
                Verdict::Fail { reason }
            }
            None => {
                tracing::warn!(
                    target: "travel.agent.verifier",
                    output = %raw,
                    "unrecognized judge output, accepting answer"
                );
                trace.record_with(
                    Component::Grounding,
                    EventStatus::Error,
                    "unrecognized judge output, answer accepted",
                    json!({ "output": raw }),
                );
                Verdict::Pass
            }
        }
    }
}

/// Interpret the judge's reply. `None` when it is neither PASS nor FAIL.
pub fn parse_verdict(raw: &str) -> Option<Verdict> {
    let trimmed = raw.trim().trim_start_matches(['*', '`', '#', ' ']);
    let upper = trimmed.to_ascii_uppercase();

    if upper.starts_with("PASS") {
        return Some(Verdict::Pass);
    }
    if upper.starts_with("FAIL") {
        let reason = trimmed
            .split_once(':')
            .map(|(_, rest)| rest.trim().trim_end_matches(['*', '`']).trim())
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_FAIL_REASON);
        return Some(Verdict::Fail {
            reason: reason.to_string(),
        });
    }
    None
}

/// Last few lines of conversation for the judge.
///
/// Tool observations are rendered separately and corrective directives are
/// internal, so neither appears here.
pub fn summarize_conversation(context: &[Message]) -> String {
    let lines: Vec<String> = context
        .iter()
        .filter_map(|m| match m.role {
            Role::User => Some(format!("User: {}", m.text())),
            Role::Assistant if m.has_tool_use() => {
                let calls: Vec<&str> = m.tool_uses().into_iter().map(|(_, name, _)| name).collect();
                Some(format!("Assistant: [called tools: {}]", calls.join(", ")))
            }
            Role::Assistant => Some(format!("Assistant: {}", preview(&m.text()))),
            Role::Tool | Role::Corrective => None,
        })
        .collect();

    let skip = lines.len().saturating_sub(SUMMARY_LINES);
    lines[skip..].join("\n")
}

fn preview(text: &str) -> String {
    if text.chars().count() <= ASSISTANT_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(ASSISTANT_PREVIEW_CHARS).collect();
    format!("{}...", head)
}

/// One `[tool_name]: <result json>` line per observation
pub fn format_observations(observations: &[Observation]) -> String {
    if observations.is_empty() {
        return NO_TOOL_RESULTS.to_string();
    }
    observations
        .iter()
        .map(|o| {
            let body = serde_json::to_string(&o.result).unwrap_or_default();
            format!("[{}]: {}", o.tool_name, body)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
