// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Bounded regeneration after a failed grounding check
//!
//! At most one extra reasoning pass per turn. The second answer is returned
//! as-is, without another verification.

use serde_json::json;

use crate::llm::message::Message;
use crate::tools::ToolSelection;

use super::prompts::{render, CORRECTIVE_DIRECTIVE};
use super::react::{LoopOutcome, ReasoningLoop};
use super::trace::{Component, EventStatus, TurnTrace};
use super::verifier::Verdict;

/// Upper bound on regenerations regardless of configuration
pub const REGENERATION_CEILING: u32 = 1;

/// Answer chosen for the turn plus the messages to persist after the user's
#[derive(Debug, Clone)]
pub struct Resolution {
    pub answer: String,
    pub messages: Vec<Message>,
    pub regenerated: bool,
}

impl Resolution {
    /// Accept a loop outcome unchanged
    pub fn accept(outcome: LoopOutcome) -> Self {
        Self {
            answer: outcome.answer,
            messages: outcome.messages,
            regenerated: false,
        }
    }
}

/// Per-turn regeneration state
#[derive(Debug)]
pub struct RegenerationController {
    limit: u32,
    attempts: u32,
}

impl RegenerationController {
    pub fn new(max_regenerations: u32) -> Self {
        Self {
            limit: max_regenerations.min(REGENERATION_CEILING),
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn can_regenerate(&self) -> bool {
        self.attempts < self.limit
    }

    /// Resolve the turn's answer from the first pass and its verdict.
    ///
    /// `context` is what the first pass ran over (history plus the user
    /// message). If the second pass fails the first answer is kept.
    pub async fn maybe_regenerate(
        &mut self,
        verdict: Verdict,
        first: LoopOutcome,
        context: &[Message],
        selection: &ToolSelection,
        reasoning: &ReasoningLoop,
        trace: &mut TurnTrace,
    ) -> Resolution {
        let reason = match verdict {
            Verdict::Pass => return Resolution::accept(first),
            Verdict::Fail { reason } => reason,
        };

        if !self.can_regenerate() {
            trace.record(
                Component::Regeneration,
                EventStatus::Skipped,
                "regeneration budget used, keeping answer",
            );
            return Resolution::accept(first);
        }
        self.attempts += 1;

        let corrective = Message::corrective(corrective_directive(&reason));
        let mut second_context = Vec::with_capacity(context.len() + first.messages.len() + 1);
        second_context.extend_from_slice(context);
        second_context.extend(first.messages.iter().cloned());
        second_context.push(corrective.clone());

        tracing::info!(
            target: "travel.agent.turn",
            reason = %reason,
            "regenerating answer"
        );

        match reasoning.run(&second_context, selection, trace).await {
            Ok(second) => {
                trace.record_with(
                    Component::Regeneration,
                    EventStatus::Regenerated,
                    "answer regenerated after failed grounding check",
                    json!({ "reason": reason }),
                );
                let mut messages = first.messages;
                messages.push(corrective);
                messages.extend(second.messages);
                Resolution {
                    answer: second.answer,
                    messages,
                    regenerated: true,
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: "travel.agent.turn",
                    error = %e,
                    "regeneration failed, keeping first answer"
                );
                trace.record(
                    Component::Regeneration,
                    EventStatus::Fallback,
                    format!("regeneration failed, keeping first answer: {}", e),
                );
                Resolution::accept(first)
            }
        }
    }
}

pub fn corrective_directive(reason: &str) -> String {
    render(CORRECTIVE_DIRECTIVE, &[("reason", reason)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::Role;
    use crate::llm::mock_provider::{MockFailure, MockProvider};
    use crate::llm::retry::RetryConfig;
    use crate::tools::executor::ToolExecutor;
    use crate::tools::ToolRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    fn reasoning(provider: MockProvider) -> ReasoningLoop {
        let retry = RetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
            jitter: 0.0,
        };
        let executor = Arc::new(ToolExecutor::new(
            Arc::new(ToolRegistry::new()),
            retry.clone(),
            Duration::from_secs(1),
        ));
        ReasoningLoop::new(Arc::new(provider), "m", "sys", retry, executor)
    }

    fn first_pass(answer: &str) -> LoopOutcome {
        LoopOutcome {
            answer: answer.to_string(),
            messages: vec![Message::assistant(answer)],
            observations: Vec::new(),
            iterations: 0,
            hit_iteration_cap: false,
        }
    }

    fn fail() -> Verdict {
        Verdict::Fail {
            reason: "made up a price".to_string(),
        }
    }

    #[test]
    fn test_limit_is_clamped() {
        assert!(!RegenerationController::new(0).can_regenerate());
        let mut controller = RegenerationController::new(5);
        assert!(controller.can_regenerate());
        controller.attempts = 1;
        assert!(!controller.can_regenerate());
    }

    #[test]
    fn test_corrective_directive_carries_reason() {
        let text = corrective_directive("invented 30°C");
        assert!(text.contains("Issue: invented 30°C."));
        assert!(text.contains("(4)"));
    }

    #[tokio::test]
    async fn test_pass_keeps_first_answer() {
        let provider = MockProvider::new().with_response("unused");
        let mut controller = RegenerationController::new(1);
        let mut trace = TurnTrace::new();

        let resolution = controller
            .maybe_regenerate(
                Verdict::Pass,
                first_pass("first"),
                &[Message::user("q")],
                &ToolSelection::empty(),
                &reasoning(provider.clone()),
                &mut trace,
            )
            .await;

        assert_eq!(resolution.answer, "first");
        assert!(!resolution.regenerated);
        assert_eq!(provider.call_count(), 0);
        assert_eq!(controller.attempts(), 0);
    }

    #[tokio::test]
    async fn test_fail_regenerates_once_with_corrective() {
        let provider = MockProvider::new().with_response("second");
        let mut controller = RegenerationController::new(1);
        let mut trace = TurnTrace::new();

        let resolution = controller
            .maybe_regenerate(
                fail(),
                first_pass("first"),
                &[Message::user("q")],
                &ToolSelection::empty(),
                &reasoning(provider.clone()),
                &mut trace,
            )
            .await;

        assert_eq!(resolution.answer, "second");
        assert!(resolution.regenerated);
        assert_eq!(controller.attempts(), 1);
        let roles: Vec<Role> = resolution.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::Corrective, Role::Assistant]);
        assert!(trace.has(Component::Regeneration, EventStatus::Regenerated));

        // The second pass saw the first answer followed by the directive
        let request = provider.last_request().unwrap();
        let last = request.messages.last().unwrap();
        assert_eq!(last.role, Role::Corrective);
        assert!(last.text().contains("made up a price"));
    }

    #[tokio::test]
    async fn test_budget_exhausted_keeps_answer() {
        let provider = MockProvider::new().with_response("never");
        let mut controller = RegenerationController::new(1);
        let mut trace = TurnTrace::new();
        let loop_ = reasoning(provider.clone());

        controller
            .maybe_regenerate(
                fail(),
                first_pass("a"),
                &[],
                &ToolSelection::empty(),
                &loop_,
                &mut trace,
            )
            .await;
        let resolution = controller
            .maybe_regenerate(
                fail(),
                first_pass("b"),
                &[],
                &ToolSelection::empty(),
                &loop_,
                &mut trace,
            )
            .await;

        assert_eq!(resolution.answer, "b");
        assert_eq!(provider.call_count(), 1);
        assert!(trace.has(Component::Regeneration, EventStatus::Skipped));
    }

    #[tokio::test]
    async fn test_second_pass_failure_falls_back() {
        let provider = MockProvider::new().then_failure(MockFailure::AuthenticationFailed);
        let mut controller = RegenerationController::new(1);
        let mut trace = TurnTrace::new();

        let resolution = controller
            .maybe_regenerate(
                fail(),
                first_pass("first"),
                &[Message::user("q")],
                &ToolSelection::empty(),
                &reasoning(provider),
                &mut trace,
            )
            .await;

        assert_eq!(resolution.answer, "first");
        assert!(!resolution.regenerated);
        assert_eq!(resolution.messages.len(), 1);
        assert!(trace.has(Component::Regeneration, EventStatus::Fallback));
    }
}
