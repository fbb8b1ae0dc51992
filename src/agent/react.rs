// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! ReAct reasoning loop
//!
//! THINKING asks the model for its next action. ACTING runs the requested
//! tool calls and appends one observation per call. The loop ends in DONE
//! when the model answers without tool calls, or when the iteration cap is
//! reached.
//!
//! Model failures that survive the retry policy abort the loop. Tool
//! failures never do: they come back to the model as observations.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::llm::message::Message;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, NextAction, ToolCall, ToolDefinition,
};
use crate::llm::retry::{self, RetryConfig};
use crate::tools::executor::ToolExecutor;
use crate::tools::{ToolResult, ToolSelection};

use super::trace::{Component, EventStatus, TurnTrace};

/// Shown when a loop produced no usable text at all
pub const NO_ANSWER_FALLBACK: &str =
    "I'm sorry, I couldn't finish preparing an answer this time. Could you try asking again?";

/// A tool call and what it returned
#[derive(Debug, Clone)]
pub struct Observation {
    pub tool_name: String,
    pub arguments: Value,
    pub result: ToolResult,
}

/// Result of one loop invocation
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub answer: String,
    /// Messages produced by this invocation, in order, ending with the answer
    pub messages: Vec<Message>,
    pub observations: Vec<Observation>,
    /// Completed ACTING phases
    pub iterations: u32,
    pub hit_iteration_cap: bool,
}

#[derive(Debug)]
enum LoopState {
    Thinking,
    Acting(Vec<ToolCall>),
    Done(String),
}

pub struct ReasoningLoop {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    max_iterations: u32,
    max_tokens: u32,
    temperature: f32,
    retry: RetryConfig,
    executor: Arc<ToolExecutor>,
}

impl ReasoningLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        retry: RetryConfig,
        executor: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            max_iterations: 8,
            max_tokens: 2048,
            temperature: 0.3,
            retry,
            executor,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run the loop over `context`, which must end with the message being
    /// answered (a user message, or a corrective directive).
    pub async fn run(
        &self,
        context: &[Message],
        selection: &ToolSelection,
        trace: &mut TurnTrace,
    ) -> Result<LoopOutcome> {
        let tools = self.executor.registry().definitions_for(selection);
        let mut working = context.to_vec();
        let base = working.len();

        let mut observations = Vec::new();
        let mut iterations = 0u32;
        let mut last_text: Option<String> = None;
        let mut hit_iteration_cap = false;
        let mut state = LoopState::Thinking;

        loop {
            state = match state {
                LoopState::Thinking => {
                    let response = self.think(&working, &tools, trace).await?;
                    let action = response.next_action();

                    match action {
                        NextAction::Final { text } => LoopState::Done(text),
                        NextAction::CallTools { reasoning, calls } => {
                            if let Some(reasoning) = &reasoning {
                                last_text = Some(reasoning.clone());
                            }
                            let blocks = NextAction::CallTools {
                                reasoning,
                                calls: calls.clone(),
                            }
                            .to_blocks();
                            working.push(Message::assistant_blocks(blocks));
                            LoopState::Acting(calls)
                        }
                    }
                }
                LoopState::Acting(calls) => {
                    for call in &calls {
                        let result = self.act(call, selection, trace).await;
                        working.push(Message::tool_observation(
                            &call.id,
                            &call.name,
                            result.clone(),
                        ));
                        observations.push(Observation {
                            tool_name: call.name.clone(),
                            arguments: call.arguments.clone(),
                            result,
                        });
                    }
                    iterations += 1;

                    if iterations >= self.max_iterations {
                        tracing::warn!(
                            target: "travel.agent.react",
                            iterations,
                            "iteration cap reached"
                        );
                        hit_iteration_cap = true;
                        LoopState::Done(String::new())
                    } else {
                        LoopState::Thinking
                    }
                }
                LoopState::Done(text) => {
                    let answer = if text.trim().is_empty() {
                        last_text
                            .take()
                            .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string())
                    } else {
                        text
                    };
                    working.push(Message::assistant(answer.clone()));

                    tracing::debug!(
                        target: "travel.agent.react",
                        iterations,
                        observations = observations.len(),
                        "loop finished"
                    );

                    return Ok(LoopOutcome {
                        answer,
                        messages: working.split_off(base),
                        observations,
                        iterations,
                        hit_iteration_cap,
                    });
                }
            };
        }
    }

    async fn think(
        &self,
        working: &[Message],
        tools: &[ToolDefinition],
        trace: &mut TurnTrace,
    ) -> Result<CompletionResponse> {
        let request = CompletionRequest::new(self.model.clone(), working.to_vec())
            .with_system(self.system_prompt.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_tools(tools.to_vec());

        let provider = self.provider.clone();
        let report = retry::run(
            || {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.complete(request).await }
            },
            &self.retry,
            "model",
        )
        .await;

        let attempts = report.attempts;
        let recovered = report.recovered();
        match report.into_result() {
            Ok(response) => {
                if recovered {
                    trace.record_with(
                        Component::ModelRetry,
                        EventStatus::Recovered,
                        format!("model call succeeded after {} attempts", attempts),
                        json!({ "attempts": attempts }),
                    );
                }
                Ok(response)
            }
            Err(e) => {
                tracing::error!(
                    target: "travel.agent.react",
                    attempts,
                    error = %e,
                    "model call failed"
                );
                trace.record_with(
                    Component::ModelRetry,
                    EventStatus::Failed,
                    format!("model call failed: {}", e),
                    json!({ "attempts": attempts }),
                );
                Err(e)
            }
        }
    }

    async fn act(
        &self,
        call: &ToolCall,
        selection: &ToolSelection,
        trace: &mut TurnTrace,
    ) -> ToolResult {
        let invocation = self.executor.invoke(call, selection).await;
        let attempts = invocation.attempts;

        match &invocation.result {
            ToolResult::Success { .. } if attempts > 1 => {
                trace.record_with(
                    Component::ToolRetry,
                    EventStatus::Recovered,
                    format!("{} succeeded after {} attempts", call.name, attempts),
                    json!({ "tool": call.name, "attempts": attempts }),
                );
            }
            ToolResult::Success { .. } => {}
            ToolResult::Failure { kind, message } => {
                trace.record_with(
                    Component::ToolRetry,
                    EventStatus::Failed,
                    format!("{} failed: {}", call.name, message),
                    json!({ "tool": call.name, "kind": kind.as_str(), "attempts": attempts }),
                );
            }
        }

        invocation.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock_provider::{MockFailure, MockProvider, MockResponse, MockToolCall};
    use crate::llm::message::Role;
    use crate::tools::{SchemaBuilder, Tool, ToolErrorKind, ToolRegistry};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingTool {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "get_weather_forecast"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "get_weather_forecast".to_string(),
                description: "Forecast".to_string(),
                input_schema: SchemaBuilder::new().string("city", "City", true).build(),
            }
        }

        async fn invoke(&self, arguments: &Value) -> ToolResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ToolResult::success(json!({ "city": arguments["city"], "temp_max_c": 21.0 }))
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: 0.0,
        }
    }

    fn setup(provider: MockProvider) -> (ReasoningLoop, Arc<CountingTool>, ToolSelection) {
        let tool = Arc::new(CountingTool {
            calls: AtomicU32::new(0),
        });
        let mut registry = ToolRegistry::new();
        registry.register(tool.clone());
        let selection = registry.select_all();
        let executor = Arc::new(ToolExecutor::new(
            Arc::new(registry),
            fast(),
            Duration::from_secs(1),
        ));
        let reasoning = ReasoningLoop::new(Arc::new(provider), "test-model", "be helpful", fast(), executor)
            .with_max_iterations(3);
        (reasoning, tool, selection)
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let provider = MockProvider::new().with_response("Pack layers.");
        let (reasoning, tool, selection) = setup(provider.clone());
        let mut trace = TurnTrace::new();

        let outcome = reasoning
            .run(&[Message::user("Packing tips?")], &selection, &mut trace)
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Pack layers.");
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.messages[0].role, Role::Assistant);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);

        let request = provider.last_request().unwrap();
        assert_eq!(request.system.as_deref(), Some("be helpful"));
        assert_eq!(request.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_then_answer() {
        let provider = MockProvider::new()
            .then_tool_call("get_weather_forecast", json!({"city": "Paris"}))
            .then_text("Paris will reach 21°C.");
        let (reasoning, tool, selection) = setup(provider.clone());
        let mut trace = TurnTrace::new();

        let outcome = reasoning
            .run(&[Message::user("Paris tomorrow?")], &selection, &mut trace)
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Paris will reach 21°C.");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.observations.len(), 1);
        assert_eq!(outcome.observations[0].arguments["city"], "Paris");
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);

        let roles: Vec<Role> = outcome.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::Tool, Role::Assistant]);

        // The second model call sees the observation
        let second = &provider.recorded_requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[2].role, Role::Tool);
    }

    #[tokio::test]
    async fn test_parallel_calls_each_get_an_observation() {
        let provider = MockProvider::new().with_responses(vec![
            MockResponse::ToolCalls {
                text: "Comparing both.".to_string(),
                calls: vec![
                    MockToolCall {
                        id: "a".to_string(),
                        name: "get_weather_forecast".to_string(),
                        input: json!({"city": "Rome"}),
                    },
                    MockToolCall {
                        id: "b".to_string(),
                        name: "get_weather_forecast".to_string(),
                        input: json!({"city": "Milan"}),
                    },
                ],
            },
            MockResponse::text("Rome and Milan look similar."),
        ]);
        let (reasoning, tool, selection) = setup(provider);
        let mut trace = TurnTrace::new();

        let outcome = reasoning
            .run(&[Message::user("Rome or Milan?")], &selection, &mut trace)
            .await
            .unwrap();

        assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.observations.len(), 2);
        let ids: Vec<String> = outcome.messages[1..3]
            .iter()
            .flat_map(|m| m.tool_results().into_iter().map(|(id, _, _)| id.to_string()))
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_iteration_cap_uses_last_text() {
        let provider = MockProvider::new().with_responses(vec![MockResponse::ToolCalls {
            text: "Still checking the forecast.".to_string(),
            calls: vec![MockToolCall {
                id: "loop".to_string(),
                name: "get_weather_forecast".to_string(),
                input: json!({"city": "Oslo"}),
            }],
        }]);
        let (reasoning, tool, selection) = setup(provider.clone());
        let mut trace = TurnTrace::new();

        let outcome = reasoning
            .run(&[Message::user("Oslo?")], &selection, &mut trace)
            .await
            .unwrap();

        assert!(outcome.hit_iteration_cap);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.answer, "Still checking the forecast.");
    }

    #[tokio::test]
    async fn test_iteration_cap_without_text_uses_fallback() {
        let provider =
            MockProvider::new().then_tool_call("get_weather_forecast", json!({"city": "Oslo"}));
        let (reasoning, _, selection) = setup(provider);
        let mut trace = TurnTrace::new();

        let outcome = reasoning
            .run(&[Message::user("Oslo?")], &selection, &mut trace)
            .await
            .unwrap();
        assert_eq!(outcome.answer, NO_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn test_blank_final_answer_uses_fallback() {
        let provider = MockProvider::new().with_response("");
        let (reasoning, _, selection) = setup(provider);
        let mut trace = TurnTrace::new();

        let outcome = reasoning
            .run(&[Message::user("Hi")], &selection, &mut trace)
            .await
            .unwrap();
        assert_eq!(outcome.answer, NO_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn test_unselected_tool_becomes_not_permitted_observation() {
        let provider = MockProvider::new()
            .then_tool_call("get_weather_forecast", json!({"city": "Paris"}))
            .then_text("I can't check live weather right now.");
        let (reasoning, tool, _) = setup(provider);
        let mut trace = TurnTrace::new();

        let outcome = reasoning
            .run(&[Message::user("Paris?")], &ToolSelection::empty(), &mut trace)
            .await
            .unwrap();

        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            outcome.observations[0].result.error_kind(),
            Some(ToolErrorKind::NotPermitted)
        );
        assert!(trace.has(Component::ToolRetry, EventStatus::Failed));
    }

    #[tokio::test]
    async fn test_transient_model_failure_is_recovered() {
        let provider = MockProvider::new()
            .then_failure(MockFailure::ServerError(502))
            .then_text("Recovered answer.");
        let (reasoning, _, selection) = setup(provider.clone());
        let mut trace = TurnTrace::new();

        let outcome = reasoning
            .run(&[Message::user("Hi")], &selection, &mut trace)
            .await
            .unwrap();
        assert_eq!(outcome.answer, "Recovered answer.");
        assert_eq!(provider.call_count(), 2);
        assert!(trace.has(Component::ModelRetry, EventStatus::Recovered));
    }

    #[tokio::test]
    async fn test_exhausted_model_retries_abort_the_loop() {
        let provider = MockProvider::new().then_failure(MockFailure::Timeout);
        let (reasoning, _, selection) = setup(provider.clone());
        let mut trace = TurnTrace::new();

        let result = reasoning
            .run(&[Message::user("Hi")], &selection, &mut trace)
            .await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), 3);
        assert!(trace.has(Component::ModelRetry, EventStatus::Failed));
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let provider = MockProvider::new().then_failure(MockFailure::AuthenticationFailed);
        let (reasoning, _, selection) = setup(provider.clone());
        let mut trace = TurnTrace::new();

        assert!(reasoning
            .run(&[Message::user("Hi")], &selection, &mut trace)
            .await
            .is_err());
        assert_eq!(provider.call_count(), 1);
    }
}
