// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Replays a scripted sequence of responses and records every request, so
//! agent tests can drive the selector, the reasoning loop, and the judge
//! without making real API calls. Once the script runs out the last entry
//! repeats.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ApiError, Result, TravelError};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentBlockResponse, LlmProvider, StopReason, Usage,
};

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    /// Provider name
    name: String,
    /// Scripted responses
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

/// A scripted response for the mock provider
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Plain text answer
    Text(String),
    /// Tool calls, optionally with reasoning text
    ToolCalls {
        text: String,
        calls: Vec<MockToolCall>,
    },
    /// A failed call
    Failure(MockFailure),
}

/// A mock tool call
#[derive(Clone, Debug)]
pub struct MockToolCall {
    /// Tool call ID
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool input (JSON)
    pub input: serde_json::Value,
}

/// Failures the mock can produce
#[derive(Clone, Copy, Debug)]
pub enum MockFailure {
    Timeout,
    RateLimited,
    ServerError(u16),
    AuthenticationFailed,
}

impl MockFailure {
    fn to_error(self) -> TravelError {
        let api = match self {
            MockFailure::Timeout => ApiError::Timeout,
            MockFailure::RateLimited => ApiError::RateLimited(1),
            MockFailure::ServerError(status) => ApiError::ServerError {
                status,
                message: "mock server error".to_string(),
            },
            MockFailure::AuthenticationFailed => ApiError::AuthenticationFailed,
        };
        TravelError::Api(api)
    }
}

impl MockResponse {
    /// A plain text response
    pub fn text(text: impl Into<String>) -> Self {
        MockResponse::Text(text.into())
    }

    /// A single tool call response
    pub fn tool_call(name: impl Into<String>, input: serde_json::Value) -> Self {
        MockResponse::ToolCalls {
            text: String::new(),
            calls: vec![MockToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                name: name.into(),
                input,
            }],
        }
    }

    fn into_completion(self, model: &str) -> Result<CompletionResponse> {
        let (content, stop_reason) = match self {
            MockResponse::Text(text) => {
                let content = if text.is_empty() {
                    Vec::new()
                } else {
                    vec![ContentBlockResponse::Text { text }]
                };
                (content, StopReason::EndTurn)
            }
            MockResponse::ToolCalls { text, calls } => {
                let mut content = Vec::new();
                if !text.is_empty() {
                    content.push(ContentBlockResponse::Text { text });
                }
                content.extend(calls.into_iter().map(|c| ContentBlockResponse::ToolUse {
                    id: c.id,
                    name: c.name,
                    input: c.input,
                }));
                (content, StopReason::ToolUse)
            }
            MockResponse::Failure(failure) => return Err(failure.to_error()),
        };

        Ok(CompletionResponse {
            id: format!("mock_{}", uuid::Uuid::new_v4().simple()),
            model: model.to_string(),
            content,
            stop_reason: Some(stop_reason),
            usage: Usage::default(),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider with an empty script
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock provider with a custom name
    pub fn with_name(name: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.name = name.into();
        provider
    }

    /// Replace the script with a single text response
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_responses(vec![MockResponse::text(text)])
    }

    /// Replace the script (returned in order)
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        {
            let mut script = lock(&self.responses);
            script.clear();
            script.extend(responses);
        }
        self
    }

    /// Append a text response to the script
    pub fn then_text(self, text: impl Into<String>) -> Self {
        lock(&self.responses).push(MockResponse::text(text));
        self
    }

    /// Append a tool call to the script
    pub fn then_tool_call(self, name: impl Into<String>, input: serde_json::Value) -> Self {
        lock(&self.responses).push(MockResponse::tool_call(name, input));
        self
    }

    /// Append a failure to the script
    pub fn then_failure(self, failure: MockFailure) -> Self {
        lock(&self.responses).push(MockResponse::Failure(failure));
        self
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        lock(&self.recorded_requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    fn next_response(&self) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        if responses.is_empty() {
            MockResponse::Text(String::new())
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.clone();
        lock(&self.recorded_requests).push(request);
        self.next_response().into_completion(&model)
    }
}
