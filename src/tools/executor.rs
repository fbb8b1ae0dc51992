// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool execution engine
//!
//! Enforces the turn's tool selection, bounds each attempt with a timeout,
//! and runs invocations through the backoff executor. Like the tools it
//! drives, it never returns an error: every outcome is a [`ToolResult`].

use std::sync::Arc;
use std::time::Duration;

use crate::llm::provider::ToolCall;
use crate::llm::retry::{self, RetryConfig};

use super::{ToolErrorKind, ToolFailure, ToolRegistry, ToolResult, ToolSelection};

/// Result of one tool call after retries
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub result: ToolResult,
    /// Attempts made; zero when the call was rejected without running
    pub attempts: u32,
}

/// Tool executor that applies selection, timeout, and retry policy
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl ToolExecutor {
    /// Create a new executor
    pub fn new(registry: Arc<ToolRegistry>, retry: RetryConfig, call_timeout: Duration) -> Self {
        Self {
            registry,
            retry,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a tool call requested by the model
    pub async fn invoke(&self, call: &ToolCall, selection: &ToolSelection) -> ToolInvocation {
        if !selection.contains(&call.name) {
            tracing::warn!(
                target: "travel.tools",
                tool = %call.name,
                "model requested a tool outside this turn's selection"
            );
            return ToolInvocation {
                result: ToolResult::failure(
                    ToolErrorKind::NotPermitted,
                    format!("Tool '{}' is not available for this request", call.name),
                ),
                attempts: 0,
            };
        }

        let Some(tool) = self.registry.get(&call.name).cloned() else {
            return ToolInvocation {
                result: ToolResult::failure(
                    ToolErrorKind::NotFound,
                    format!("Unknown tool: {}", call.name),
                ),
                attempts: 0,
            };
        };

        let call_timeout = self.call_timeout;
        let report = retry::run(
            || {
                let tool = tool.clone();
                let arguments = call.arguments.clone();
                async move {
                    match tokio::time::timeout(call_timeout, tool.invoke(&arguments)).await {
                        Ok(result) => result.into_result(),
                        Err(_) => Err(ToolFailure::new(
                            ToolErrorKind::Timeout,
                            format!("Tool did not finish within {}s", call_timeout.as_secs()),
                        )),
                    }
                }
            },
            &self.retry,
            &call.name,
        )
        .await;

        let attempts = report.attempts;
        let result = match report.outcome {
            Ok(data) => ToolResult::success(data),
            Err(failure) => failure.into(),
        };

        tracing::debug!(
            target: "travel.tools",
            tool = %call.name,
            attempts,
            failed = result.is_failure(),
            "tool call finished"
        );

        ToolInvocation { result, attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ToolDefinition;
    use crate::tools::{SchemaBuilder, Tool};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with `kind` for the first `failures` calls, then succeeds
    struct FlakyTool {
        kind: ToolErrorKind,
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyTool {
        fn new(kind: ToolErrorKind, failures: u32) -> Self {
            Self {
                kind,
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "flaky".to_string(),
                description: "Flaky test tool".to_string(),
                input_schema: SchemaBuilder::new().build(),
            }
        }

        async fn invoke(&self, _arguments: &Value) -> ToolResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                ToolResult::failure(self.kind, "flaky failure")
            } else {
                ToolResult::success(json!({"ok": true}))
            }
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow".to_string(),
                description: "Never finishes in time".to_string(),
                input_schema: SchemaBuilder::new().build(),
            }
        }

        async fn invoke(&self, _arguments: &Value) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ToolResult::success(json!({}))
        }
    }

    fn executor_with(tool: Arc<dyn Tool>, max_attempts: u32) -> (ToolExecutor, ToolSelection) {
        let mut registry = ToolRegistry::new();
        registry.register(tool);
        let selection = registry.select_all();
        let retry = RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: 0.0,
        };
        (
            ToolExecutor::new(Arc::new(registry), retry, Duration::from_millis(50)),
            selection,
        )
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let tool = Arc::new(FlakyTool::new(ToolErrorKind::UpstreamUnavailable, 1));
        let (executor, selection) = executor_with(tool.clone(), 2);

        let invocation = executor.invoke(&call("flaky"), &selection).await;
        assert!(!invocation.result.is_failure());
        assert_eq!(invocation.attempts, 2);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let tool = Arc::new(FlakyTool::new(ToolErrorKind::NotFound, 5));
        let (executor, selection) = executor_with(tool.clone(), 2);

        let invocation = executor.invoke(&call("flaky"), &selection).await;
        assert_eq!(invocation.result.error_kind(), Some(ToolErrorKind::NotFound));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_failure() {
        let tool = Arc::new(FlakyTool::new(ToolErrorKind::Timeout, 10));
        let (executor, selection) = executor_with(tool.clone(), 2);

        let invocation = executor.invoke(&call("flaky"), &selection).await;
        assert_eq!(invocation.result.error_kind(), Some(ToolErrorKind::Timeout));
        assert_eq!(invocation.attempts, 2);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tool_outside_selection_is_rejected() {
        let tool = Arc::new(FlakyTool::new(ToolErrorKind::Timeout, 0));
        let (executor, _) = executor_with(tool.clone(), 2);

        let invocation = executor.invoke(&call("flaky"), &ToolSelection::empty()).await;
        assert_eq!(
            invocation.result.error_kind(),
            Some(ToolErrorKind::NotPermitted)
        );
        assert_eq!(invocation.attempts, 0);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_selected_but_unregistered_tool() {
        let tool = Arc::new(FlakyTool::new(ToolErrorKind::Timeout, 0));
        let (executor, _) = executor_with(tool, 2);

        let selection = ToolSelection::from_names(["ghost"]);
        let invocation = executor.invoke(&call("ghost"), &selection).await;
        assert_eq!(invocation.result.error_kind(), Some(ToolErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_per_attempt_timeout_becomes_timeout_failure() {
        let (executor, selection) = executor_with(Arc::new(SlowTool), 2);

        let invocation = executor.invoke(&call("slow"), &selection).await;
        assert_eq!(invocation.result.error_kind(), Some(ToolErrorKind::Timeout));
        assert_eq!(invocation.attempts, 2);
    }
}
