// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system
//!
//! A [`Tool`] wraps one external capability behind a uniform contract:
//! `invoke(arguments) -> ToolResult`. Tools never return `Err`; every
//! reachable fault is shaped into [`ToolResult::Failure`] with a stable
//! [`ToolErrorKind`]. Retries are not a tool's concern; the
//! [`ToolExecutor`] wraps invocations in the backoff executor.

pub mod builtin;
pub mod definition;
pub mod executor;

pub use definition::*;
pub use executor::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::llm::provider::ToolDefinition;
use crate::llm::retry::Retryable;

/// Trait for tools the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool definition offered to the model
    fn definition(&self) -> ToolDefinition;

    /// Invoke the tool. Must not panic and never fails with an error type.
    async fn invoke(&self, arguments: &Value) -> ToolResult;
}

/// Stable failure classification for tool outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// The upstream did not answer in time
    Timeout,
    /// The input could not be resolved (e.g. unknown location)
    NotFound,
    /// Arguments missing or malformed
    InvalidArguments,
    /// Upstream reachable but refusing or failing (429, 5xx, connection reset)
    UpstreamUnavailable,
    /// The tool is not part of this turn's selection
    NotPermitted,
    /// Anything else
    Unexpected,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::Timeout => "timeout",
            ToolErrorKind::NotFound => "not_found",
            ToolErrorKind::InvalidArguments => "invalid_arguments",
            ToolErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ToolErrorKind::NotPermitted => "not_permitted",
            ToolErrorKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a tool invocation: exactly one of success or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToolResult {
    Success { data: Value },
    Failure { kind: ToolErrorKind, message: String },
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        ToolResult::Success { data }
    }

    pub fn failure(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        ToolResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolResult::Failure { .. })
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match self {
            ToolResult::Success { .. } => None,
            ToolResult::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Split into a `Result` for the backoff executor
    pub fn into_result(self) -> std::result::Result<Value, ToolFailure> {
        match self {
            ToolResult::Success { data } => Ok(data),
            ToolResult::Failure { kind, message } => Err(ToolFailure { kind, message }),
        }
    }
}

/// The failure half of a [`ToolResult`]
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Retryable for ToolFailure {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ToolErrorKind::Timeout | ToolErrorKind::UpstreamUnavailable
        )
    }
}

impl From<ToolFailure> for ToolResult {
    fn from(failure: ToolFailure) -> Self {
        ToolResult::Failure {
            kind: failure.kind,
            message: failure.message,
        }
    }
}

/// Tools eligible for one turn, decided before the reasoning loop starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSelection {
    names: BTreeSet<String>,
}

impl ToolSelection {
    /// No tools this turn
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

/// Registry of available tools
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Selection containing every registered tool
    pub fn select_all(&self) -> ToolSelection {
        ToolSelection::from_names(self.tools.keys().cloned())
    }

    /// Definitions for the tools in `selection`, sorted by name
    pub fn definitions_for(&self, selection: &ToolSelection) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| selection.contains(t.name()))
            .map(|t| t.definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Definitions for every registered tool, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions_for(&self.select_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echo input".to_string(),
                input_schema: SchemaBuilder::new().string("text", "Text", true).build(),
            }
        }

        async fn invoke(&self, arguments: &Value) -> ToolResult {
            ToolResult::success(arguments.clone())
        }
    }

    #[test]
    fn test_tool_result_serialization() {
        let ok = serde_json::to_value(ToolResult::success(json!({"days": []}))).unwrap();
        assert_eq!(ok["outcome"], "success");
        assert!(ok["data"]["days"].is_array());

        let err = serde_json::to_value(ToolResult::failure(
            ToolErrorKind::NotFound,
            "Could not find 'Atlantis'",
        ))
        .unwrap();
        assert_eq!(err["outcome"], "failure");
        assert_eq!(err["kind"], "not_found");
        assert!(err.get("data").is_none());
    }

    #[test]
    fn test_failure_retryability() {
        assert!(ToolFailure::new(ToolErrorKind::Timeout, "t").is_retryable());
        assert!(ToolFailure::new(ToolErrorKind::UpstreamUnavailable, "u").is_retryable());
        assert!(!ToolFailure::new(ToolErrorKind::NotFound, "n").is_retryable());
        assert!(!ToolFailure::new(ToolErrorKind::InvalidArguments, "i").is_retryable());
        assert!(!ToolFailure::new(ToolErrorKind::NotPermitted, "p").is_retryable());
        assert!(!ToolFailure::new(ToolErrorKind::Unexpected, "x").is_retryable());
    }

    #[test]
    fn test_into_result_round_trip_keeps_kind() {
        let failure = ToolResult::failure(ToolErrorKind::Timeout, "slow")
            .into_result()
            .unwrap_err();
        assert_eq!(ToolResult::from(failure).error_kind(), Some(ToolErrorKind::Timeout));
    }

    #[test]
    fn test_registry_definitions_filtered_by_selection() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        assert_eq!(registry.names(), vec!["echo".to_string()]);
        assert!(registry.definitions_for(&ToolSelection::empty()).is_empty());
        assert_eq!(registry.definitions_for(&registry.select_all()).len(), 1);
        assert_eq!(registry.definitions().len(), 1);
    }

    #[test]
    fn test_selection_contains() {
        let selection = ToolSelection::from_names(["get_weather_forecast"]);
        assert!(selection.contains("get_weather_forecast"));
        assert!(!selection.contains("book_flight"));
        assert!(!selection.is_empty());
        assert!(ToolSelection::empty().is_empty());
    }
}
