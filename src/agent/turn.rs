// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn orchestration
//!
//! One turn: lock the session, load history, select tools, run the reasoning
//! loop, verify grounding, maybe regenerate once, then append everything the
//! turn produced in a single write. A turn that errors (or is dropped before
//! the write) leaves the session exactly as it was.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{Result, TravelError};
use crate::llm::message::Message;
use crate::llm::provider::LlmProvider;
use crate::llm::retry::RetryConfig;
use crate::session::SessionStore;
use crate::tools::executor::ToolExecutor;
use crate::tools::ToolRegistry;

use super::prompts::Prompts;
use super::react::ReasoningLoop;
use super::regenerate::{RegenerationController, Resolution};
use super::selector::ToolSelector;
use super::trace::{debug_trace, Component, DebugEntry, EventStatus, TraceEvent, TurnTrace};
use super::verifier::GroundingVerifier;

/// Source of "today" for the tool selector
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Model providers for each role in a turn
#[derive(Clone)]
pub struct AgentProviders {
    pub selector: Arc<dyn LlmProvider>,
    pub reasoning: Arc<dyn LlmProvider>,
    pub verifier: Arc<dyn LlmProvider>,
}

impl AgentProviders {
    /// Use one provider for every role
    pub fn shared(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            selector: provider.clone(),
            reasoning: provider.clone(),
            verifier: provider,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    /// Existing session to continue; a new one is created when absent
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

impl TurnRequest {
    pub fn new(session_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            session_id,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub session_id: String,
    pub answer: String,
    pub model: String,
    pub regenerated: bool,
    pub debug_trace: Vec<DebugEntry>,
    pub events: Vec<TraceEvent>,
}

pub struct TurnRunner {
    store: Arc<dyn SessionStore>,
    registry: Arc<ToolRegistry>,
    selector: ToolSelector,
    reasoning: ReasoningLoop,
    verifier: GroundingVerifier,
    verify_grounding: bool,
    max_regenerations: u32,
    today: Clock,
}

impl TurnRunner {
    pub fn from_settings(
        settings: &Settings,
        providers: AgentProviders,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let prompts = Prompts::from_config(&settings.agent);
        let model_retry = RetryConfig::for_model(&settings.resilience);
        let tool_retry = RetryConfig::for_tool(&settings.resilience);

        // Geocode plus forecast, with room for the geocoder throttle
        let call_timeout = Duration::from_secs(
            settings
                .weather
                .timeout_secs
                .saturating_mul(2)
                .saturating_add(5),
        );
        let executor = Arc::new(ToolExecutor::new(registry.clone(), tool_retry, call_timeout));

        let selector = ToolSelector::new(
            providers.selector,
            settings.provider.selector_model(),
            prompts.selector,
            model_retry.clone(),
        );
        let reasoning = ReasoningLoop::new(
            providers.reasoning,
            settings.provider.model.clone(),
            prompts.system,
            model_retry.clone(),
            executor,
        )
        .with_max_iterations(settings.agent.max_iterations)
        .with_sampling(settings.provider.max_tokens, settings.provider.temperature);
        let verifier = GroundingVerifier::new(
            providers.verifier,
            settings.provider.verifier_model(),
            prompts.grounding,
            model_retry,
        );

        Self {
            store,
            registry,
            selector,
            reasoning,
            verifier,
            verify_grounding: settings.agent.verify_grounding,
            max_regenerations: settings.agent.max_regenerations,
            today: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Replace the date source (tests pin "today")
    pub fn with_clock(mut self, today: Clock) -> Self {
        self.today = today;
        self
    }

    pub fn model(&self) -> &str {
        self.reasoning.model()
    }

    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(TravelError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }

        let session_id = request
            .session_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Held until the turn's messages are appended
        let _lock = self.store.lock(&session_id).await;

        let history = self.store.load(&session_id).await?;
        tracing::info!(
            target: "travel.agent.turn",
            session_id = %session_id,
            history = history.len(),
            "turn started"
        );

        let user = Message::user(message);
        let mut context = history;
        context.push(user.clone());

        let mut trace = TurnTrace::new();
        let selection = self
            .selector
            .select(message, (self.today)(), &self.registry, &mut trace)
            .await;

        let first = self.reasoning.run(&context, &selection, &mut trace).await?;

        let resolution = if self.verify_grounding {
            let verdict = self
                .verifier
                .verify(&first.answer, &first.observations, &context, &mut trace)
                .await;
            let mut controller = RegenerationController::new(self.max_regenerations);
            controller
                .maybe_regenerate(
                    verdict,
                    first,
                    &context,
                    &selection,
                    &self.reasoning,
                    &mut trace,
                )
                .await
        } else {
            trace.record(
                Component::Grounding,
                EventStatus::Skipped,
                "grounding verification disabled",
            );
            Resolution::accept(first)
        };

        let mut turn_messages = Vec::with_capacity(resolution.messages.len() + 1);
        turn_messages.push(user);
        turn_messages.extend(resolution.messages);
        let debug = debug_trace(&turn_messages);

        self.store.append(&session_id, turn_messages).await?;

        tracing::info!(
            target: "travel.agent.turn",
            session_id = %session_id,
            regenerated = resolution.regenerated,
            "turn finished"
        );

        Ok(TurnResponse {
            session_id,
            answer: resolution.answer,
            model: self.reasoning.model().to_string(),
            regenerated: resolution.regenerated,
            debug_trace: debug,
            events: trace.into_events(),
        })
    }
}
