// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Request and response bodies for the HTTP surface

use serde::{Deserialize, Serialize};

use crate::agent::{DebugEntry, TraceEvent, TurnRequest, TurnResponse};

/// `POST /completions` body. `thread_id` and `input` are accepted aliases.
#[derive(Debug, Default, Deserialize)]
pub struct CompletionRequestBody {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
}

impl CompletionRequestBody {
    pub fn into_turn_request(self) -> TurnRequest {
        let session_id = self
            .session_id
            .filter(|s| !s.trim().is_empty())
            .or(self.thread_id);
        let message = self.message.or(self.input).unwrap_or_default();
        TurnRequest::new(session_id, message)
    }
}

#[derive(Debug, Serialize)]
pub struct ChoiceMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponseBody {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub session_id: String,
    pub answer: String,
    pub choices: Vec<Choice>,
    pub debug_trace: Vec<DebugEntry>,
    pub events: Vec<TraceEvent>,
}

impl CompletionResponseBody {
    pub fn from_turn(id: String, created: i64, turn: TurnResponse) -> Self {
        Self {
            id,
            object: "chat.completion",
            created,
            model: turn.model,
            session_id: turn.session_id,
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: "assistant",
                    content: turn.answer.clone(),
                },
                finish_reason: "stop",
            }],
            answer: turn.answer,
            debug_trace: turn.debug_trace,
            events: turn.events,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
