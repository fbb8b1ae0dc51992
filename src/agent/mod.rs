// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversational agent
//!
//! A turn flows through [`turn::TurnRunner`]: tool selection, the ReAct
//! loop, grounding verification, and at most one regeneration.

pub mod prompts;
pub mod react;
pub mod regenerate;
pub mod selector;
pub mod trace;
pub mod turn;
pub mod verifier;

pub use react::{LoopOutcome, Observation, ReasoningLoop, NO_ANSWER_FALLBACK};
pub use regenerate::{RegenerationController, Resolution};
pub use selector::ToolSelector;
pub use trace::{Component, DebugEntry, EventStatus, TraceEvent, TurnTrace};
pub use turn::{AgentProviders, Clock, TurnRequest, TurnResponse, TurnRunner};
pub use verifier::{GroundingVerifier, Verdict};
