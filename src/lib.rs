// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! travel-assistant - a travel-advice agent with live weather and grounding checks.
//!
//! This crate exposes the runtime used by:
//! - the `travel-assistant` CLI (`src/main.rs`)
//! - the HTTP surface (`server`)
//!
//! Architecture highlights:
//! - `agent`: tool selection, ReAct loop, grounding verifier, regeneration, turn orchestration
//! - `llm`: provider abstraction, OpenRouter implementation, backoff executor, mock provider
//! - `tools`: tool contract, registry, executor, and the built-in weather tool
//! - `session`: per-session history with turn serialization
//! - `config`: JSON settings with environment overrides

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod server;
pub mod session;
pub mod tools;

pub use error::{Result, TravelError};
