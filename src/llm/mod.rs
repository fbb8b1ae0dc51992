// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module
//!
//! Provider abstraction, message model, and the backoff executor shared by
//! model and tool calls.

pub mod message;
pub mod mock_provider;
pub mod provider;
pub mod providers;
pub mod retry;

pub use message::*;
pub use provider::*;
