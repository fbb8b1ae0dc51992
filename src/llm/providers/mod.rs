// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM provider implementations

mod common;
pub mod openrouter;

pub use openrouter::OpenRouterProvider;
