// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{Result, TravelError};

use super::Settings;

/// Upper bound for a single weather upstream request
pub const MAX_WEATHER_TIMEOUT_SECS: u64 = 300;

impl Settings {
    /// Get the provider API key, checking the env var first.
    pub fn api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.provider.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.provider.api_key.clone())
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        let resilience = &self.resilience;
        if resilience.model_max_attempts == 0 {
            return Err(TravelError::Config(
                "resilience.model_max_attempts must be at least 1".to_string(),
            ));
        }
        if resilience.tool_max_attempts == 0 {
            return Err(TravelError::Config(
                "resilience.tool_max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&resilience.jitter) {
            return Err(TravelError::Config(format!(
                "resilience.jitter must be between 0.0 and 1.0, got {}",
                resilience.jitter
            )));
        }
        if self.agent.max_iterations == 0 {
            return Err(TravelError::Config(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.agent.max_regenerations > 1 {
            tracing::warn!(
                target: "travel.config",
                configured = self.agent.max_regenerations,
                "agent.max_regenerations is capped at 1"
            );
        }
        if !(1..=MAX_WEATHER_TIMEOUT_SECS).contains(&self.weather.timeout_secs) {
            return Err(TravelError::Config(format!(
                "weather.timeout_secs must be between 1 and {}, got {}",
                MAX_WEATHER_TIMEOUT_SECS, self.weather.timeout_secs
            )));
        }
        if self.weather.max_days == 0 {
            return Err(TravelError::Config(
                "weather.max_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
