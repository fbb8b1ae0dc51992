// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for the travel assistant
//!
//! Handles loading settings from ~/.travel-assistant/settings.json. Every
//! section is optional in the file; missing keys fall back to defaults.

use serde::{Deserialize, Serialize};

mod io;
mod validation;

pub use validation::MAX_WEATHER_TIMEOUT_SECS;

/// Main settings structure, stored in ~/.travel-assistant/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Model provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Retry and backoff settings for model and tool calls
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Reasoning loop and guardrail settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Weather tool upstreams
    #[serde(default)]
    pub weather: WeatherConfig,

    /// HTTP surface
    #[serde(default)]
    pub server: ServerConfig,
}

/// OpenAI-compatible model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (prefer the environment variable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat completions endpoint
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Model used by the reasoning loop
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used by the tool selector (falls back to `model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_model: Option<String>,

    /// Model used by the grounding judge (falls back to `model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier_model: Option<String>,

    /// Per-request timeout for model calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_provider_base_url(),
            model: default_model(),
            selector_model: None,
            verifier_model: None,
            request_timeout_secs: default_request_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ProviderConfig {
    pub fn selector_model(&self) -> &str {
        self.selector_model.as_deref().unwrap_or(&self.model)
    }

    pub fn verifier_model(&self) -> &str {
        self.verifier_model.as_deref().unwrap_or(&self.model)
    }
}

/// Retry and resilience configuration
///
/// Model calls and tool calls share the delay cap and jitter but have their
/// own attempt budgets and base delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Total attempts for a model call (first try included)
    #[serde(default = "default_model_max_attempts")]
    pub model_max_attempts: u32,

    /// Base delay in milliseconds before the second model attempt
    #[serde(default = "default_model_base_delay_ms")]
    pub model_base_delay_ms: u64,

    /// Total attempts for a tool call (first try included)
    #[serde(default = "default_tool_max_attempts")]
    pub tool_max_attempts: u32,

    /// Base delay in milliseconds before the second tool attempt
    #[serde(default = "default_tool_base_delay_ms")]
    pub tool_base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for backoff, before jitter)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter fraction (0.0 to 1.0); the added delay is uniform in [0, delay * jitter]
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            model_max_attempts: default_model_max_attempts(),
            model_base_delay_ms: default_model_base_delay_ms(),
            tool_max_attempts: default_tool_max_attempts(),
            tool_base_delay_ms: default_tool_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

/// Reasoning loop and grounding guardrail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum THINKING -> ACTING cycles per loop invocation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Regenerations allowed after a failed grounding check (0 or 1)
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: u32,

    /// Run the grounding judge after each answer
    #[serde(default = "default_true")]
    pub verify_grounding: bool,

    /// Override for the assistant system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Override for the tool selector rubric (`{today}` and `{tools}` are substituted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_prompt: Option<String>,

    /// Override for the grounding judge prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_regenerations: default_max_regenerations(),
            verify_grounding: true,
            system_prompt: None,
            selector_prompt: None,
            grounding_prompt: None,
        }
    }
}

/// Geocoder and forecast upstreams for the weather tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Both upstreams require an identifying User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum spacing between geocoder requests
    #[serde(default = "default_geocode_min_interval_ms")]
    pub geocode_min_interval_ms: u64,

    /// Number of daily entries returned
    #[serde(default = "default_max_days")]
    pub max_days: usize,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocode_url: default_geocode_url(),
            forecast_url: default_forecast_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_weather_timeout_secs(),
            geocode_min_interval_ms: default_geocode_min_interval_ms(),
            max_days: default_max_days(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_provider_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_model_max_attempts() -> u32 {
    3
}

fn default_model_base_delay_ms() -> u64 {
    1000
}

fn default_tool_max_attempts() -> u32 {
    2
}

fn default_tool_base_delay_ms() -> u64 {
    1500
}

fn default_max_delay_ms() -> u64 {
    16000
}

fn default_jitter() -> f64 {
    0.5
}

fn default_max_iterations() -> u32 {
    8
}

fn default_max_regenerations() -> u32 {
    1
}

fn default_geocode_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_forecast_url() -> String {
    "https://api.met.no/weatherapi/locationforecast/2.0/compact".to_string()
}

fn default_user_agent() -> String {
    "TravelAssistant/1.0".to_string()
}

fn default_weather_timeout_secs() -> u64 {
    15
}

fn default_geocode_min_interval_ms() -> u64 {
    1050
}

fn default_max_days() -> usize {
    7
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}
