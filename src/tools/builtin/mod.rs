// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools

mod weather;

pub use weather::{
    aggregate_daily, ForecastDay, Place, TimeStep, WeatherForecast, WeatherTool, WEATHER_TOOL_NAME,
};

use std::sync::Arc;

use crate::config::settings::WeatherConfig;
use crate::error::Result;

use super::ToolRegistry;

/// Registry holding every built-in tool
pub fn default_registry(weather: &WeatherConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WeatherTool::new(weather)?));
    Ok(registry)
}
