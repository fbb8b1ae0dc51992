// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Weather forecast tool
//!
//! Resolves a free-text location with a Nominatim-compatible geocoder, then
//! fetches a MET Norway `locationforecast` compact series for the coordinates
//! and folds it into per-day entries grouped by UTC date.
//!
//! Failure shaping:
//! - request timeout -> `timeout`
//! - connection failure, HTTP 429 or 5xx -> `upstream_unavailable`
//! - blank or missing `city` -> `invalid_arguments`
//! - geocoder returned nothing -> `not_found`
//! - anything else (bad status, malformed body) -> `unexpected`

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::settings::WeatherConfig;
use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolErrorKind, ToolFailure, ToolResult};

pub const WEATHER_TOOL_NAME: &str = "get_weather_forecast";

/// Multi-day forecast for a named place
pub struct WeatherTool {
    client: Client,
    geocode_url: String,
    forecast_url: String,
    max_days: usize,
    geocode_min_interval: Duration,
    last_geocode: Mutex<Option<Instant>>,
}

/// A geocoded location
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// One day of forecast aggregated in UTC
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub precipitation_mm: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_max_ms: Option<f64>,
}

/// Success payload handed to the model
#[derive(Debug, Clone, Serialize)]
pub struct WeatherForecast {
    pub query: String,
    pub place: String,
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
    pub days: Vec<ForecastDay>,
}

impl WeatherTool {
    /// Create the tool with its own HTTP client
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            geocode_url: config.geocode_url.clone(),
            forecast_url: config.forecast_url.clone(),
            max_days: config.max_days,
            geocode_min_interval: Duration::from_millis(config.geocode_min_interval_ms),
            last_geocode: Mutex::new(None),
        })
    }

    /// Space geocoder requests out. Holding the lock across the sleep keeps
    /// concurrent turns in line behind each other.
    async fn throttle_geocoder(&self) {
        let mut last = self.last_geocode.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.geocode_min_interval {
                tokio::time::sleep(self.geocode_min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn geocode(&self, city: &str) -> std::result::Result<Place, ToolFailure> {
        self.throttle_geocoder().await;
        tracing::info!(target: "travel.tools.weather", city, "geocoding");

        let response = self
            .client
            .get(&self.geocode_url)
            .header("Accept", "application/json")
            .query(&[("q", city), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| transport_failure(&e, "geocoder"))?;
        check_status(response.status(), "geocoder")?;

        let results: Vec<GeocodeHit> = response
            .json()
            .await
            .map_err(|e| transport_failure(&e, "geocoder"))?;

        let Some(top) = results.into_iter().next() else {
            return Err(ToolFailure::new(
                ToolErrorKind::NotFound,
                format!(
                    "Could not find '{}'. Try 'City, Country' (e.g. 'Paris, France').",
                    city
                ),
            ));
        };

        let (Some(lat), Some(lon)) = (coordinate(&top.lat), coordinate(&top.lon)) else {
            return Err(ToolFailure::new(
                ToolErrorKind::Unexpected,
                "Geocoder returned a result without usable coordinates",
            ));
        };

        Ok(Place {
            name: top.display_name.unwrap_or_else(|| city.to_string()),
            lat,
            lon,
        })
    }

    pub async fn forecast(
        &self,
        place: &Place,
        days: usize,
    ) -> std::result::Result<Vec<ForecastDay>, ToolFailure> {
        tracing::info!(
            target: "travel.tools.weather",
            place = %place.name,
            lat = place.lat,
            lon = place.lon,
            "fetching forecast"
        );

        let response = self
            .client
            .get(&self.forecast_url)
            .header("Accept", "application/json")
            .query(&[
                ("lat", format!("{:.4}", place.lat)),
                ("lon", format!("{:.4}", place.lon)),
            ])
            .send()
            .await
            .map_err(|e| transport_failure(&e, "forecast provider"))?;
        check_status(response.status(), "forecast provider")?;

        let body: ForecastBody = response
            .json()
            .await
            .map_err(|e| transport_failure(&e, "forecast provider"))?;

        Ok(aggregate_daily(&body.properties.timeseries, days))
    }

    async fn lookup(
        &self,
        city: &str,
        days: usize,
    ) -> std::result::Result<WeatherForecast, ToolFailure> {
        let place = self.geocode(city).await?;
        let days = self.forecast(&place, days).await?;
        Ok(WeatherForecast {
            query: city.to_string(),
            place: place.name,
            lat: place.lat,
            lon: place.lon,
            timezone: "UTC".to_string(),
            days,
        })
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        WEATHER_TOOL_NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: WEATHER_TOOL_NAME.to_string(),
            description: format!(
                "Get a daily weather forecast (up to {} days, aggregated by UTC date) for a named place. \
                 Returns per-day min/max temperature in Celsius, precipitation in mm, and max wind in m/s. \
                 Prefer 'City, Country' when the name is ambiguous.",
                self.max_days
            ),
            input_schema: SchemaBuilder::new()
                .string("city", "Location to forecast, e.g. 'Oslo, Norway'", true)
                .integer(
                    "days",
                    &format!("Number of days to return (1-{}, default {})", self.max_days, self.max_days),
                    false,
                )
                .build(),
        }
    }

    async fn invoke(&self, arguments: &Value) -> ToolResult {
        let Some(city) = required_str(arguments, "city") else {
            return ToolResult::failure(
                ToolErrorKind::InvalidArguments,
                "The 'city' argument is required",
            );
        };
        let days = arguments
            .get("days")
            .and_then(Value::as_u64)
            .map(|d| (d as usize).clamp(1, self.max_days))
            .unwrap_or(self.max_days);

        match self.lookup(city, days).await {
            Ok(forecast) => match serde_json::to_value(&forecast) {
                Ok(data) => ToolResult::success(data),
                Err(e) => ToolResult::failure(ToolErrorKind::Unexpected, e.to_string()),
            },
            Err(failure) => {
                tracing::warn!(
                    target: "travel.tools.weather",
                    city,
                    kind = %failure.kind,
                    message = %failure.message,
                    "weather lookup failed"
                );
                failure.into()
            }
        }
    }
}

fn transport_failure(err: &reqwest::Error, upstream: &str) -> ToolFailure {
    if err.is_timeout() {
        ToolFailure::new(
            ToolErrorKind::Timeout,
            format!("Timed out waiting for the {}", upstream),
        )
    } else if err.is_connect() || err.is_request() {
        ToolFailure::new(
            ToolErrorKind::UpstreamUnavailable,
            format!("Could not reach the {}", upstream),
        )
    } else {
        ToolFailure::new(
            ToolErrorKind::Unexpected,
            format!("Unreadable response from the {}: {}", upstream, err),
        )
    }
}

fn check_status(status: StatusCode, upstream: &str) -> std::result::Result<(), ToolFailure> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(ToolFailure::new(
            ToolErrorKind::UpstreamUnavailable,
            format!("The {} is unavailable (HTTP {})", upstream, status.as_u16()),
        ))
    } else {
        Err(ToolFailure::new(
            ToolErrorKind::Unexpected,
            format!("The {} rejected the request (HTTP {})", upstream, status.as_u16()),
        ))
    }
}

/// Nominatim sends coordinates as strings; accept numbers too
fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Fold a forecast series into at most `max_days` daily entries, earliest first.
/// Days without any temperature reading are dropped.
pub fn aggregate_daily(series: &[TimeStep], max_days: usize) -> Vec<ForecastDay> {
    let mut daily: BTreeMap<NaiveDate, ForecastDay> = BTreeMap::new();

    for step in series {
        let Some(temp) = step.data.instant.details.air_temperature else {
            continue;
        };
        let date = step.time.date_naive();
        let entry = daily.entry(date).or_insert(ForecastDay {
            date,
            temp_min_c: temp,
            temp_max_c: temp,
            precipitation_mm: 0.0,
            precipitation_probability: None,
            wind_max_ms: None,
        });

        entry.temp_min_c = entry.temp_min_c.min(temp);
        entry.temp_max_c = entry.temp_max_c.max(temp);

        if let Some(wind) = step.data.instant.details.wind_speed {
            entry.wind_max_ms = Some(entry.wind_max_ms.map_or(wind, |w| w.max(wind)));
        }

        if let Some(next) = step.data.next_1_hours.as_ref() {
            if let Some(amount) = next.details.precipitation_amount {
                entry.precipitation_mm += amount;
            }
            if let Some(p) = next.details.probability_of_precipitation {
                entry.precipitation_probability =
                    Some(entry.precipitation_probability.map_or(p, |q| q.max(p)));
            }
        }
    }

    daily
        .into_values()
        .take(max_days)
        .map(|mut day| {
            day.precipitation_mm = (day.precipitation_mm * 10.0).round() / 10.0;
            day
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lon: Value,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastBody {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    timeseries: Vec<TimeStep>,
}

/// One point of a `locationforecast` series
#[derive(Debug, Clone, Deserialize)]
pub struct TimeStep {
    pub time: DateTime<Utc>,
    pub data: StepData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepData {
    pub instant: InstantData,
    #[serde(default)]
    pub next_1_hours: Option<Period>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstantData {
    pub details: InstantDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstantDetails {
    pub air_temperature: Option<f64>,
    pub wind_speed: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Period {
    #[serde(default)]
    pub details: PeriodDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodDetails {
    pub precipitation_amount: Option<f64>,
    pub probability_of_precipitation: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(points: Value) -> Vec<TimeStep> {
        serde_json::from_value(points).unwrap()
    }

    #[test]
    fn test_aggregate_groups_by_utc_date() {
        let steps = series(json!([
            {"time": "2026-10-18T06:00:00Z", "data": {
                "instant": {"details": {"air_temperature": 4.0, "wind_speed": 3.1}},
                "next_1_hours": {"details": {"precipitation_amount": 0.4}}
            }},
            {"time": "2026-10-18T15:00:00Z", "data": {
                "instant": {"details": {"air_temperature": 9.5, "wind_speed": 6.0}},
                "next_1_hours": {"details": {"precipitation_amount": 1.1, "probability_of_precipitation": 70.0}}
            }},
            {"time": "2026-10-19T00:00:00Z", "data": {
                "instant": {"details": {"air_temperature": 2.0}}
            }}
        ]));

        let days = aggregate_daily(&steps, 7);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(days[0].temp_min_c, 4.0);
        assert_eq!(days[0].temp_max_c, 9.5);
        assert_eq!(days[0].precipitation_mm, 1.5);
        assert_eq!(days[0].precipitation_probability, Some(70.0));
        assert_eq!(days[0].wind_max_ms, Some(6.0));
        assert_eq!(days[1].temp_min_c, 2.0);
        assert_eq!(days[1].wind_max_ms, None);
    }

    #[test]
    fn test_aggregate_limits_days_and_skips_missing_temperatures() {
        let mut points = Vec::new();
        for day in 1..=10 {
            points.push(json!({
                "time": format!("2026-11-{:02}T12:00:00Z", day),
                "data": {"instant": {"details": {"air_temperature": day as f64}}}
            }));
        }
        points.push(json!({
            "time": "2026-10-31T12:00:00Z",
            "data": {"instant": {"details": {"wind_speed": 2.0}}}
        }));

        let days = aggregate_daily(&series(Value::Array(points)), 7);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 11, 1).unwrap());
        assert_eq!(days[6].date, NaiveDate::from_ymd_opt(2026, 11, 7).unwrap());
    }

    #[test]
    fn test_coordinate_parsing() {
        assert_eq!(coordinate(&json!("59.9133")), Some(59.9133));
        assert_eq!(coordinate(&json!(10.75)), Some(10.75));
        assert_eq!(coordinate(&json!("north")), None);
        assert_eq!(coordinate(&Value::Null), None);
    }

    #[test]
    fn test_check_status_classification() {
        assert!(check_status(StatusCode::OK, "x").is_ok());
        assert_eq!(
            check_status(StatusCode::SERVICE_UNAVAILABLE, "x").unwrap_err().kind,
            ToolErrorKind::UpstreamUnavailable
        );
        assert_eq!(
            check_status(StatusCode::TOO_MANY_REQUESTS, "x").unwrap_err().kind,
            ToolErrorKind::UpstreamUnavailable
        );
        assert_eq!(
            check_status(StatusCode::FORBIDDEN, "x").unwrap_err().kind,
            ToolErrorKind::Unexpected
        );
    }

    #[tokio::test]
    async fn test_missing_city_is_invalid_arguments() {
        let tool = WeatherTool::new(&WeatherConfig::default()).unwrap();
        let result = tool.invoke(&json!({"city": "  "})).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::InvalidArguments));

        let result = tool.invoke(&json!({})).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::InvalidArguments));
    }

    #[test]
    fn test_definition_requires_city() {
        let tool = WeatherTool::new(&WeatherConfig::default()).unwrap();
        let def = tool.definition();
        assert_eq!(def.name, WEATHER_TOOL_NAME);
        assert_eq!(def.input_schema.required, vec!["city".to_string()]);
    }
}
