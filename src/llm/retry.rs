// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Backoff executor: retry with exponential backoff and jitter
//!
//! One executor serves both model calls and tool calls. It is generic over
//! the error type; whether a failure is worth another attempt is decided by
//! the error's [`Retryable`] classification, never by blanket retry.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::settings::ResilienceConfig;
use crate::error::{ApiError, TravelError};

/// Classification of failures into transient and permanent.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            // Retry on transient failures
            ApiError::Network(_) => true,
            ApiError::RateLimited(_) => true,
            ApiError::Timeout => true,
            ApiError::ServerError { status, .. } => (500..600).contains(status),

            // Don't retry on client errors
            ApiError::AuthenticationFailed => false,
            ApiError::ModelNotFound(_) => false,
            ApiError::InvalidResponse(_) => false,
        }
    }
}

impl Retryable for TravelError {
    fn is_retryable(&self) -> bool {
        match self {
            TravelError::Api(api_error) => api_error.is_retryable(),
            TravelError::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

/// Retry configuration for one call site
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Base delay in milliseconds (exponentially increased)
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds before jitter
    pub max_delay_ms: u64,
    /// Jitter fraction (0.0 to 1.0), added on top of the delay
    pub jitter: f64,
}

impl RetryConfig {
    /// Policy for model calls
    pub fn for_model(config: &ResilienceConfig) -> Self {
        Self {
            max_attempts: config.model_max_attempts,
            base_delay_ms: config.model_base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }

    /// Policy for tool calls
    pub fn for_tool(config: &ResilienceConfig) -> Self {
        Self {
            max_attempts: config.tool_max_attempts,
            base_delay_ms: config.tool_base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }

    /// Delay before the attempt following `attempt` (zero-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        // Exponential backoff: base * 2^attempt
        let exponential_ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped_ms = exponential_ms.min(self.max_delay_ms);

        let jitter_range = (capped_ms as f64 * self.jitter.clamp(0.0, 1.0)) as u64;
        let jitter_ms = if jitter_range == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_range)
        };

        Duration::from_millis(capped_ms.saturating_add(jitter_ms))
    }
}

/// Result of a retried operation together with how many attempts it took
#[derive(Debug)]
pub struct RetryReport<T, E> {
    pub outcome: std::result::Result<T, E>,
    pub attempts: u32,
}

impl<T, E> RetryReport<T, E> {
    /// Succeeded, but not on the first attempt
    pub fn recovered(&self) -> bool {
        self.outcome.is_ok() && self.attempts > 1
    }

    pub fn into_result(self) -> std::result::Result<T, E> {
        self.outcome
    }
}

/// Run `operation` until it succeeds, fails permanently, or exhausts
/// `config.max_attempts`.
///
/// The last failure is returned once attempts run out. A non-retryable
/// failure is returned immediately without consuming further budget.
pub async fn run<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> RetryReport<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(
                        target: "travel.retry",
                        operation = operation_name,
                        attempts = attempt + 1,
                        "succeeded after retry"
                    );
                }
                return RetryReport {
                    outcome: Ok(value),
                    attempts: attempt + 1,
                };
            }
            Err(error) => {
                if !error.is_retryable() {
                    tracing::debug!(
                        target: "travel.retry",
                        operation = operation_name,
                        error = %error,
                        "non-retryable failure"
                    );
                    return RetryReport {
                        outcome: Err(error),
                        attempts: attempt + 1,
                    };
                }

                if attempt + 1 >= max_attempts {
                    tracing::warn!(
                        target: "travel.retry",
                        operation = operation_name,
                        attempts = max_attempts,
                        error = %error,
                        "retries exhausted"
                    );
                    return RetryReport {
                        outcome: Err(error),
                        attempts: attempt + 1,
                    };
                }

                let delay = config.calculate_delay(attempt);
                tracing::warn!(
                    target: "travel.retry",
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, backing off"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_policies_from_resilience_defaults() {
        let resilience = ResilienceConfig::default();
        let model = RetryConfig::for_model(&resilience);
        let tool = RetryConfig::for_tool(&resilience);
        assert_eq!(model.max_attempts, 3);
        assert_eq!(model.base_delay_ms, 1000);
        assert_eq!(tool.max_attempts, 2);
        assert_eq!(tool.base_delay_ms, 1500);
    }

    #[test]
    fn test_calculate_delay_exponential_and_capped() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 16000,
            jitter: 0.0,
        };

        assert_eq!(config.calculate_delay(0).as_millis(), 1000);
        assert_eq!(config.calculate_delay(1).as_millis(), 2000);
        assert_eq!(config.calculate_delay(2).as_millis(), 4000);
        assert_eq!(config.calculate_delay(4).as_millis(), 16000);
        assert_eq!(config.calculate_delay(60).as_millis(), 16000);
    }

    #[test]
    fn test_jitter_only_adds_delay() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 16000,
            jitter: 0.5,
        };

        for _ in 0..50 {
            let millis = config.calculate_delay(1).as_millis();
            assert!((2000..=3000).contains(&millis), "delay {} out of range", millis);
        }
    }

    #[test]
    fn test_api_error_classification() {
        assert!(ApiError::Network("reset".to_string()).is_retryable());
        assert!(ApiError::RateLimited(60).is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(ApiError::ServerError {
            status: 503,
            message: "overloaded".to_string()
        }
        .is_retryable());

        assert!(!ApiError::AuthenticationFailed.is_retryable());
        assert!(!ApiError::ModelNotFound("m".to_string()).is_retryable());
        assert!(!ApiError::InvalidResponse("bad json".to_string()).is_retryable());
        assert!(!ApiError::ServerError {
            status: 400,
            message: "bad request".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_non_api_errors_not_retryable() {
        assert!(!TravelError::Config("x".to_string()).is_retryable());
        assert!(!TravelError::Config("x".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let report = run(
            || async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TravelError>(42)
            },
            &fast(3),
            "test_operation",
        )
        .await;

        assert_eq!(report.attempts, 1);
        assert!(!report.recovered());
        assert_eq!(report.into_result().unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_short_circuits_at_attempt_k() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let report = run(
            || async {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count < 1 {
                    Err(TravelError::Api(ApiError::Timeout))
                } else {
                    Ok(7)
                }
            },
            &fast(3),
            "test_operation",
        )
        .await;

        assert_eq!(report.attempts, 2);
        assert!(report.recovered());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = run(
            || async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TravelError::Api(ApiError::Network("down".to_string())))
            },
            &fast(3),
            "test_operation",
        )
        .await
        .into_result();

        assert!(matches!(
            result,
            Err(TravelError::Api(ApiError::Network(_)))
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_surfaces_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let report = run(
            || async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TravelError::Api(ApiError::AuthenticationFailed))
            },
            &fast(3),
            "test_operation",
        )
        .await;

        assert_eq!(report.attempts, 1);
        assert!(report.outcome.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let report = run(
            || async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TravelError::Api(ApiError::Timeout))
            },
            &fast(0),
            "test_operation",
        )
        .await;

        assert_eq!(report.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
