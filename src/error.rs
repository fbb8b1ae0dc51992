// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for the travel assistant
//!
//! Tool failures never show up here: they are values (`ToolResult::Failure`)
//! handed back to the model. Everything in this module is either a transient
//! upstream fault that the backoff executor may retry, or a fault that ends
//! the current turn.

use thiserror::Error;

/// The single message shown to a user when a turn fails.
pub const USER_FACING_ERROR: &str = "Something went wrong. Please try again later.";

/// Main error type for travel assistant operations
#[derive(Error, Debug)]
pub enum TravelError {
    /// Model API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors not classified at the call site
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Model API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,
}

impl ApiError {
    /// Classify a transport-level reqwest failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl TravelError {
    /// Text safe to show to an end user. Internal detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        USER_FACING_ERROR
    }
}

/// Result type alias for travel assistant operations
pub type Result<T> = std::result::Result<T, TravelError>;
