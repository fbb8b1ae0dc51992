// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::{ApiError, TravelError};

/// Parse numeric Retry-After header (seconds).
pub(crate) fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Construct a standardized server error.
pub(crate) fn server_error(status: u16, message: impl Into<String>) -> TravelError {
    TravelError::Api(ApiError::ServerError {
        status,
        message: message.into(),
    })
}
