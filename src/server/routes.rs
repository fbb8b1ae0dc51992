// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::TravelError;

use super::dto::{CompletionRequestBody, CompletionResponseBody, ErrorResponse, HealthResponse};
use super::AppState;

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Runs the turn inline, so a dropped connection cancels it
pub async fn completions(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CompletionRequestBody>, JsonRejection>,
) -> ApiResult<CompletionResponseBody> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::debug!(target: "travel.server", error = %rejection, "rejected request body");
        error_response(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    let request = body.into_turn_request();
    if request.message.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "message must not be empty",
        ));
    }

    tracing::info!(
        target: "travel.server",
        session_id = request.session_id.as_deref().unwrap_or("<new>"),
        "completion request"
    );

    match state.runner.run_turn(request).await {
        Ok(turn) => {
            let id = format!("chatcmpl-{}", &Uuid::new_v4().simple().to_string()[..12]);
            Ok(Json(CompletionResponseBody::from_turn(
                id,
                Utc::now().timestamp(),
                turn,
            )))
        }
        Err(TravelError::InvalidInput(message)) => {
            Err(error_response(StatusCode::BAD_REQUEST, message))
        }
        Err(e) => {
            tracing::error!(target: "travel.server", error = %e, "turn failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.user_message(),
            ))
        }
    }
}
