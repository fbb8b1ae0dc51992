// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP surface
//!
//! `GET /health` and `POST /completions`. Handlers are thin: all behavior
//! lives in [`TurnRunner`].

pub mod dto;
mod routes;

use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::agent::TurnRunner;
use crate::error::{Result, TravelError};

pub struct AppState {
    pub runner: TurnRunner,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/completions", post(routes::completions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve_on_listener<F>(listener: TcpListener, runner: TurnRunner, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(target: "travel.server", %addr, "listening");

    let app = router(Arc::new(AppState { runner }));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!(target: "travel.server", "server stopped");
    Ok(())
}

/// Bind `host:port` and serve until Ctrl-C
pub async fn serve(host: &str, port: u16, runner: TurnRunner) -> Result<()> {
    let listener = TcpListener::bind((host, port)).await.map_err(|e| {
        TravelError::Config(format!("failed to bind {}:{}: {}", host, port, e))
    })?;

    serve_on_listener(listener, runner, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(target: "travel.server", error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!(target: "travel.server", "shutdown requested");
    })
    .await
}
