// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, time::Duration};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, timeout::TimeoutLayer};

use super::embed::embed_handler;
use super::handlers::{health_handler, metrics_handler, not_found_handler};
use crate::embeddings::EngineState;
use crate::monitoring::{track_requests, HttpMetrics};

/// Shared, read-only request context
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineState,
    pub metrics: HttpMetrics,
}

impl AppState {
    pub fn new(engine: EngineState, metrics: HttpMetrics) -> Self {
        Self { engine, metrics }
    }
}

/// Request body cap for POST /embeddings unless configured otherwise
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Routes served by the node, before middleware
pub fn api_routes() -> Router<AppState> {
    routes_with_body_limit(DEFAULT_MAX_BODY_BYTES)
}

/// Same routes as [`api_routes`] with an explicit `/embeddings` body cap
pub fn routes_with_body_limit(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        // Embedding endpoint
        .route(
            "/embeddings",
            post(embed_handler).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        // Health check
        .route("/health", get(health_handler))
        // Metrics endpoint (scrapers sometimes add a trailing slash)
        .route("/metrics", get(metrics_handler))
        .route("/metrics/", get(metrics_handler))
        .fallback(not_found_handler)
}

/// Wraps `routes` in the middleware stack and binds the state.
///
/// Outermost first: CORS, panic recovery, request tracking, then the
/// optional timeout. Panic recovery sits outside tracking so a panicking
/// handler still drops its trace guard; the timeout sits inside so timed
/// out requests are measured.
pub fn with_middleware(
    routes: Router<AppState>,
    state: AppState,
    request_timeout: Option<Duration>,
) -> Router {
    let routes = match request_timeout {
        Some(timeout) => routes.layer(TimeoutLayer::new(timeout)),
        None => routes,
    };

    routes
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_requests,
        ))
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn create_app(state: AppState, request_timeout: Option<Duration>) -> Router {
    with_middleware(api_routes(), state, request_timeout)
}

pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    request_timeout: Option<Duration>,
    max_body_bytes: usize,
) -> anyhow::Result<()> {
    let app = with_middleware(routes_with_body_limit(max_body_bytes), state, request_timeout);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
