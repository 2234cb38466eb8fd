// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::embeddings::{EngineState, Tier};
use crate::monitoring::metrics::CONTENT_TYPE;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    /// `null` when no engine could be loaded
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

impl HealthResponse {
    pub fn from_state(engine: &EngineState) -> Self {
        Self {
            status: "ok".to_string(),
            model: engine.model_name().map(str::to_string),
            tier: engine.tier(),
        }
    }
}

/// GET /health. Always 200, even when the engine is unavailable.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = HealthResponse::from_state(&state.engine);
    info!(
        "Health check: model {}",
        health.model.as_deref().unwrap_or("not loaded")
    );
    Json(health)
}

/// GET /metrics in the Prometheus text format
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => {
            debug!("Serving {} bytes of metrics", body.len());
            ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
        }
        Err(e) => {
            error!("Failed to render metrics: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn not_found_handler(uri: Uri) -> ApiErrorResponse {
    ApiError::NotFound(format!("No route for {}", uri.path())).into()
}
