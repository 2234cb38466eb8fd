// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request metrics and structured access logging
//!
//! Every request outside `/metrics` gets a [`RequestTrace`] guard. The guard
//! settles in `Drop`, so the counter, histogram, in-progress gauge and the
//! access log line are recorded whether the handler returned, panicked, or
//! the connection went away mid-request. A request that never produced a
//! response is recorded as 500.

use crate::monitoring::metrics::HttpMetrics;
use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Endpoint label for requests that matched no route
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Paths whose requests are neither counted nor logged
pub const EXCLUDED_PATHS: &[&str] = &["/metrics", "/metrics/"];

/// Correlation id for one request, available to handlers as an extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_excluded(path: &str) -> bool {
    EXCLUDED_PATHS.contains(&path)
}

/// Processing time in seconds, rounded to 4 decimal places
pub fn round_seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0
}

/// In-flight bookkeeping for one request; finalizes on drop
pub struct RequestTrace {
    metrics: HttpMetrics,
    method: String,
    endpoint: String,
    request_id: RequestId,
    started: Instant,
    status: Option<StatusCode>,
}

impl RequestTrace {
    pub fn start(
        metrics: HttpMetrics,
        method: impl Into<String>,
        endpoint: impl Into<String>,
        request_id: RequestId,
    ) -> Self {
        let method = method.into();
        let endpoint = endpoint.into();
        metrics.request_started(&method, &endpoint);
        Self {
            metrics,
            method,
            endpoint,
            request_id,
            started: Instant::now(),
            status: None,
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl Drop for RequestTrace {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let status = self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let status_code = status.as_u16();

        self.metrics
            .request_finished(&self.method, &self.endpoint, status_code, elapsed);

        let timestamp_ns = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let processing_time_s = round_seconds(elapsed);

        if status_code >= 400 {
            error!(
                timestamp_ns,
                request_id = %self.request_id,
                endpoint = %self.endpoint,
                method = %self.method,
                status_code,
                processing_time_s,
                "HTTP Request Error"
            );
        } else {
            info!(
                timestamp_ns,
                request_id = %self.request_id,
                endpoint = %self.endpoint,
                method = %self.method,
                status_code,
                processing_time_s,
                "HTTP Request Processed"
            );
        }
    }
}

/// Axum middleware (`from_fn_with_state`) wrapping every route
pub async fn track_requests(
    State(metrics): State<HttpMetrics>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string());
    let method = request.method().to_string();
    let request_id = RequestId::new();
    request.extensions_mut().insert(request_id.clone());

    let mut trace = RequestTrace::start(metrics, method, endpoint, request_id.clone());
    let mut response = next.run(request).await;
    trace.set_status(response.status());

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
