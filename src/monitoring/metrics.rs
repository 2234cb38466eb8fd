// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/metrics.rs - Prometheus collectors for the HTTP surface

use crate::embeddings::EngineState;
use anyhow::{Context, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

pub const REQUESTS_TOTAL: &str = "fastembed_http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "fastembed_http_request_duration_seconds";
pub const REQUESTS_IN_PROGRESS: &str = "fastembed_http_requests_in_progress";
pub const ENGINE_INFO: &str = "fastembed_engine_info";
pub const ENGINE_READY: &str = "fastembed_engine_ready";

/// Latency buckets in seconds
pub const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Request metrics plus engine status, registered on a private registry.
///
/// Cloning is cheap: the collectors are reference counted internally.
#[derive(Clone)]
pub struct HttpMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
    in_progress: IntGaugeVec,
    engine_info: IntGaugeVec,
    engine_ready: IntGauge,
}

impl HttpMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(REQUESTS_TOTAL, "Total number of HTTP requests"),
            &["method", "endpoint", "status_code"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(REQUEST_DURATION_SECONDS, "HTTP request latency in seconds")
                .buckets(DURATION_BUCKETS.to_vec()),
            &["method", "endpoint", "status_code"],
        )?;
        let in_progress = IntGaugeVec::new(
            Opts::new(REQUESTS_IN_PROGRESS, "Number of HTTP requests in progress"),
            &["method", "endpoint"],
        )?;
        let engine_info = IntGaugeVec::new(
            Opts::new(ENGINE_INFO, "Loaded embedding model and hardware tier"),
            &["model", "tier"],
        )?;
        let engine_ready = IntGauge::new(
            ENGINE_READY,
            "1 when an embedding engine is loaded, 0 otherwise",
        )?;

        registry
            .register(Box::new(requests_total.clone()))
            .context("registering request counter")?;
        registry
            .register(Box::new(request_duration.clone()))
            .context("registering latency histogram")?;
        registry
            .register(Box::new(in_progress.clone()))
            .context("registering in-progress gauge")?;
        registry
            .register(Box::new(engine_info.clone()))
            .context("registering engine info")?;
        registry
            .register(Box::new(engine_ready.clone()))
            .context("registering engine readiness")?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            in_progress,
            engine_info,
            engine_ready,
        })
    }

    pub fn request_started(&self, method: &str, endpoint: &str) {
        self.in_progress.with_label_values(&[method, endpoint]).inc();
    }

    /// Records a finished request and releases its in-progress slot
    pub fn request_finished(&self, method: &str, endpoint: &str, status_code: u16, elapsed: Duration) {
        let status = status_code.to_string();
        let labels = [method, endpoint, status.as_str()];
        self.requests_total.with_label_values(&labels).inc();
        self.request_duration
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
        self.in_progress.with_label_values(&[method, endpoint]).dec();
    }

    /// Publishes which engine (if any) was acquired at startup
    pub fn record_engine_state(&self, state: &EngineState) {
        match (state.model_name(), state.tier()) {
            (Some(model), Some(tier)) => {
                self.engine_info
                    .with_label_values(&[model, tier.as_str()])
                    .set(1);
                self.engine_ready.set(1);
            }
            _ => self.engine_ready.set(0),
        }
    }

    pub fn requests_total(&self, method: &str, endpoint: &str, status_code: u16) -> u64 {
        let status = status_code.to_string();
        self.requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .get()
    }

    pub fn duration_count(&self, method: &str, endpoint: &str, status_code: u16) -> u64 {
        let status = status_code.to_string();
        self.request_duration
            .with_label_values(&[method, endpoint, status.as_str()])
            .get_sample_count()
    }

    pub fn in_progress(&self, method: &str, endpoint: &str) -> i64 {
        self.in_progress.with_label_values(&[method, endpoint]).get()
    }

    /// Renders every collector in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("encoding metrics")?;
        String::from_utf8(buffer).context("metrics output is not UTF-8")
    }
}
