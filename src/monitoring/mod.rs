// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/mod.rs - Request metrics and access logging

pub mod metrics;
pub mod middleware;

pub use metrics::HttpMetrics;
pub use middleware::{track_requests, RequestId, RequestTrace, REQUEST_ID_HEADER};
