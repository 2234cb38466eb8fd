// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! One structured log line per instrumented request

use super::support::*;
use fabstir_embed_node::api::create_app;
use fabstir_embed_node::embeddings::Tier;
use fabstir_embed_node::monitoring::REQUEST_ID_HEADER;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Collects JSON log output in memory
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl LogCapture {
    fn access_lines(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter(|entry| {
                matches!(
                    entry["message"].as_str(),
                    Some("HTTP Request Processed") | Some("HTTP Request Error")
                )
            })
            .collect()
    }
}

fn capture() -> (LogCapture, tracing::subscriber::DefaultGuard) {
    let logs = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::INFO)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

#[tokio::test]
async fn test_successful_request_logs_info_line() {
    let (logs, _guard) = capture();
    let app = create_app(ready_state(stub_engine("stub"), Tier::Accelerated), None);

    let response = send(app, embed_request(&["a", "b"])).await;

    let lines = logs.access_lines();
    assert_eq!(lines.len(), 1);
    let entry = &lines[0];
    assert_eq!(entry["level"], "INFO");
    assert_eq!(entry["message"], "HTTP Request Processed");
    assert_eq!(entry["endpoint"], "/embeddings");
    assert_eq!(entry["method"], "POST");
    assert_eq!(entry["status_code"], 200);
    assert!(entry["processing_time_s"].as_f64().unwrap() >= 0.0);
    assert!(entry["timestamp_ns"].as_i64().unwrap() > 0);
    assert_eq!(
        entry["request_id"],
        response.headers[REQUEST_ID_HEADER].to_str().unwrap()
    );
}

#[tokio::test]
async fn test_error_status_logs_error_line() {
    let (logs, _guard) = capture();
    let app = create_app(unavailable_state(), None);

    send(app, embed_request(&["a"])).await;

    let lines = logs.access_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["level"], "ERROR");
    assert_eq!(lines[0]["message"], "HTTP Request Error");
    assert_eq!(lines[0]["status_code"], 503);
}

#[tokio::test]
async fn test_health_is_logged_and_metrics_is_not() {
    let (logs, _guard) = capture();
    let app = create_app(ready_state(stub_engine("stub"), Tier::Fallback), None);

    send(app.clone(), get("/health")).await;
    send(app.clone(), get("/metrics")).await;
    send(app.clone(), get("/health")).await;

    let lines = logs.access_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|entry| entry["endpoint"] == "/health"));
    assert_ne!(lines[0]["request_id"], lines[1]["request_id"]);
}
