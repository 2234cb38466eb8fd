// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::api::DEFAULT_MAX_BODY_BYTES;
use crate::config::LogFormat;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Fabstir Embedding Node
///
/// Engine settings (model, cache directory, batching) come from `EMBED_*`
/// environment variables; the flags below only control the transport.
#[derive(Parser, Debug, Clone)]
#[command(name = "fabstir-embed-node")]
#[command(version)]
#[command(about = "HTTP service exposing a text embedding model", long_about = None)]
pub struct Cli {
    /// Address to bind the HTTP listener to
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to bind the HTTP listener to
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Abort requests running longer than this many seconds (408)
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Largest accepted POST /embeddings body in bytes (413 above it)
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
