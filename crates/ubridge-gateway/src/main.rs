// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! UBridge Gateway - standalone bridging HTTP server
//!
//! Runs a bridge with the server controller and the discovery tasks
//! registered, starts the HTTP listener, and logs outbound bridge traffic.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default port
//! ubridge-gateway
//!
//! # Custom port and bind address
//! ubridge-gateway --port 9000 --bind 127.0.0.1
//! ```

use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use ubridge::discovery::NullBackend;
use ubridge::{Bridge, BridgeConfig, DiscoveryEngine};
use ubridge_gateway::ServerController;

/// UBridge bridging HTTP server
#[derive(Parser, Debug)]
#[command(name = "ubridge-gateway")]
#[command(about = "Bridging HTTP server for the UBridge request bridge")]
#[command(version)]
struct Args {
    /// HTTP server port (0 lets the kernel pick)
    #[arg(short, long, default_value = "33029")]
    port: u16,

    /// Bind address (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Worker threads (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let filter = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => BridgeConfig::from_file(path).expect("invalid configuration"),
        None => BridgeConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.gateway_bind_address = bind;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let controller = Arc::new(ServerController::new(&config));
    let discovery = DiscoveryEngine::new(Arc::new(NullBackend), &config.service_type);

    let bridge = Bridge::builder()
        .register(controller)
        .register(discovery)
        .sink(Arc::new(|wire: serde_json::Value, is_error: bool| {
            if is_error {
                tracing::warn!("outbound error: {}", wire);
            } else {
                tracing::info!("outbound: {}", wire);
            }
        }))
        .config(config.clone())
        .build()
        .expect("bridge start");

    info!("ubridge-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "starting HTTP server on {}:{}",
        config.gateway_bind_address, args.port
    );
    bridge
        .submit_wire(&json!(["boot", "setport", [args.port]]))
        .expect("well-formed boot message");

    loop {
        std::thread::park();
    }
}
