// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Server controller: the bridge-facing side of the gateway.
//!
//! One task handler covers the four server tasks: `setport` starts exactly
//! one HTTP server instance on a dedicated thread, `unsetport` stops it,
//! `serve` registers a responder for a `(pathPattern, method)` pair, and
//! `respond` deposits the reply for a waiting connection. Starting twice
//! fails with "already started"; stopping with nothing running is an
//! explicit error, never a crash.

use crate::handlers;
use crate::paths::{PathTable, ServeRegistration};
use crate::session::{HttpReply, SessionTable};
use axum::http::StatusCode;
use axum::Router;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use ubridge::{BridgeConfig, BridgeError, Request, Response, Result, TaskHandler};

use std::sync::Arc;

/// State shared between the controller and the connection handlers.
pub struct GatewayState {
    pub paths: RwLock<PathTable>,
    pub sessions: SessionTable,
    pub poll_interval: Duration,
    pub poll_cycles: u32,
}

struct RunningServer {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    thread: std::thread::JoinHandle<()>,
}

/// Task handler for `setport` / `unsetport` / `serve` / `respond`.
pub struct ServerController {
    state: Arc<GatewayState>,
    bind_address: String,
    running: Mutex<Option<RunningServer>>,
}

impl ServerController {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            state: Arc::new(GatewayState {
                paths: RwLock::new(PathTable::new()),
                sessions: SessionTable::new(),
                poll_interval: config.poll_interval(),
                poll_cycles: config.gateway_poll_cycles,
            }),
            bind_address: config.gateway_bind_address.clone(),
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Port the server is currently bound to, if running.
    pub fn port(&self) -> Option<u16> {
        self.running.lock().as_ref().map(|s| s.port)
    }

    fn set_port(&self, request: &Request) -> Result<()> {
        let port = request.arg_u64(0)?;
        let port = u16::try_from(port)
            .map_err(|_| BridgeError::HandlerFault(format!("port {} out of range", port)))?;

        let mut running = self.running.lock();
        if running.is_some() {
            return Err(BridgeError::AlreadyStarted("HTTP server".into()));
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = self.state.clone();
        let bind = self.bind_address.clone();
        let thread = std::thread::Builder::new()
            .name("ubridge-http".into())
            .spawn(move || run_server(state, bind, port, ready_tx, shutdown_rx))
            .map_err(|e| BridgeError::Io(e.to_string()))?;

        match ready_rx.recv_timeout(Duration::from_secs(10)) {
            Ok(Ok(bound_port)) => {
                tracing::info!("http server listening on {}:{}", self.bind_address, bound_port);
                *running = Some(RunningServer {
                    port: bound_port,
                    shutdown: Some(shutdown_tx),
                    thread,
                });
                Response::new(request).put(bound_port).send();
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = thread.join();
                Err(BridgeError::Io(message))
            }
            Err(_) => Err(BridgeError::Io("HTTP server start timed out".into())),
        }
    }

    fn unset_port(&self, request: &Request) -> Result<()> {
        let server = self.running.lock().take();
        match server {
            None => Err(BridgeError::NotStarted(
                "cannot stop the HTTP server before it is started".into(),
            )),
            Some(mut server) => {
                if let Some(shutdown) = server.shutdown.take() {
                    let _ = shutdown.send(());
                }
                let _ = server.thread.join();
                tracing::info!("http server on port {} stopped", server.port);
                Response::new(request).send();
                Ok(())
            }
        }
    }

    /// The serving request itself becomes the responder: it is answered once
    /// per inbound HTTP hit, never acknowledged at registration time.
    fn serve(&self, request: &Request) -> Result<()> {
        let method = request.arg_str(0)?.to_string();
        let pattern = request.arg_str(1)?.to_string();
        let cors = request
            .args()
            .get(2)
            .and_then(|options| options.get("cors"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        tracing::info!("route registered: {} {}", method.to_ascii_uppercase(), pattern);
        self.state.paths.write().register(
            &pattern,
            &method,
            ServeRegistration {
                request: request.clone(),
                cors,
            },
        );
        Ok(())
    }

    fn respond(&self, request: &Request) -> Result<()> {
        let body = request.args().first().cloned().unwrap_or(Value::Null);
        let session_id = request.arg_str(1)?.to_string();
        let status = request.arg_u64(2)?;
        let content_type = request
            .args()
            .get(3)
            .and_then(Value::as_str)
            .unwrap_or("application/json")
            .to_string();

        let code = u16::try_from(status)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|code| code.canonical_reason().is_some());
        let Some(code) = code else {
            // the responder misbehaved; the external caller still gets an
            // answer instead of waiting out the full timeout
            self.state.sessions.deposit(
                &session_id,
                HttpReply {
                    body: Value::String("unsupported internal HTTP status code".into()),
                    status: 500,
                    content_type: "text/plain".into(),
                },
            );
            return Err(BridgeError::ProtocolError(format!(
                "unsupported HTTP status code {}",
                status
            )));
        };

        let deposited = self.state.sessions.deposit(
            &session_id,
            HttpReply {
                body,
                status: code.as_u16(),
                content_type,
            },
        );
        if !deposited {
            // waiter timed out or never existed; dropped without error
            tracing::debug!("reply for session {} has no waiter, dropped", session_id);
        }
        Response::new(request).send();
        Ok(())
    }
}

impl TaskHandler for ServerController {
    fn task_names(&self) -> Vec<String> {
        vec![
            "setport".into(),
            "set-port".into(),
            "unsetport".into(),
            "unset-port".into(),
            "serve".into(),
            "respond".into(),
        ]
    }

    fn handle(&self, request: &Request) -> Result<()> {
        match request.task_name() {
            "setport" | "set-port" => self.set_port(request),
            "unsetport" | "unset-port" => self.unset_port(request),
            "serve" => self.serve(request),
            "respond" => self.respond(request),
            other => Err(BridgeError::UnknownTask(other.to_string())),
        }
    }
}

impl Drop for ServerController {
    fn drop(&mut self) {
        if let Some(mut server) = self.running.lock().take() {
            if let Some(shutdown) = server.shutdown.take() {
                let _ = shutdown.send(());
            }
            let _ = server.thread.join();
        }
    }
}

/// Body of the dedicated server thread: owns its own runtime so the bridge
/// worker pool stays synchronous.
fn run_server(
    state: Arc<GatewayState>,
    bind: String,
    port: u16,
    ready: mpsc::Sender<std::result::Result<u16, String>>,
    shutdown: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::bind((bind.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };
        let bound_port = match listener.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };
        let _ = ready.send(Ok(bound_port));

        // every path is dynamic, so the whole surface is the fallback
        let app = Router::new()
            .fallback(handlers::forward)
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
        .await;
        if let Err(e) = served {
            tracing::error!("http server failed: {}", e);
        }
    });
}
