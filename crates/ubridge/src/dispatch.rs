// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Dispatcher: resolves a request to a handler, gates it on permissions,
//! invokes it, and converts escaping failures into error responses.
//!
//! Per-request state machine:
//!
//! ```text
//! Received -> Routed -> PermissionChecked -> Executing -> Completed
//!                 |              |                |
//!                 v              v                v
//!              Rejected       Rejected         Faulted
//!          (not implemented) (missing perms) (error response)
//! ```
//!
//! Routing and permission failures are answered before invocation. Faults
//! are caught at this single boundary and never re-thrown across the
//! bridge; there are no retries anywhere — at most one execution attempt
//! per request.

use crate::config::BridgeConfig;
use crate::envelope::{Request, Response, ResponseSink};
use crate::error::{BridgeError, Result};
use crate::handler::TaskHandler;
use crate::permissions::{GrantAll, PermissionOracle};
use crate::registry::TaskRegistry;
use crossbeam::channel::{unbounded, Sender};
use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Builder for a [`Bridge`]; the registry is immutable once built.
pub struct BridgeBuilder {
    registry: TaskRegistry,
    oracle: Arc<dyn PermissionOracle>,
    sink: Option<Arc<dyn ResponseSink>>,
    config: BridgeConfig,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            oracle: Arc::new(GrantAll),
            sink: None,
            config: BridgeConfig::default(),
        }
    }

    /// Register a task handler (later registrations of a name win).
    #[must_use]
    pub fn register(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.registry.register(handler);
        self
    }

    /// Install the permission oracle collaborator.
    #[must_use]
    pub fn oracle(mut self, oracle: Arc<dyn PermissionOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Install the response delivery side effect.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ResponseSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration, spin up the worker pool, and hand out
    /// the bridge handle.
    pub fn build(self) -> Result<Bridge> {
        self.config.validate()?;
        let sink = self
            .sink
            .ok_or_else(|| BridgeError::Config("a response sink is required".into()))?;

        let shared = Arc::new(BridgeShared {
            registry: self.registry,
            oracle: self.oracle,
            sink,
        });

        let (tx, rx) = unbounded::<Request>();
        let mut workers = Vec::with_capacity(self.config.workers);
        for i in 0..self.config.workers {
            let shared = shared.clone();
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("ubridge-worker-{}", i))
                .spawn(move || {
                    while let Ok(request) = rx.recv() {
                        dispatch(&shared, &request);
                    }
                    log::debug!("worker exiting");
                })
                .map_err(|e| BridgeError::Io(e.to_string()))?;
            workers.push(handle);
        }

        log::info!(
            "bridge started: {} tasks, {} workers",
            shared.registry.len(),
            self.config.workers
        );

        Ok(Bridge {
            shared,
            tx: Some(tx),
            workers,
        })
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the bridge handle and its workers. All registries
/// are owned here, constructed once at startup — never ad hoc globals.
struct BridgeShared {
    registry: TaskRegistry,
    oracle: Arc<dyn PermissionOracle>,
    sink: Arc<dyn ResponseSink>,
}

/// The bridge-process object: owns the registry, the permission oracle,
/// the outbound sink, and a fixed-size worker pool executing inbound
/// requests in parallel.
pub struct Bridge {
    shared: Arc<BridgeShared>,
    tx: Option<Sender<Request>>,
    workers: Vec<JoinHandle<()>>,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Submit a raw wire tuple `[correlationId, taskName, args]`.
    ///
    /// Malformed messages are rejected before dispatch; when the
    /// correlation id slot is readable, a correlated error response is
    /// still delivered so the caller is never left waiting.
    pub fn submit_wire(&self, wire: &Value) -> Result<()> {
        match Request::from_wire(wire, self.shared.sink.clone()) {
            Ok(request) => {
                self.submit(request);
                Ok(())
            }
            Err(err) => {
                log::warn!("rejected inbound message: {}", err);
                if let Some(id) = wire.get(0).and_then(Value::as_str) {
                    self.shared
                        .sink
                        .deliver(json!([id, [[err.to_string()]]]), true);
                }
                Err(err)
            }
        }
    }

    /// Enqueue a parsed request for the worker pool.
    ///
    /// Invocation order across distinct requests is not guaranteed.
    pub fn submit(&self, request: Request) {
        log::debug!(
            "request #{} '{}' (id {}) queued",
            request.sequence(),
            request.task_name(),
            request.correlation_id()
        );
        if let Some(tx) = &self.tx {
            // Workers only exit after the sender is dropped, so this cannot fail
            // while `tx` is alive.
            let _ = tx.send(request);
        }
    }

    /// Dispatch a request synchronously on the calling thread; used by
    /// embedders that need completion before returning, and by tests.
    pub fn dispatch_now(&self, request: &Request) {
        dispatch(&self.shared, request);
    }

    /// Build a request bound to this bridge's sink.
    pub fn request(&self, correlation_id: &str, task_name: &str, args: Vec<Value>) -> Request {
        Request::new(correlation_id, task_name, args, self.shared.sink.clone())
    }

    /// Drain the queue and stop the workers.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

/// Run one request through the full state machine.
fn dispatch(shared: &BridgeShared, request: &Request) {
    // Routed
    let Some(task) = shared.registry.lookup(request.task_name()) else {
        let err = BridgeError::UnknownTask(request.task_name().to_string());
        log::warn!("request #{}: {}", request.sequence(), err);
        Response::new(request).send_error(&err.to_string());
        return;
    };

    // PermissionChecked
    if !task.self_handling() {
        let missing = shared.oracle.missing(task.permissions());
        if !missing.is_empty() {
            let err = BridgeError::PermissionDenied(
                missing.iter().map(|p| p.as_str().to_string()).collect(),
            );
            log::warn!("request #{} '{}': {}", request.sequence(), request.task_name(), err);
            Response::new(request).send_error(&err.to_string());
            return;
        }
    }

    // Executing; the handler alone decides how many responses to emit.
    let handler = task.handler().clone();
    let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(request)));
    match outcome {
        Ok(Ok(())) => {
            log::debug!("request #{} '{}' completed", request.sequence(), request.task_name());
        }
        Ok(Err(err)) => {
            log::warn!(
                "request #{} '{}' failed: {}",
                request.sequence(),
                request.task_name(),
                err
            );
            Response::new(request).send_error(&err.to_string());
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            let err = BridgeError::HandlerFault(message);
            log::error!(
                "request #{} '{}' panicked: {}",
                request.sequence(),
                request.task_name(),
                err
            );
            Response::new(request).send_error(&err.to_string());
        }
    }
}
