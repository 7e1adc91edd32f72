// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! # UBridge - Universal/Native Request Bridge
//!
//! A bidirectional request/response bridge between a script-hosted
//! "universal" engine and the native capabilities of the host process
//! (sensors, media, storage, networking). Callers send named,
//! argument-carrying requests; the bridge routes each one to exactly one
//! registered handler, enforces a capability-based permission gate,
//! executes the handler on a fixed worker pool, and returns a correlated
//! response asynchronously.
//!
//! ## Quick Start
//!
//! ```rust
//! use ubridge::{Bridge, Response, Request, TaskHandler};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! impl TaskHandler for Echo {
//!     fn task_names(&self) -> Vec<String> {
//!         vec!["echo".into()]
//!     }
//!
//!     fn handle(&self, request: &Request) -> ubridge::Result<()> {
//!         Response::new(request).put(request.args().to_vec()).send();
//!         Ok(())
//!     }
//! }
//!
//! let bridge = Bridge::builder()
//!     .register(Arc::new(Echo))
//!     .sink(Arc::new(|wire: serde_json::Value, _is_error: bool| {
//!         println!("outbound: {}", wire);
//!     }))
//!     .build()
//!     .unwrap();
//!
//! bridge.submit_wire(&serde_json::json!(["id-1", "echo", ["hello"]])).unwrap();
//! bridge.shutdown();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                      Calling Side                             |
//! |   script engine | HTTP gateway | embedder test harness        |
//! +--------------------------------------------------------------+
//! |                       Envelope                                |
//! |   [id, task, args] in  ->  [id, [err, ...data]] out           |
//! +--------------------------------------------------------------+
//! |                      Dispatcher                               |
//! |   registry lookup -> permission gate -> worker pool           |
//! +--------------------------------------------------------------+
//! |                       Handlers                                |
//! |   capability router | device-info router | discovery | ...    |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Owns the registry, oracle, sink, and worker pool |
//! | [`TaskHandler`] | The one polymorphic handler capability |
//! | [`Request`] / [`Response`] | Correlated message envelope |
//! | [`CapabilityRouter`] | `perform`/`list-all` sub-router |
//! | [`DeviceInfoRouter`] | Best-effort batched info sub-router |
//! | [`DiscoveryEngine`] | DNS-SD publish/discover with serialized resolve |

pub mod capability;
pub mod config;
pub mod device_info;
pub mod discovery;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod group;
pub mod handler;
pub mod permissions;
pub mod registry;

#[cfg(test)]
pub(crate) mod testutil;

pub use capability::{CapabilityHandler, CapabilityRouter};
pub use config::BridgeConfig;
pub use device_info::{DeviceInfoProvider, DeviceInfoRouter};
pub use discovery::{DiscoveredService, DiscoveryEngine, NsdBackend, NsdEvents};
pub use dispatch::{Bridge, BridgeBuilder};
pub use envelope::{Request, Response, ResponseSink};
pub use error::{BridgeError, Result};
pub use group::{HandlerGroup, NamedHandler};
pub use handler::TaskHandler;
pub use permissions::{permission_set, GrantAll, Permission, PermissionOracle, PermissionSet};
pub use registry::TaskRegistry;
