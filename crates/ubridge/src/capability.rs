// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Capability sub-router.
//!
//! Multiplexes the `capability` task over a collection of registered
//! capability handlers. The first argument selects the sub-command:
//!
//! - `["perform", name, ...rest]` routes to the capability named `name`
//! - `["list-all"]` answers with the descriptors of exactly those
//!   capabilities whose permissions are all granted and which publish a
//!   descriptor

use crate::envelope::{Request, Response};
use crate::error::{BridgeError, Result};
use crate::group::{HandlerGroup, NamedHandler};
use crate::handler::TaskHandler;
use crate::permissions::{PermissionOracle, PermissionSet};
use serde_json::Value;
use std::sync::Arc;

/// A single native capability (photo capture, NFC scan, ...).
///
/// Capabilities are simple collaborators: the router owns routing and
/// permission filtering, the capability owns its platform I/O and any
/// serialization of its own shared resources.
pub trait CapabilityHandler: NamedHandler {
    /// Machine-readable self-description advertised through `list-all`.
    /// Capabilities without a descriptor are never advertised.
    fn descriptor(&self) -> Option<Value> {
        None
    }

    /// Execute the capability. `args` are the positions after the
    /// capability name; responses go out through `request`.
    fn perform(&self, request: &Request, args: &[Value]) -> Result<()>;
}

/// Routes `perform`/`list-all` over the registered capability collection.
pub struct CapabilityRouter {
    capabilities: HandlerGroup<dyn CapabilityHandler>,
    oracle: Arc<dyn PermissionOracle>,
}

impl CapabilityRouter {
    pub fn new(oracle: Arc<dyn PermissionOracle>) -> Self {
        Self {
            capabilities: HandlerGroup::new(),
            oracle,
        }
    }

    #[must_use]
    pub fn register(mut self, capability: Arc<dyn CapabilityHandler>) -> Self {
        self.capabilities.register(capability);
        self
    }

    fn perform(&self, request: &Request, name: &str, rest: &[Value]) -> Result<()> {
        let Some(capability) = self.capabilities.get(name) else {
            return Err(BridgeError::UnknownCapability(name.to_string()));
        };

        let missing = self.oracle.missing(&capability.required_permissions());
        if !missing.is_empty() {
            return Err(BridgeError::PermissionDenied(
                missing.iter().map(|p| p.as_str().to_string()).collect(),
            ));
        }

        log::debug!("capability '{}' performing", name);
        capability.perform(request, rest)
    }

    fn list_all(&self, request: &Request) -> Result<()> {
        let descriptors: Vec<Value> = self
            .capabilities
            .iter()
            .filter(|c| self.oracle.all_granted(&c.required_permissions()))
            .filter_map(|c| c.descriptor())
            .collect();
        Response::new(request).put(Value::Array(descriptors)).send();
        Ok(())
    }
}

impl TaskHandler for CapabilityRouter {
    fn task_names(&self) -> Vec<String> {
        vec!["capability".to_string()]
    }

    fn required_permissions(&self) -> PermissionSet {
        self.capabilities.union_permissions()
    }

    /// The router filters per capability; the dispatcher-level gate would
    /// otherwise block every request on the union.
    fn self_handles_permissions(&self) -> bool {
        true
    }

    fn handle(&self, request: &Request) -> Result<()> {
        let command = request.arg_str(0)?;
        match command.to_ascii_lowercase().as_str() {
            "perform" => {
                let name = request.arg_str(1)?;
                self.perform(request, name, request.args().get(2..).unwrap_or(&[]))
            }
            "list-all" => self.list_all(request),
            other => Err(BridgeError::HandlerFault(format!(
                "unknown capability command '{}'",
                other
            ))),
        }
    }
}
