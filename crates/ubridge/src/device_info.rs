// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Device-info sub-router.
//!
//! Handles the `read-device-info` task: the first argument lists the
//! requested info categories (`battery`, `cpu`, `mem`, ...). Every
//! registered provider whose category matches and whose permissions are
//! granted contributes to one accumulated object, answered as a single
//! combined response.
//!
//! Unknown or unauthorized categories are silently skipped — a deliberate
//! best-effort policy so that partial results stay useful. This is the one
//! routing miss in the system that is not an error.

use crate::envelope::{Request, Response};
use crate::error::{BridgeError, Result};
use crate::group::{HandlerGroup, NamedHandler};
use crate::handler::TaskHandler;
use crate::permissions::{PermissionOracle, PermissionSet};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Supplies one or more device-info categories.
pub trait DeviceInfoProvider: NamedHandler {
    /// Write the value(s) for `category` into the shared accumulator.
    fn collect(&self, category: &str, accumulator: &mut Map<String, Value>) -> Result<()>;
}

/// Accumulates granted providers' answers into one combined response.
pub struct DeviceInfoRouter {
    providers: HandlerGroup<dyn DeviceInfoProvider>,
    oracle: Arc<dyn PermissionOracle>,
}

impl DeviceInfoRouter {
    pub fn new(oracle: Arc<dyn PermissionOracle>) -> Self {
        Self {
            providers: HandlerGroup::new(),
            oracle,
        }
    }

    #[must_use]
    pub fn register(mut self, provider: Arc<dyn DeviceInfoProvider>) -> Self {
        self.providers.register(provider);
        self
    }
}

impl TaskHandler for DeviceInfoRouter {
    fn task_names(&self) -> Vec<String> {
        vec!["read-device-info".to_string()]
    }

    fn required_permissions(&self) -> PermissionSet {
        self.providers.union_permissions()
    }

    /// Filtering happens per category; an ungranted provider only drops its
    /// own category instead of blocking the whole batch.
    fn self_handles_permissions(&self) -> bool {
        true
    }

    fn handle(&self, request: &Request) -> Result<()> {
        let categories = request
            .args()
            .first()
            .and_then(Value::as_array)
            .ok_or_else(|| {
                BridgeError::HandlerFault("argument 0 must be a category list".into())
            })?;

        let mut accumulator = Map::new();
        for category in categories {
            let Some(category) = category.as_str() else {
                continue;
            };
            let Some(provider) = self.providers.get(category) else {
                log::debug!("device-info category '{}' unknown, skipped", category);
                continue;
            };
            if !self.oracle.all_granted(&provider.required_permissions()) {
                log::debug!("device-info category '{}' unauthorized, skipped", category);
                continue;
            }
            provider.collect(category, &mut accumulator)?;
        }

        Response::new(request).put(Value::Object(accumulator)).send();
        Ok(())
    }
}
