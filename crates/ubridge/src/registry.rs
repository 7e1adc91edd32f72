// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Task registry: name to handler mapping, built once at startup.

use crate::handler::TaskHandler;
use crate::permissions::PermissionSet;
use std::collections::HashMap;
use std::sync::Arc;

/// One registered task: the handler plus its permission union, snapshotted
/// at registration time.
#[derive(Clone)]
pub struct RegisteredTask {
    handler: Arc<dyn TaskHandler>,
    permissions: PermissionSet,
    self_handling: bool,
}

impl RegisteredTask {
    pub fn handler(&self) -> &Arc<dyn TaskHandler> {
        &self.handler
    }

    /// Precomputed union of required permissions.
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn self_handling(&self) -> bool {
        self.self_handling
    }
}

/// Mapping of task names to handlers. Immutable after startup; names are
/// unique within one registry instance.
///
/// Registering a name twice silently replaces the earlier entry — the later
/// registration wins, matching the behavior callers have always seen. The
/// replacement is logged at `warn` so it never happens unnoticed.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, RegisteredTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under every task name it serves.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let entry = RegisteredTask {
            permissions: handler.required_permissions(),
            self_handling: handler.self_handles_permissions(),
            handler,
        };
        for name in entry.handler.task_names() {
            let name = name.to_ascii_lowercase();
            if self.tasks.insert(name.clone(), entry.clone()).is_some() {
                log::warn!("task '{}' re-registered, earlier handler replaced", name);
            } else {
                log::debug!("task '{}' registered", name);
            }
        }
    }

    /// Look up the handler for a lower-cased task name.
    pub fn lookup(&self, task_name: &str) -> Option<&RegisteredTask> {
        self.tasks.get(task_name)
    }

    /// All registered task names, unordered.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
