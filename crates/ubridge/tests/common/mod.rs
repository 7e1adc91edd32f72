// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Shared fixtures for integration tests.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use ubridge::ResponseSink;

/// Sink that records every delivered wire tuple.
pub struct RecordingSink {
    pub delivered: Mutex<Vec<(Value, bool)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
        })
    }

    pub fn wires(&self) -> Vec<Value> {
        self.delivered.lock().iter().map(|(w, _)| w.clone()).collect()
    }

    /// Error message of the delivery at `index`, if it was an error.
    pub fn error_at(&self, index: usize) -> Option<String> {
        let delivered = self.delivered.lock();
        let (wire, is_error) = delivered.get(index)?;
        if !*is_error {
            return None;
        }
        wire.get(1)?.get(0)?.get(0)?.as_str().map(str::to_string)
    }

    /// Block until `count` deliveries arrived or the deadline passes.
    pub fn wait_for(&self, count: usize, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.delivered.lock().len() >= count {
                return true;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        false
    }
}

impl ResponseSink for RecordingSink {
    fn deliver(&self, wire: Value, is_error: bool) {
        self.delivered.lock().push((wire, is_error));
    }
}
