// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Shared helpers for unit tests.

use crate::envelope::ResponseSink;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Sink that records every delivered wire tuple.
pub(crate) struct RecordingSink {
    pub delivered: Mutex<Vec<(Value, bool)>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
        })
    }

    /// Wire tuples delivered so far.
    pub(crate) fn wires(&self) -> Vec<Value> {
        self.delivered.lock().iter().map(|(w, _)| w.clone()).collect()
    }

    /// Error message of the delivery at `index`, if it was an error.
    pub(crate) fn error_at(&self, index: usize) -> Option<String> {
        let delivered = self.delivered.lock();
        let (wire, is_error) = delivered.get(index)?;
        if !*is_error {
            return None;
        }
        wire.get(1)?
            .get(0)?
            .get(0)?
            .as_str()
            .map(str::to_string)
    }
}

impl ResponseSink for RecordingSink {
    fn deliver(&self, wire: Value, is_error: bool) {
        self.delivered.lock().push((wire, is_error));
    }
}
