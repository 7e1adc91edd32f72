// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Request/response envelope and correlation protocol.
//!
//! The wire format in both directions is a JSON tuple:
//!
//! - Request: `[correlationId, taskName, args]`
//! - Response: `[correlationId, args]` where `args[0]` is `null` on success
//!   or the one-element array `[errorMessage]` when the response signals an
//!   error.
//!
//! The correlation id is caller-assigned and opaque; the internal sequence
//! number is assigned at arrival and used only for logging and ordering,
//! never for correlation. Delivery of a serialized response is a single
//! externally-injected side effect ([`ResponseSink`]) so the envelope stays
//! transport-agnostic.

use crate::error::{BridgeError, Result};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide monotonic sequence counter for inbound requests.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Delivery side effect: post a serialized response to the calling side.
///
/// `is_error` mirrors the response's error flag for the sink's own logging;
/// the flag is not encoded in the wire tuple beyond the `args[0]` slot.
pub trait ResponseSink: Send + Sync {
    fn deliver(&self, wire: Value, is_error: bool);
}

/// Closures can act as sinks directly.
impl<F> ResponseSink for F
where
    F: Fn(Value, bool) + Send + Sync,
{
    fn deliver(&self, wire: Value, is_error: bool) {
        self(wire, is_error);
    }
}

/// An inbound bridge request, immutable once constructed.
#[derive(Clone)]
pub struct Request {
    correlation_id: String,
    sequence: u64,
    task_name: String,
    args: Vec<Value>,
    sink: Arc<dyn ResponseSink>,
}

impl Request {
    /// Build a request from its wire tuple `[correlationId, taskName, args]`.
    ///
    /// All three slots must be present with the right shape, otherwise this
    /// fails with [`BridgeError::MalformedMessage`]. The task name is
    /// lower-cased for routing.
    pub fn from_wire(wire: &Value, sink: Arc<dyn ResponseSink>) -> Result<Self> {
        let slots = wire
            .as_array()
            .ok_or_else(|| BridgeError::MalformedMessage("message is not an array".into()))?;
        let correlation_id = slots
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::MalformedMessage("missing correlation id".into()))?;
        let task_name = slots
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::MalformedMessage("missing task name".into()))?;
        let args = slots
            .get(2)
            .and_then(Value::as_array)
            .ok_or_else(|| BridgeError::MalformedMessage("missing argument array".into()))?;

        Ok(Self::new(correlation_id, task_name, args.clone(), sink))
    }

    /// Build a request directly (embedder side).
    pub fn new(
        correlation_id: &str,
        task_name: &str,
        args: Vec<Value>,
        sink: Arc<dyn ResponseSink>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            task_name: task_name.to_ascii_lowercase(),
            args,
            sink,
        }
    }

    /// Caller-assigned opaque correlation token.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Monotonic arrival sequence number (logging/ordering only).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Lower-cased task name used for routing.
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Positional, untyped arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Required string argument at `index`.
    pub fn arg_str(&self, index: usize) -> Result<&str> {
        self.args
            .get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::HandlerFault(format!("argument {} must be a string", index)))
    }

    /// Required unsigned integer argument at `index`.
    pub fn arg_u64(&self, index: usize) -> Result<u64> {
        self.args
            .get(index)
            .and_then(Value::as_u64)
            .ok_or_else(|| BridgeError::HandlerFault(format!("argument {} must be an integer", index)))
    }

    pub(crate) fn sink(&self) -> Arc<dyn ResponseSink> {
        self.sink.clone()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("correlation_id", &self.correlation_id)
            .field("sequence", &self.sequence)
            .field("task_name", &self.task_name)
            .field("args", &self.args)
            .finish()
    }
}

/// A response correlated to exactly one request.
///
/// A handler may legitimately deliver more than one response for the same
/// original request (e.g. a `serve` registration answered once per inbound
/// HTTP hit); callers must tolerate duplicate correlation ids.
pub struct Response {
    correlation_id: String,
    payload: Vec<Value>,
    is_error: bool,
    sink: Arc<dyn ResponseSink>,
}

impl Response {
    /// Start a response for `request`, preserving its correlation id.
    pub fn new(request: &Request) -> Self {
        Self {
            correlation_id: request.correlation_id().to_string(),
            payload: Vec::new(),
            is_error: false,
            sink: request.sink(),
        }
    }

    /// Append a value to the payload. Chainable.
    #[must_use]
    pub fn put(mut self, value: impl Into<Value>) -> Self {
        self.payload.push(value.into());
        self
    }

    /// Deliver the payload as-is (success).
    pub fn send(self) {
        self.deliver();
    }

    /// Mark the error flag, replace the payload with the one-element error
    /// array, and deliver.
    pub fn send_error(mut self, message: &str) {
        self.is_error = true;
        self.payload = vec![Value::String(message.to_string())];
        self.deliver();
    }

    /// Serialize to the wire tuple `[correlationId, args]`.
    ///
    /// Success: `args` is `[null, ...payload]`. Error: `args` is the single
    /// slot `[[errorMessage]]`.
    fn wire(&self) -> Value {
        let mut args: Vec<Value> = Vec::with_capacity(self.payload.len() + 1);
        if self.is_error {
            args.push(Value::Array(self.payload.clone()));
        } else {
            args.push(Value::Null);
            args.extend(self.payload.iter().cloned());
        }
        json!([self.correlation_id, args])
    }

    fn deliver(self) {
        let wire = self.wire();
        if self.is_error {
            log::debug!("response {} delivered with error flag", self.correlation_id);
        }
        self.sink.deliver(wire, self.is_error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingSink;

    #[test]
    fn parse_lowercases_task_name() {
        let sink = RecordingSink::new();
        let req = Request::from_wire(&json!(["id-1", "SetPort", [33029]]), sink).unwrap();
        assert_eq!(req.task_name(), "setport");
        assert_eq!(req.correlation_id(), "id-1");
        assert_eq!(req.args(), &[json!(33029)]);
    }

    #[test]
    fn parse_rejects_missing_slots() {
        let sink = RecordingSink::new();
        for wire in [
            json!("not a tuple"),
            json!([]),
            json!(["id-only"]),
            json!(["id", "task"]),
            json!(["id", "task", "args must be an array"]),
            json!([42, "task", []]),
        ] {
            let err = Request::from_wire(&wire, sink.clone()).unwrap_err();
            assert!(matches!(err, BridgeError::MalformedMessage(_)), "{:?}", wire);
        }
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let sink = RecordingSink::new();
        let a = Request::from_wire(&json!(["a", "t", []]), sink.clone()).unwrap();
        let b = Request::from_wire(&json!(["b", "t", []]), sink).unwrap();
        assert!(b.sequence() > a.sequence());
    }

    #[test]
    fn response_preserves_correlation_id() {
        let sink = RecordingSink::new();
        let req = Request::from_wire(&json!(["corr-7", "noop", []]), sink.clone()).unwrap();
        Response::new(&req).put("data").send();

        let delivered = sink.delivered.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, json!(["corr-7", [null, "data"]]));
        assert!(!delivered[0].1);
    }

    #[test]
    fn error_response_replaces_payload() {
        let sink = RecordingSink::new();
        let req = Request::from_wire(&json!(["corr-8", "noop", []]), sink.clone()).unwrap();
        Response::new(&req).put("will be dropped").send_error("boom");

        let delivered = sink.delivered.lock();
        assert_eq!(delivered[0].0, json!(["corr-8", [["boom"]]]));
        assert!(delivered[0].1);
    }

    #[test]
    fn put_is_chainable() {
        let sink = RecordingSink::new();
        let req = Request::from_wire(&json!(["c", "t", []]), sink.clone()).unwrap();
        Response::new(&req).put(1).put("two").put(json!({"three": 3})).send();

        let delivered = sink.delivered.lock();
        assert_eq!(delivered[0].0, json!(["c", [null, 1, "two", {"three": 3}]]));
    }
}
