// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Connection handler: turns one inbound HTTP request into one bridge
//! round-trip.
//!
//! Resolution order: 404 for an unregistered path, `OPTIONS` answered
//! straight from the table (CORS preflight, never forwarded), 405 for a
//! registered path without this method. Otherwise the stored `serve`
//! request is answered with `[sessionId, payload]` and the connection
//! blocks on the session table's bounded poll; 408 when the bound is
//! exceeded.

use crate::server::GatewayState;
use crate::session::HttpReply;
use axum::body::Body;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, Method, Request as HttpRequest, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use ubridge::Response as BridgeResponse;

/// Request bodies above this size are refused outright.
const BODY_LIMIT: usize = 16 * 1024 * 1024;

pub async fn forward(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(query_pairs): Query<Vec<(String, String)>>,
    request: HttpRequest<Body>,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // the lock is not held across any await
    let Some(route) = state.paths.read().resolve(&path, method.as_str()) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    if method == Method::OPTIONS {
        return preflight(&route.methods);
    }

    let Some(registration) = route.registration else {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, route.methods.join(", "))],
            "method not allowed",
        )
            .into_response();
    };

    let host = header_str(&request, header::HOST);
    let content_type = header_str(&request, header::CONTENT_TYPE);
    let bytes = match axum::body::to_bytes(request.into_body(), BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, "body too large").into_response(),
    };
    let body = parse_body(&bytes, &content_type);

    let session_id = state.sessions.allocate();
    tracing::debug!("{} {} -> session {}", method, path, session_id);
    let payload = json!({
        "method": method.as_str(),
        "path": path,
        "host": host,
        "ip": remote.ip().to_string(),
        "params": route.params,
        "query": fold_query(query_pairs),
        // multipart uploads are not unpacked; the slot stays for shape
        // compatibility with existing universal-side handlers
        "files": [],
        "body": body,
    });
    BridgeResponse::new(&registration.request)
        .put(session_id.clone())
        .put(payload)
        .send();

    match state
        .sessions
        .wait(&session_id, state.poll_interval, state.poll_cycles)
        .await
    {
        Some(reply) => http_response(reply, registration.cors),
        None => {
            tracing::warn!("session {} timed out waiting for a reply", session_id);
            (StatusCode::REQUEST_TIMEOUT, "timeout").into_response()
        }
    }
}

fn header_str(request: &HttpRequest<Body>, name: header::HeaderName) -> String {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// CORS preflight, answered from the table's registered methods.
fn preflight(methods: &[String]) -> Response {
    let allow = methods.join(", ");
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ALLOW, allow.clone())
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, allow)
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "*")
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// JSON bodies become structured data, everything else stays raw text.
fn parse_body(bytes: &[u8], content_type: &str) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    if content_type.contains("json") {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return value;
        }
    }
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}

/// Repeated query keys collapse into an array, in arrival order.
fn fold_query(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut query = Map::new();
    for (key, value) in pairs {
        match query.get_mut(&key) {
            None => {
                query.insert(key, Value::String(value));
            }
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }
    query
}

fn http_response(reply: HttpReply, cors: bool) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match reply.body {
        Value::Null => String::new(),
        Value::String(text) => text,
        structured => structured.to_string(),
    };
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, reply.content_type);
    if cors {
        builder = builder.header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    }
    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
