// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Full HTTP round-trips: a live listener, a bridge, and a scripted
//! universal side answering forwarded hits through `respond`.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use ubridge::{Bridge, BridgeConfig, ResponseSink};
use ubridge_gateway::ServerController;

/// Sink that forwards every outbound wire to the simulator thread.
struct ForwardSink {
    tx: Mutex<mpsc::Sender<Value>>,
}

impl ResponseSink for ForwardSink {
    fn deliver(&self, wire: Value, _is_error: bool) {
        let _ = self.tx.lock().send(wire);
    }
}

struct Harness {
    port: u16,
    // keeps the workers and the listener alive for the test's duration
    _bridge: Arc<Bridge>,
    _controller: Arc<ServerController>,
}

/// Start a bridge + listener with a fixed route set and a scripted
/// universal side:
///
/// - `serve-echo`: GET and POST `/users/:id`, echoes the forwarded payload
/// - `serve-slow`: GET `/slow`, never answered
/// - `serve-weird`: GET `/weird`, answered with an unsupported status code
/// - `serve-cors`: GET `/cors` registered with the CORS option
fn start() -> Harness {
    let (tx, rx) = mpsc::channel::<Value>();
    let config = BridgeConfig {
        gateway_bind_address: "127.0.0.1".into(),
        gateway_poll_interval_ms: 5,
        gateway_poll_cycles: 100,
        ..Default::default()
    };

    let controller = Arc::new(ServerController::new(&config));
    let bridge = Arc::new(
        Bridge::builder()
            .register(controller.clone())
            .sink(Arc::new(ForwardSink { tx: Mutex::new(tx) }))
            .config(config)
            .build()
            .expect("bridge"),
    );

    {
        let bridge = bridge.clone();
        std::thread::spawn(move || {
            let next = AtomicU64::new(1);
            let respond = |session: &Value, body: Value, status: u64, mime: &str| {
                let id = format!("r-{}", next.fetch_add(1, Ordering::Relaxed));
                let _ = bridge.submit_wire(&json!([
                    id,
                    "respond",
                    [body, session, status, mime]
                ]));
            };

            for wire in rx.iter() {
                let correlation = wire[0].as_str().unwrap_or_default().to_string();
                let session = wire[1][1].clone();
                let payload = wire[1][2].clone();
                match correlation.as_str() {
                    "serve-echo" => {
                        let echo = json!({
                            "id": payload["params"]["id"],
                            "method": payload["method"],
                            "q": payload["query"],
                            "body": payload["body"],
                        });
                        respond(&session, echo, 200, "application/json");
                    }
                    "serve-weird" => {
                        respond(&session, json!("nope"), 999, "text/plain");
                    }
                    "serve-cors" => {
                        respond(&session, json!("ok"), 200, "text/plain");
                    }
                    // serve-slow deliberately never answered; everything else
                    // is an ack or an error report
                    _ => {}
                }
            }
        });
    }

    for (id, method, pattern, options) in [
        ("serve-echo", "GET", "/users/:id", json!({})),
        ("serve-echo", "POST", "/users/:id", json!({})),
        ("serve-slow", "GET", "/slow", json!({})),
        ("serve-weird", "GET", "/weird", json!({})),
        ("serve-cors", "GET", "/cors", json!({ "cors": true })),
    ] {
        bridge
            .submit_wire(&json!([id, "serve", [method, pattern, options]]))
            .unwrap();
    }
    bridge
        .submit_wire(&json!(["boot", "setport", [0]]))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let port = loop {
        if let Some(port) = controller.port() {
            // route registration runs on parallel workers; wait for all of
            // them before any request goes out
            let state = controller.state();
            let paths = state.paths.read();
            let ready = paths.resolve("/users/1", "POST").map_or(false, |hit| hit.registration.is_some())
                && paths.resolve("/users/1", "GET").map_or(false, |hit| hit.registration.is_some())
                && paths.resolve("/slow", "GET").is_some()
                && paths.resolve("/weird", "GET").is_some()
                && paths.resolve("/cors", "GET").is_some();
            if ready {
                break port;
            }
        }
        assert!(Instant::now() < deadline, "server did not come up");
        std::thread::sleep(Duration::from_millis(5));
    };

    Harness {
        port,
        _bridge: bridge,
        _controller: controller,
    }
}

fn url(harness: &Harness, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", harness.port, path)
}

#[test]
fn get_round_trip_echoes_params_and_query() {
    let harness = start();
    let response = reqwest::blocking::get(url(&harness, "/users/42?tag=a&tag=b&v=1")).unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: Value = response.json().unwrap();
    assert_eq!(body["id"], "42");
    assert_eq!(body["method"], "GET");
    assert_eq!(body["q"]["tag"], json!(["a", "b"]));
    assert_eq!(body["q"]["v"], "1");
    assert_eq!(body["body"], Value::Null);
}

#[test]
fn post_json_body_arrives_structured() {
    let harness = start();
    let client = reqwest::blocking::Client::new();
    let response = client
        .post(url(&harness, "/users/7/"))
        .json(&json!({ "x": 1 }))
        .send()
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().unwrap();
    // trailing slash tolerated by the route table
    assert_eq!(body["id"], "7");
    assert_eq!(body["method"], "POST");
    assert_eq!(body["body"], json!({ "x": 1 }));
}

#[test]
fn unregistered_path_is_404_wrong_method_is_405() {
    let harness = start();
    let client = reqwest::blocking::Client::new();

    let missing = client.get(url(&harness, "/nope")).send().unwrap();
    assert_eq!(missing.status(), 404);

    let wrong_method = client.post(url(&harness, "/slow")).send().unwrap();
    assert_eq!(wrong_method.status(), 405);
    assert_eq!(wrong_method.headers()["allow"].to_str().unwrap(), "GET");
}

#[test]
fn options_is_answered_from_the_table() {
    let harness = start();
    let client = reqwest::blocking::Client::new();
    let response = client
        .request(reqwest::Method::OPTIONS, url(&harness, "/users/1"))
        .send()
        .unwrap();

    assert_eq!(response.status(), 204);
    assert_eq!(
        response.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap(),
        "GET, POST"
    );
}

#[test]
fn unanswered_session_times_out_with_408() {
    let harness = start();
    let response = reqwest::blocking::get(url(&harness, "/slow")).unwrap();

    assert_eq!(response.status(), 408);
    assert_eq!(response.text().unwrap(), "timeout");
}

#[test]
fn unsupported_status_code_reaches_the_caller_as_500() {
    let harness = start();
    let response = reqwest::blocking::get(url(&harness, "/weird")).unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(
        response.text().unwrap(),
        "unsupported internal HTTP status code"
    );
}

#[test]
fn cors_registration_adds_the_origin_header() {
    let harness = start();
    let response = reqwest::blocking::get(url(&harness, "/cors")).unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"]
            .to_str()
            .unwrap(),
        "*"
    );
    assert_eq!(response.text().unwrap(), "ok");
}
