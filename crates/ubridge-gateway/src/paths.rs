// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Path table: `(pathPattern, method) -> serving request`.
//!
//! Patterns are segment lists; a segment starting with `:` is a parameter
//! that matches any single incoming segment and captures it by name.
//! Segment counts must match, except that a single trailing empty segment
//! (a trailing slash) on either side is tolerated. Entries persist for the
//! process lifetime of the server.

use std::collections::{BTreeMap, HashMap};
use ubridge::Request;

/// One registered responder: the `serve` request that is answered once per
/// inbound HTTP hit, plus its response options.
#[derive(Clone)]
pub struct ServeRegistration {
    pub request: Request,
    /// Answer with `Access-Control-Allow-Origin: *`.
    pub cors: bool,
}

struct RouteEntry {
    pattern: String,
    methods: HashMap<String, ServeRegistration>,
}

/// The result of resolving an incoming path against the table.
pub struct RouteMatch {
    /// Captured `:name` parameters, by name.
    pub params: BTreeMap<String, String>,
    /// Methods registered for the matched pattern, uppercased.
    pub methods: Vec<String>,
    /// The registration for the requested method, if any.
    pub registration: Option<ServeRegistration>,
}

/// Ordered route table; earlier registrations win on overlapping patterns.
#[derive(Default)]
pub struct PathTable {
    routes: Vec<RouteEntry>,
}

impl PathTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register `registration` for `(pattern, method)`. Re-registering the
    /// same pair replaces the previous responder.
    pub fn register(&mut self, pattern: &str, method: &str, registration: ServeRegistration) {
        let method = method.to_ascii_uppercase();
        if let Some(entry) = self.routes.iter_mut().find(|e| e.pattern == pattern) {
            if entry.methods.insert(method.clone(), registration).is_some() {
                tracing::warn!("route {} {} re-registered, previous responder replaced", method, pattern);
            }
            return;
        }
        let mut methods = HashMap::new();
        methods.insert(method, registration);
        self.routes.push(RouteEntry {
            pattern: pattern.to_string(),
            methods,
        });
    }

    /// Resolve `path` to its route, independent of method. `None` means no
    /// pattern matches (404); a match with `registration: None` means the
    /// path exists but not for this method (405).
    pub fn resolve(&self, path: &str, method: &str) -> Option<RouteMatch> {
        let method = method.to_ascii_uppercase();
        for entry in &self.routes {
            if let Some(params) = match_pattern(&entry.pattern, path) {
                let mut methods: Vec<String> = entry.methods.keys().cloned().collect();
                methods.sort();
                return Some(RouteMatch {
                    params,
                    methods,
                    registration: entry.methods.get(&method).cloned(),
                });
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Match `path` against `pattern`, capturing `:name` segments.
fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let mut wanted: Vec<&str> = pattern.split('/').collect();
    let mut given: Vec<&str> = path.split('/').collect();
    // one trailing slash is tolerated on either side
    if wanted.len() > 1 && wanted.last() == Some(&"") {
        wanted.pop();
    }
    if given.len() > 1 && given.last() == Some(&"") {
        given.pop();
    }
    if wanted.len() != given.len() {
        return None;
    }

    let mut params = BTreeMap::new();
    for (want, got) in wanted.iter().zip(given.iter()) {
        if let Some(name) = want.strip_prefix(':') {
            params.insert(name.to_string(), (*got).to_string());
        } else if want != got {
            return None;
        }
    }
    Some(params)
}
