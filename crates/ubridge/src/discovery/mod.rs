// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Network-service discovery and publication engine.
//!
//! Advertises this node as a DNS-SD service and discovers peers through a
//! platform backend ([`NsdBackend`]). The platform's resolve primitive is
//! assumed unreliable under concurrent calls, so resolution is strictly
//! serialized: found services queue up and at most one resolve is in
//! flight at any time. The engine likewise never keeps two advertisements
//! active — a second `publish` while one is registered or still pending
//! fails with "already started".
//!
//! The engine is itself an ordinary task handler for `publish`,
//! `discover`, and `unpublish`, a peer of capability handlers rather than
//! a separate protocol.

use crate::envelope::{Request, Response};
use crate::error::{BridgeError, Result};
use crate::handler::TaskHandler;
use crate::permissions::PermissionSet;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Weak};

mod backend;

pub use backend::{NsdBackend, NsdEvents, NullBackend};

/// A service reference as reported by the browse listener; not yet
/// resolved to an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub name: String,
    pub service_type: String,
}

/// The advertisement registered for this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub service_type: String,
    pub port: u16,
    pub attributes: BTreeMap<String, String>,
}

/// A fully-resolved peer, keyed by name in the discovered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub attributes: BTreeMap<String, String>,
}

impl DiscoveredService {
    fn to_value(&self) -> Value {
        let txt: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        json!({
            "name": self.name,
            "ip": self.address,
            "port": self.port,
            "txt": txt,
        })
    }
}

/// Publication state machine: one outstanding advertisement at most.
enum PublishState {
    Idle,
    /// Advertisement sent to the backend, confirmation pending; the
    /// publishing request is answered on confirm/fail.
    Registering { request: Request, name: String },
    Registered { name: String },
    /// Unregistration sent to the backend; the stashed unpublish request is
    /// answered once the platform confirms.
    Unregistering { request: Request, name: String },
}

impl PublishState {
    fn published_name(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Registering { name, .. }
            | Self::Registered { name }
            | Self::Unregistering { name, .. } => Some(name),
        }
    }
}

struct EngineInner {
    browsing: bool,
    publish: PublishState,
    discovered: HashMap<String, DiscoveredService>,
    /// Not-yet-resolved service references, resolved strictly in order.
    resolve_queue: VecDeque<ServiceRef>,
    /// Mutual-exclusion token for the single-flight resolver.
    currently_resolving: bool,
}

/// The discovery engine. Construct with [`DiscoveryEngine::new`]; the
/// returned `Arc` is registered with the bridge and handed to the backend
/// as its event target.
pub struct DiscoveryEngine {
    backend: Arc<dyn NsdBackend>,
    service_type: String,
    inner: Mutex<EngineInner>,
    me: Weak<DiscoveryEngine>,
}

impl DiscoveryEngine {
    pub fn new(backend: Arc<dyn NsdBackend>, service_type: &str) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            backend,
            service_type: service_type.to_string(),
            inner: Mutex::new(EngineInner {
                browsing: false,
                publish: PublishState::Idle,
                discovered: HashMap::new(),
                resolve_queue: VecDeque::new(),
                currently_resolving: false,
            }),
            me: me.clone(),
        })
    }

    fn events(&self) -> Arc<dyn NsdEvents> {
        // The engine only hands itself out after Arc::new_cyclic completed.
        self.me.upgrade().expect("engine dropped while in use")
    }

    /// Currently resolved peers, unordered.
    pub fn discovered(&self) -> Vec<DiscoveredService> {
        self.inner.lock().discovered.values().cloned().collect()
    }

    /// Start the background browse on first use.
    fn ensure_browsing(&self) {
        let start = {
            let mut inner = self.inner.lock();
            if inner.browsing {
                false
            } else {
                inner.browsing = true;
                true
            }
        };
        if start {
            log::info!("discovery: browsing for '{}'", self.service_type);
            self.backend.start_browse(&self.service_type, self.events());
        }
    }

    fn publish(&self, request: &Request) -> Result<()> {
        self.ensure_browsing();

        let name = request.arg_str(0)?.to_string();
        let port = request.arg_u64(1)?;
        let port = u16::try_from(port)
            .map_err(|_| BridgeError::HandlerFault(format!("port {} out of range", port)))?;
        let mut attributes = BTreeMap::new();
        if let Some(txt) = request.args().get(2).and_then(Value::as_object) {
            for (key, value) in txt {
                let value = value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                attributes.insert(key.clone(), value);
            }
        }

        {
            let mut inner = self.inner.lock();
            if !matches!(inner.publish, PublishState::Idle) {
                return Err(BridgeError::AlreadyStarted("mDNS service".into()));
            }
            inner.publish = PublishState::Registering {
                request: request.clone(),
                name: name.clone(),
            };
        }

        log::info!("discovery: publishing '{}' on port {}", name, port);
        let info = ServiceInfo {
            name,
            service_type: self.service_type.clone(),
            port,
            attributes,
        };
        self.backend.register_service(&info, self.events());
        Ok(())
    }

    fn discover(&self, request: &Request) -> Result<()> {
        self.ensure_browsing();
        let services: Vec<Value> = self
            .discovered()
            .iter()
            .map(DiscoveredService::to_value)
            .collect();
        Response::new(request).put(Value::Array(services)).send();
        Ok(())
    }

    fn unpublish(&self, request: &Request) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            match std::mem::replace(&mut inner.publish, PublishState::Idle) {
                PublishState::Registered { name } => {
                    inner.publish = PublishState::Unregistering {
                        request: request.clone(),
                        name,
                    };
                }
                other => {
                    inner.publish = other;
                    return Err(BridgeError::NotStarted(
                        "cannot stop a service before it is started".into(),
                    ));
                }
            }
        }

        log::info!("discovery: unpublishing");
        self.backend.unregister_service(self.events());
        Ok(())
    }

    /// Advance the sequential resolver.
    ///
    /// No-op while a resolution is in flight unless the in-flight one just
    /// completed successfully, in which case its queue entry is popped and
    /// the next is started immediately.
    fn try_sequential_resolve(&self, after_success: bool) {
        let next = {
            let mut inner = self.inner.lock();
            if inner.currently_resolving && !after_success {
                return;
            }
            if after_success {
                inner.resolve_queue.pop_front();
            }
            match inner.resolve_queue.front() {
                None => {
                    inner.currently_resolving = false;
                    None
                }
                Some(service) => {
                    let service = service.clone();
                    inner.currently_resolving = true;
                    Some(service)
                }
            }
        };
        // Backend call outside the lock: the backend may complete
        // synchronously and re-enter the event methods.
        if let Some(service) = next {
            log::debug!("discovery: resolving '{}'", service.name);
            self.backend.resolve(&service, self.events());
        }
    }
}

impl NsdEvents for DiscoveryEngine {
    fn on_registered(&self) {
        let request = {
            let mut inner = self.inner.lock();
            match std::mem::replace(&mut inner.publish, PublishState::Idle) {
                PublishState::Registering { request, name } => {
                    inner.publish = PublishState::Registered { name };
                    Some(request)
                }
                other => {
                    inner.publish = other;
                    None
                }
            }
        };
        if let Some(request) = request {
            log::info!("discovery: service registered");
            Response::new(&request).send();
        }
    }

    fn on_registration_failed(&self, error_code: i32) {
        let request = {
            let mut inner = self.inner.lock();
            match std::mem::replace(&mut inner.publish, PublishState::Idle) {
                PublishState::Registering { request, .. } => Some(request),
                other => {
                    inner.publish = other;
                    None
                }
            }
        };
        if let Some(request) = request {
            log::warn!("discovery: registration failed (code {})", error_code);
            Response::new(&request).send_error(&format!(
                "service registration failed (backend error {})",
                error_code
            ));
        }
    }

    fn on_unregistered(&self) {
        let request = {
            let mut inner = self.inner.lock();
            match std::mem::replace(&mut inner.publish, PublishState::Idle) {
                PublishState::Unregistering { request, .. } => Some(request),
                other => {
                    inner.publish = other;
                    None
                }
            }
        };
        if let Some(request) = request {
            log::info!("discovery: service unregistered");
            Response::new(&request).send();
        }
    }

    fn on_unregistration_failed(&self, error_code: i32) {
        let request = {
            let mut inner = self.inner.lock();
            match std::mem::replace(&mut inner.publish, PublishState::Idle) {
                PublishState::Unregistering { request, name } => {
                    // the advertisement is still out there
                    inner.publish = PublishState::Registered { name };
                    Some(request)
                }
                other => {
                    inner.publish = other;
                    None
                }
            }
        };
        if let Some(request) = request {
            log::warn!("discovery: unregistration failed (code {})", error_code);
            Response::new(&request).send_error(&format!(
                "service unregistration failed (backend error {})",
                error_code
            ));
        }
    }

    fn on_service_found(&self, service: ServiceRef) {
        {
            let mut inner = self.inner.lock();
            let own = inner
                .publish
                .published_name()
                .is_some_and(|name| name.eq_ignore_ascii_case(&service.name));
            if service.service_type.contains(&self.service_type) && !own {
                log::debug!("discovery: found '{}'", service.name);
                inner.resolve_queue.push_back(service);
            }
        }
        self.try_sequential_resolve(false);
    }

    fn on_service_lost(&self, name: &str) {
        let removed = self.inner.lock().discovered.remove(name).is_some();
        if removed {
            log::info!("discovery: lost '{}'", name);
        }
    }

    fn on_resolved(&self, service: DiscoveredService) {
        log::info!(
            "discovery: resolved '{}' at {}:{}",
            service.name,
            service.address,
            service.port
        );
        self.inner
            .lock()
            .discovered
            .insert(service.name.clone(), service);
        self.try_sequential_resolve(true);
    }

    fn on_resolve_failed(&self, service: &ServiceRef, error_code: i32) {
        log::warn!(
            "discovery: resolve of '{}' failed (code {})",
            service.name,
            error_code
        );
        let mut inner = self.inner.lock();
        // drop the failed entry so it is never retried, clear the in-flight
        // flag, and stop; the next found-event restarts the resolver
        inner.resolve_queue.pop_front();
        inner.currently_resolving = false;
    }
}

impl TaskHandler for DiscoveryEngine {
    fn task_names(&self) -> Vec<String> {
        vec!["publish".into(), "discover".into(), "unpublish".into()]
    }

    fn required_permissions(&self) -> PermissionSet {
        PermissionSet::new()
    }

    fn handle(&self, request: &Request) -> Result<()> {
        match request.task_name() {
            "publish" => self.publish(request),
            "discover" => self.discover(request),
            "unpublish" => self.unpublish(request),
            other => Err(BridgeError::UnknownTask(other.to_string())),
        }
    }
}
