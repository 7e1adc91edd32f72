// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Platform DNS-SD backend contract.
//!
//! The engine never talks to the platform registry directly; it issues
//! operations through [`NsdBackend`] and receives completions through
//! [`NsdEvents`]. Backends may complete synchronously (calling back while
//! the issuing call is still on the stack) or from their own threads; the
//! engine handles both.

use super::{DiscoveredService, ServiceInfo, ServiceRef};
use std::sync::Arc;

/// Completion events fed back into the engine by the backend.
pub trait NsdEvents: Send + Sync {
    fn on_registered(&self);
    fn on_registration_failed(&self, error_code: i32);
    fn on_unregistered(&self);
    fn on_unregistration_failed(&self, error_code: i32);
    fn on_service_found(&self, service: ServiceRef);
    fn on_service_lost(&self, name: &str);
    fn on_resolved(&self, service: DiscoveredService);
    fn on_resolve_failed(&self, service: &ServiceRef, error_code: i32);
}

/// Platform service-registry primitives (Android NSD, Avahi, Bonjour).
///
/// The resolve primitive is assumed unreliable under concurrent calls;
/// the engine guarantees it is never called again before the previous
/// resolve reported success or failure.
pub trait NsdBackend: Send + Sync {
    /// Advertise `info`; completion via `on_registered` /
    /// `on_registration_failed`.
    fn register_service(&self, info: &ServiceInfo, events: Arc<dyn NsdEvents>);

    /// Withdraw the current advertisement; completion via
    /// `on_unregistered` / `on_unregistration_failed`.
    fn unregister_service(&self, events: Arc<dyn NsdEvents>);

    /// Start the background browse for `service_type`; found/lost services
    /// are reported for the process lifetime.
    fn start_browse(&self, service_type: &str, events: Arc<dyn NsdEvents>);

    /// Resolve one found service to address, port, and attributes.
    fn resolve(&self, service: &ServiceRef, events: Arc<dyn NsdEvents>);
}

/// Backend that accepts every operation and never reports peers; the
/// default for embedders without a platform registry.
pub struct NullBackend;

impl NsdBackend for NullBackend {
    fn register_service(&self, _info: &ServiceInfo, events: Arc<dyn NsdEvents>) {
        events.on_registered();
    }

    fn unregister_service(&self, events: Arc<dyn NsdEvents>) {
        events.on_unregistered();
    }

    fn start_browse(&self, _service_type: &str, _events: Arc<dyn NsdEvents>) {}

    fn resolve(&self, _service: &ServiceRef, _events: Arc<dyn NsdEvents>) {}
}
