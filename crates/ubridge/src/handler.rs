// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! The task handler contract.

use crate::envelope::Request;
use crate::error::Result;
use crate::permissions::PermissionSet;

/// A native task handler registered with the bridge.
///
/// One polymorphic capability covers every handler kind; composites that
/// filter permissions per sub-handler set [`self_handles_permissions`] and
/// are then invoked without the dispatcher-level gate.
///
/// A handler is solely responsible for eventually producing zero, one, or
/// more responses for each request it accepts; the dispatcher never sends
/// an implicit success. Returning `Err` (or panicking) is converted into a
/// single error response at the dispatcher boundary.
///
/// Handlers must not assume exclusive ownership of shared platform
/// resources across calls: distinct requests run in parallel on the worker
/// pool, so per-instance state needs its own mutual exclusion. Requests to
/// different handlers must never block on each other.
///
/// [`self_handles_permissions`]: TaskHandler::self_handles_permissions
pub trait TaskHandler: Send + Sync {
    /// Task names served by this handler (matched case-insensitively).
    fn task_names(&self) -> Vec<String>;

    /// Union of platform permissions this handler needs, aggregated over
    /// every sub-handler it owns.
    fn required_permissions(&self) -> PermissionSet {
        PermissionSet::new()
    }

    /// Whether this handler performs its own finer-grained permission
    /// filtering instead of being blocked entirely by the dispatcher.
    fn self_handles_permissions(&self) -> bool {
        false
    }

    fn handle(&self, request: &Request) -> Result<()>;
}
