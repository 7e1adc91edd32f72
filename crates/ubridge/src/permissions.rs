// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Capability-based permission model.
//!
//! Every handler advertises the set of platform permissions it needs; the
//! dispatcher queries a [`PermissionOracle`] collaborator before invocation
//! and rejects the request with the exact missing set. A handler that
//! declares itself self-handling performs its own finer-grained filtering
//! instead of being blocked entirely at the dispatcher.

use std::collections::BTreeSet;
use std::fmt;

/// A single named platform permission (e.g. `camera`, `fine-location`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Permission(String);

impl Permission {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// An ordered permission set; ordering keeps error listings stable.
pub type PermissionSet = BTreeSet<Permission>;

/// Build a permission set from string names.
pub fn permission_set(names: &[&str]) -> PermissionSet {
    names.iter().map(|n| Permission::new(*n)).collect()
}

/// Collaborator deciding whether a permission is currently granted.
///
/// Queried before every dispatch; implementations must be cheap and
/// callable from any worker thread.
pub trait PermissionOracle: Send + Sync {
    fn check_granted(&self, permission: &Permission) -> bool;

    /// The subset of `required` that is not currently granted, in set order.
    fn missing(&self, required: &PermissionSet) -> Vec<Permission> {
        required
            .iter()
            .filter(|p| !self.check_granted(p))
            .cloned()
            .collect()
    }

    fn all_granted(&self, required: &PermissionSet) -> bool {
        required.iter().all(|p| self.check_granted(p))
    }
}

/// Closures can act as oracles directly.
impl<F> PermissionOracle for F
where
    F: Fn(&Permission) -> bool + Send + Sync,
{
    fn check_granted(&self, permission: &Permission) -> bool {
        self(permission)
    }
}

/// Oracle granting everything; the default for embedders without a
/// platform permission system.
pub struct GrantAll;

impl PermissionOracle for GrantAll {
    fn check_granted(&self, _permission: &Permission) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_is_ordered_and_exact() {
        let required = permission_set(&["camera", "audio", "storage"]);
        let oracle = |p: &Permission| p.as_str() == "storage";

        let missing = oracle.missing(&required);
        let names: Vec<&str> = missing.iter().map(Permission::as_str).collect();
        // BTreeSet order, storage granted and therefore absent
        assert_eq!(names, vec!["audio", "camera"]);
        assert!(!oracle.all_granted(&required));
    }

    #[test]
    fn grant_all_grants_everything() {
        let required = permission_set(&["anything"]);
        assert!(GrantAll.all_granted(&required));
        assert!(GrantAll.missing(&required).is_empty());
    }

    #[test]
    fn empty_set_is_always_granted() {
        let oracle = |_: &Permission| false;
        assert!(oracle.all_granted(&PermissionSet::new()));
    }
}
