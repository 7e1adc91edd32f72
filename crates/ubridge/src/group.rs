// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Generic named-sub-handler collection with permission filtering.
//!
//! Both the capability sub-router and the device-info sub-router are
//! instances of this pattern: a set of named entries, a case-insensitive
//! index, and a precomputed permission union for registration-time
//! aggregation.

use crate::permissions::PermissionSet;
use std::collections::HashMap;
use std::sync::Arc;

/// An entry that can live in a [`HandlerGroup`].
pub trait NamedHandler: Send + Sync {
    /// Names under which this entry is addressed (matched case-insensitively).
    fn names(&self) -> Vec<String>;

    /// Platform permissions this entry needs.
    fn required_permissions(&self) -> PermissionSet {
        PermissionSet::new()
    }
}

/// Ordered collection of named sub-handlers with a case-insensitive index.
///
/// Duplicate names follow the registry convention: the later registration
/// wins for lookup, logged at `warn`.
pub struct HandlerGroup<H: NamedHandler + ?Sized> {
    entries: Vec<Arc<H>>,
    index: HashMap<String, usize>,
}

impl<H: NamedHandler + ?Sized> HandlerGroup<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn register(&mut self, entry: Arc<H>) {
        let position = self.entries.len();
        for name in entry.names() {
            let name = name.to_ascii_lowercase();
            if self.index.insert(name.clone(), position).is_some() {
                log::warn!("sub-handler '{}' re-registered, earlier entry shadowed", name);
            }
        }
        self.entries.push(entry);
    }

    /// Look up an entry by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&Arc<H>> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.entries[i])
    }

    /// All entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<H>> {
        self.entries.iter()
    }

    /// Union of every entry's required permissions, for registration-time
    /// aggregation by the owning task handler.
    pub fn union_permissions(&self) -> PermissionSet {
        let mut union = PermissionSet::new();
        for entry in &self.entries {
            union.extend(entry.required_permissions());
        }
        union
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: NamedHandler + ?Sized> Default for HandlerGroup<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::permission_set;

    struct Entry {
        names: Vec<String>,
        perms: PermissionSet,
    }

    impl NamedHandler for Entry {
        fn names(&self) -> Vec<String> {
            self.names.clone()
        }

        fn required_permissions(&self) -> PermissionSet {
            self.perms.clone()
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut group: HandlerGroup<Entry> = HandlerGroup::new();
        group.register(Arc::new(Entry {
            names: vec!["PhotoCapture".into()],
            perms: PermissionSet::new(),
        }));

        assert!(group.get("photocapture").is_some());
        assert!(group.get("PHOTOCAPTURE").is_some());
        assert!(group.get("other").is_none());
    }

    #[test]
    fn union_aggregates_all_entries() {
        let mut group: HandlerGroup<Entry> = HandlerGroup::new();
        group.register(Arc::new(Entry {
            names: vec!["a".into()],
            perms: permission_set(&["camera"]),
        }));
        group.register(Arc::new(Entry {
            names: vec!["b".into()],
            perms: permission_set(&["camera", "storage"]),
        }));

        let union = group.union_permissions();
        assert_eq!(union.len(), 2);
    }

    #[test]
    fn later_registration_shadows_earlier() {
        let mut group: HandlerGroup<Entry> = HandlerGroup::new();
        group.register(Arc::new(Entry {
            names: vec!["dup".into()],
            perms: permission_set(&["old"]),
        }));
        group.register(Arc::new(Entry {
            names: vec!["dup".into()],
            perms: permission_set(&["new"]),
        }));

        let found = group.get("dup").unwrap();
        assert!(found.required_permissions().contains(&"new".into()));
        // both entries stay in the collection; only the index moved
        assert_eq!(group.len(), 2);
    }
}
