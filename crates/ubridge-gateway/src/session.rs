// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Session table: in-flight HTTP waits keyed by session id.
//!
//! Each inbound HTTP hit allocates a session, forwards it through the
//! bridge, and then polls its slot at a fixed interval for a bounded cycle
//! count. A `respond` task deposits the reply into the slot; a deposit for
//! a session whose waiter already timed out (or never existed) is dropped
//! without error.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A reply deposited by the universal side for one waiting connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub body: Value,
    pub status: u16,
    pub content_type: String,
}

/// Concurrent map of `sessionId -> Option<reply>`; `None` marks a waiter
/// that has not been answered yet.
pub struct SessionTable {
    sessions: DashMap<String, Option<HttpReply>>,
    next_id: AtomicU64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh session id and register its empty waiting slot.
    pub fn allocate(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.sessions.insert(id.clone(), None);
        id
    }

    /// Deposit `reply` for session `id`. Returns `false` when no waiter is
    /// registered (timed out or unknown) — the reply is dropped.
    pub fn deposit(&self, id: &str, reply: HttpReply) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut slot) if slot.is_none() => {
                *slot = Some(reply);
                true
            }
            _ => false,
        }
    }

    /// Poll session `id` every `interval` for up to `cycles` rounds.
    ///
    /// The slot is removed on completion either way, so a reply arriving
    /// after the timeout finds nothing and is dropped.
    pub async fn wait(&self, id: &str, interval: Duration, cycles: u32) -> Option<HttpReply> {
        for _ in 0..cycles {
            if let Some(slot) = self.sessions.get(id) {
                if slot.is_some() {
                    drop(slot);
                    return self.sessions.remove(id).and_then(|(_, reply)| reply);
                }
            }
            tokio::time::sleep(interval).await;
        }
        self.sessions.remove(id);
        None
    }

    pub fn pending(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn reply() -> HttpReply {
        HttpReply {
            body: json!({"ok": true}),
            status: 200,
            content_type: "application/json".into(),
        }
    }

    #[tokio::test]
    async fn deposit_wakes_the_waiter() {
        let table = Arc::new(SessionTable::new());
        let id = table.allocate();

        let waiter = {
            let table = table.clone();
            let id = id.clone();
            tokio::spawn(async move { table.wait(&id, Duration::from_millis(1), 100).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(table.deposit(&id, reply()));

        assert_eq!(waiter.await.unwrap(), Some(reply()));
        assert_eq!(table.pending(), 0);
    }

    #[tokio::test]
    async fn timeout_clears_the_slot_and_drops_late_replies() {
        let table = SessionTable::new();
        let id = table.allocate();

        assert_eq!(table.wait(&id, Duration::from_millis(1), 3).await, None);
        assert_eq!(table.pending(), 0);
        // late reply finds no waiter
        assert!(!table.deposit(&id, reply()));
    }

    #[tokio::test]
    async fn deposit_for_unknown_session_is_refused() {
        let table = SessionTable::new();
        assert!(!table.deposit("no-such-session", reply()));
    }

    #[test]
    fn session_ids_are_unique() {
        let table = SessionTable::new();
        let a = table.allocate();
        let b = table.allocate();
        assert_ne!(a, b);
        assert_eq!(table.pending(), 2);
    }

    #[test]
    fn second_deposit_is_refused() {
        let table = SessionTable::new();
        let id = table.allocate();
        assert!(table.deposit(&id, reply()));
        assert!(!table.deposit(&id, reply()));
    }
}
