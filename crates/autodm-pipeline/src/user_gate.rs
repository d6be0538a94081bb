// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(automation, user) serialization.
//!
//! Exclusive within one process only.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type GateKey = (String, String);

/// Keyed async mutex over `(automation_id, external_user_id)`.
#[derive(Debug, Clone, Default)]
pub struct UserGate {
    locks: Arc<DashMap<GateKey, Arc<Mutex<()>>>>,
}

/// Held while a trigger for one user is between its gate check and its
/// terminal state. Dropping it releases the key.
#[derive(Debug)]
pub struct UserGuard {
    locks: Arc<DashMap<GateKey, Arc<Mutex<()>>>>,
    key: GateKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `(automation_id, user_id)`.
    pub async fn lock(&self, automation_id: &str, user_id: &str) -> UserGuard {
        let key = (automation_id.to_string(), user_id.to_string());
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        UserGuard {
            locks: self.locks.clone(),
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map's own reference left: nobody holds or waits on the key.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
