// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process dedup cache and rate limiter.
//!
//! Single-process alternatives to the SQLite-backed implementations, built
//! on `DashMap` entry locking so check-and-set stays atomic under
//! concurrent workers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use autodm_core::error::AutodmError;
use autodm_core::traits::{DedupCache, RateLimiter};
use autodm_core::types::RateDecision;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Dedup markers held in memory until their TTL elapses.
#[derive(Debug, Default)]
pub struct InMemoryDedup {
    marks: DashMap<String, Instant>,
}

impl InMemoryDedup {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupCache for InMemoryDedup {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, AutodmError> {
        let now = Instant::now();
        match self.marks.entry(key.to_string()) {
            Entry::Occupied(mut existing) => {
                if *existing.get() > now {
                    return Ok(false);
                }
                existing.insert(now + ttl);
                Ok(true)
            }
            Entry::Vacant(slot) => {
                slot.insert(now + ttl);
                Ok(true)
            }
        }
    }

    async fn forget(&self, key: &str) -> Result<(), AutodmError> {
        self.marks.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, AutodmError> {
        let now = Instant::now();
        let before = self.marks.len();
        self.marks.retain(|_, expires_at| *expires_at > now);
        Ok(before.saturating_sub(self.marks.len()))
    }
}

/// Sliding-window admission log per key.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn try_acquire(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateDecision, AutodmError> {
        let now = Instant::now();
        let mut events = self.windows.entry(key.to_string()).or_default();
        while let Some(oldest) = events.front() {
            if now.duration_since(*oldest) >= window {
                events.pop_front();
            } else {
                break;
            }
        }

        let current = u32::try_from(events.len()).unwrap_or(u32::MAX);
        if current >= limit {
            return Ok(RateDecision::Limited { current });
        }
        events.push_back(now);
        Ok(RateDecision::Allowed {
            remaining: limit - current - 1,
        })
    }

    async fn release(&self, key: &str) -> Result<(), AutodmError> {
        if let Some(mut events) = self.windows.get_mut(key) {
            events.pop_back();
        }
        Ok(())
    }
}
