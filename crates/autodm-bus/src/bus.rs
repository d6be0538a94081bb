// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast-based event bus with per-account subscriptions.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::trace;

use crate::events::{BusEvent, PipelineEvent};

/// Default broadcast buffer per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out of pipeline notifications.
///
/// Publishing never blocks and never fails: with no subscribers the event is
/// simply dropped. Slow subscribers lag and are told how many events they missed.
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
    sequence: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish an event on the topic of `account_id`.
    pub fn publish(&self, account_id: &str, owner_id: &str, event: PipelineEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = BusEvent {
            sequence,
            account_id: account_id.to_string(),
            owner_id: owner_id.to_string(),
            timestamp: Utc::now(),
            event,
        };
        match self.sender.send(envelope) {
            Ok(receivers) => trace!(sequence, receivers, "bus event published"),
            Err(_) => trace!(sequence, "bus event dropped, no subscribers"),
        }
    }

    /// Subscribe to every account's events.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to one account's events.
    pub fn subscribe_account(&self, account_id: &str) -> AccountSubscription {
        AccountSubscription {
            account_id: account_id.to_string(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Outcome of waiting on an [`AccountSubscription`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(BusEvent),
    /// The subscriber fell behind and `n` events were discarded.
    Lagged(u64),
}

/// A receiver filtered to one account.
pub struct AccountSubscription {
    account_id: String,
    receiver: broadcast::Receiver<BusEvent>,
}

impl AccountSubscription {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Wait for the next event of this account. `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.account_id == self.account_id => {
                    return Some(Delivery::Event(event));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => return Some(Delivery::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
