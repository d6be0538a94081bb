// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits consumed by the pipeline.
//!
//! [`StorageAdapter`] is the repository of accounts, automations, triggers and
//! contacts. [`TaskQueue`], [`DedupCache`] and [`RateLimiter`] are split out so
//! they can be backed by a different store than the repository.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AutodmError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Account, Automation, AutomationCounter, Contact, QueueEntry, RateDecision, Trigger,
    TriggerStatus, TriggerType,
};

/// Repository of pipeline records.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), AutodmError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), AutodmError>;

    // --- Accounts ---

    async fn upsert_account(&self, account: &Account) -> Result<(), AutodmError>;

    async fn get_account(&self, id: &str) -> Result<Option<Account>, AutodmError>;

    /// Looks up an account by its platform-side id.
    async fn get_account_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Account>, AutodmError>;

    // --- Automations ---

    async fn upsert_automation(&self, automation: &Automation) -> Result<(), AutodmError>;

    async fn get_automation(&self, id: &str) -> Result<Option<Automation>, AutodmError>;

    /// Active automations of one type for an account, highest priority first,
    /// oldest first among equal priorities.
    async fn list_candidate_automations(
        &self,
        account_id: &str,
        trigger_type: TriggerType,
    ) -> Result<Vec<Automation>, AutodmError>;

    /// Active automations of one type across every account.
    async fn list_active_automations(
        &self,
        trigger_type: TriggerType,
    ) -> Result<Vec<Automation>, AutodmError>;

    /// Atomically increments one of an automation's running counters.
    async fn increment_counter(
        &self,
        automation_id: &str,
        counter: AutomationCounter,
    ) -> Result<(), AutodmError>;

    // --- Triggers ---

    async fn insert_trigger(&self, trigger: &Trigger) -> Result<(), AutodmError>;

    async fn get_trigger(&self, id: &str) -> Result<Option<Trigger>, AutodmError>;

    /// Compare-and-set `pending -> processing`.
    ///
    /// Returns `false` when the trigger was not pending, so at most one caller
    /// ever wins the claim.
    async fn claim_trigger(&self, id: &str) -> Result<bool, AutodmError>;

    /// Persists the outcome of a processing trigger.
    ///
    /// Only applies while the stored row is still `processing`; returns `false`
    /// when the row had already moved on.
    async fn complete_trigger(&self, trigger: &Trigger) -> Result<bool, AutodmError>;

    /// Compare-and-set `processing -> pending`.
    ///
    /// Hands a claimed trigger back to the queue after an infrastructure
    /// failure that happened before any outbound call.
    async fn release_trigger(&self, id: &str) -> Result<bool, AutodmError>;

    /// Deletes a trigger that is still `pending`. Used when its task could not
    /// be enqueued.
    async fn discard_trigger(&self, id: &str) -> Result<bool, AutodmError>;

    /// Number of `sent` triggers for one user under one automation.
    async fn count_sent_for_user(
        &self,
        automation_id: &str,
        external_user_id: &str,
    ) -> Result<i64, AutodmError>;

    /// `dm_sent_at` of the user's most recent `sent` trigger under one automation.
    async fn last_sent_for_user(
        &self,
        automation_id: &str,
        external_user_id: &str,
    ) -> Result<Option<String>, AutodmError>;

    /// Moves `processing` triggers last updated before `older_than` to `failed`.
    ///
    /// Returns the ids of the swept triggers.
    async fn fail_stale_triggers(
        &self,
        older_than: &str,
        reason: &str,
    ) -> Result<Vec<String>, AutodmError>;

    async fn count_triggers_by_status(&self) -> Result<Vec<(TriggerStatus, i64)>, AutodmError>;

    // --- Contacts ---

    /// Creates or bumps the contact rollup after a successful send.
    async fn record_contact_send(
        &self,
        account_id: &str,
        external_user_id: &str,
        username: &str,
        is_follower: bool,
    ) -> Result<(), AutodmError>;

    async fn get_contact(
        &self,
        account_id: &str,
        external_user_id: &str,
    ) -> Result<Option<Contact>, AutodmError>;
}

/// Persistent at-least-once work queue.
#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    /// Enqueues a payload. Returns the entry id.
    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, AutodmError>;

    /// Leases the next available entry for `lease`.
    ///
    /// Entries whose lease expired without an ack become available again.
    async fn dequeue(
        &self,
        queue_name: &str,
        lease: Duration,
    ) -> Result<Option<QueueEntry>, AutodmError>;

    /// Marks an entry as completed.
    async fn ack(&self, id: i64) -> Result<(), AutodmError>;

    /// Records a failed attempt.
    ///
    /// The entry becomes available again after `retry_after` unless its
    /// attempts are exhausted, in which case it is parked as `failed`.
    async fn fail(&self, id: i64, retry_after: Duration) -> Result<(), AutodmError>;

    /// Deletes `completed` and `failed` entries last updated more than
    /// `older_than` ago. Returns the number removed.
    async fn purge_finished(&self, older_than: Duration) -> Result<usize, AutodmError>;
}

/// Short-TTL "seen" markers for inbound events.
#[async_trait]
pub trait DedupCache: Send + Sync + 'static {
    /// Atomically marks `key` as seen for `ttl`.
    ///
    /// Returns `true` if this call set the mark, `false` if a live mark existed.
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, AutodmError>;

    /// Drops the mark for `key`, so a redelivered event is accepted again.
    async fn forget(&self, key: &str) -> Result<(), AutodmError>;

    /// Drops expired marks. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize, AutodmError>;
}

/// Sliding-window admission counter.
#[async_trait]
pub trait RateLimiter: Send + Sync + 'static {
    /// Admits one event for `key` if fewer than `limit` were admitted within
    /// `window`. An admitted event reserves its slot immediately.
    async fn try_acquire(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateDecision, AutodmError>;

    /// Gives back the most recent slot admitted for `key`, for an event that
    /// ended without an outbound send.
    async fn release(&self, key: &str) -> Result<(), AutodmError>;
}
