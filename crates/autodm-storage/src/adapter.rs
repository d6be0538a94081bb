// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage, queue, dedup and rate-limit traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use autodm_config::model::StorageConfig;
use autodm_core::types::{
    Account, Automation, AutomationCounter, Contact, QueueEntry, RateDecision, Trigger,
    TriggerStatus, TriggerType,
};
use autodm_core::{
    AdapterType, AutodmError, DedupCache, HealthStatus, PluginAdapter, RateLimiter,
    StorageAdapter, TaskQueue,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, AutodmError> {
        self.db.get().ok_or_else(|| AutodmError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Looks up one queue entry, whatever its status.
    pub async fn queue_entry(&self, id: i64) -> Result<Option<QueueEntry>, AutodmError> {
        queries::queue::get_entry(self.db()?, id).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, AutodmError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AutodmError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), AutodmError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| AutodmError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), AutodmError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Accounts ---

    async fn upsert_account(&self, account: &Account) -> Result<(), AutodmError> {
        queries::accounts::upsert_account(self.db()?, account).await
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, AutodmError> {
        queries::accounts::get_account(self.db()?, id).await
    }

    async fn get_account_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Account>, AutodmError> {
        queries::accounts::get_account_by_external_id(self.db()?, external_id).await
    }

    // --- Automations ---

    async fn upsert_automation(&self, automation: &Automation) -> Result<(), AutodmError> {
        queries::automations::upsert_automation(self.db()?, automation).await
    }

    async fn get_automation(&self, id: &str) -> Result<Option<Automation>, AutodmError> {
        queries::automations::get_automation(self.db()?, id).await
    }

    async fn list_candidate_automations(
        &self,
        account_id: &str,
        trigger_type: TriggerType,
    ) -> Result<Vec<Automation>, AutodmError> {
        queries::automations::list_candidate_automations(self.db()?, account_id, trigger_type)
            .await
    }

    async fn list_active_automations(
        &self,
        trigger_type: TriggerType,
    ) -> Result<Vec<Automation>, AutodmError> {
        queries::automations::list_active_automations(self.db()?, trigger_type).await
    }

    async fn increment_counter(
        &self,
        automation_id: &str,
        counter: AutomationCounter,
    ) -> Result<(), AutodmError> {
        queries::automations::increment_counter(self.db()?, automation_id, counter).await
    }

    // --- Triggers ---

    async fn insert_trigger(&self, trigger: &Trigger) -> Result<(), AutodmError> {
        queries::triggers::insert_trigger(self.db()?, trigger).await
    }

    async fn get_trigger(&self, id: &str) -> Result<Option<Trigger>, AutodmError> {
        queries::triggers::get_trigger(self.db()?, id).await
    }

    async fn claim_trigger(&self, id: &str) -> Result<bool, AutodmError> {
        queries::triggers::claim_trigger(self.db()?, id).await
    }

    async fn complete_trigger(&self, trigger: &Trigger) -> Result<bool, AutodmError> {
        queries::triggers::complete_trigger(self.db()?, trigger).await
    }

    async fn release_trigger(&self, id: &str) -> Result<bool, AutodmError> {
        queries::triggers::release_trigger(self.db()?, id).await
    }

    async fn discard_trigger(&self, id: &str) -> Result<bool, AutodmError> {
        queries::triggers::discard_trigger(self.db()?, id).await
    }

    async fn count_sent_for_user(
        &self,
        automation_id: &str,
        external_user_id: &str,
    ) -> Result<i64, AutodmError> {
        queries::triggers::count_sent_for_user(self.db()?, automation_id, external_user_id).await
    }

    async fn last_sent_for_user(
        &self,
        automation_id: &str,
        external_user_id: &str,
    ) -> Result<Option<String>, AutodmError> {
        queries::triggers::last_sent_for_user(self.db()?, automation_id, external_user_id).await
    }

    async fn fail_stale_triggers(
        &self,
        older_than: &str,
        reason: &str,
    ) -> Result<Vec<String>, AutodmError> {
        queries::triggers::fail_stale_triggers(self.db()?, older_than, reason).await
    }

    async fn count_triggers_by_status(&self) -> Result<Vec<(TriggerStatus, i64)>, AutodmError> {
        queries::triggers::count_by_status(self.db()?).await
    }

    // --- Contacts ---

    async fn record_contact_send(
        &self,
        account_id: &str,
        external_user_id: &str,
        username: &str,
        is_follower: bool,
    ) -> Result<(), AutodmError> {
        queries::contacts::record_send(
            self.db()?,
            account_id,
            external_user_id,
            username,
            is_follower,
        )
        .await
    }

    async fn get_contact(
        &self,
        account_id: &str,
        external_user_id: &str,
    ) -> Result<Option<Contact>, AutodmError> {
        queries::contacts::get_contact(self.db()?, account_id, external_user_id).await
    }
}

#[async_trait]
impl TaskQueue for SqliteStorage {
    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, AutodmError> {
        queries::queue::enqueue(self.db()?, queue_name, payload, max_attempts).await
    }

    async fn dequeue(
        &self,
        queue_name: &str,
        lease: Duration,
    ) -> Result<Option<QueueEntry>, AutodmError> {
        queries::queue::dequeue(self.db()?, queue_name, lease).await
    }

    async fn ack(&self, id: i64) -> Result<(), AutodmError> {
        queries::queue::ack(self.db()?, id).await
    }

    async fn fail(&self, id: i64, retry_after: Duration) -> Result<(), AutodmError> {
        queries::queue::fail(self.db()?, id, retry_after).await
    }

    async fn purge_finished(&self, older_than: Duration) -> Result<usize, AutodmError> {
        queries::queue::purge_finished(self.db()?, older_than).await
    }
}

#[async_trait]
impl DedupCache for SqliteStorage {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, AutodmError> {
        queries::dedup::claim(self.db()?, key, ttl).await
    }

    async fn forget(&self, key: &str) -> Result<(), AutodmError> {
        queries::dedup::forget(self.db()?, key).await
    }

    async fn purge_expired(&self) -> Result<usize, AutodmError> {
        queries::dedup::purge_expired(self.db()?).await
    }
}

#[async_trait]
impl RateLimiter for SqliteStorage {
    async fn try_acquire(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateDecision, AutodmError> {
        queries::rate::try_acquire(self.db()?, key, limit, window).await
    }

    async fn release(&self, key: &str) -> Result<(), AutodmError> {
        queries::rate::release(self.db()?, key).await
    }
}
