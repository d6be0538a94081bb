// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event ingestion: account resolution, matching, dedup and enqueue.

use std::sync::Arc;
use std::time::Duration;

use autodm_config::model::PipelineConfig;
use autodm_core::error::AutodmError;
use autodm_core::traits::{DedupCache, StorageAdapter, TaskQueue};
use autodm_core::types::{Automation, AutomationCounter, EngagementEvent, Trigger};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::matcher;

/// Queue carrying one task per trigger.
pub const TRIGGER_QUEUE: &str = "triggers";

/// Queue payload for one trigger task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerTask {
    pub trigger_id: String,
}

/// Reference to a trigger created by [`EventIngestor::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerHandle {
    pub trigger_id: String,
    pub automation_id: String,
    pub queue_entry_id: i64,
}

/// Matches inbound events against automations and enqueues triggers.
///
/// Ingestion never talks to the messaging platform; all outbound work runs
/// later in the worker pool.
pub struct EventIngestor {
    storage: Arc<dyn StorageAdapter>,
    dedup: Arc<dyn DedupCache>,
    queue: Arc<dyn TaskQueue>,
    dedup_ttl: Duration,
    max_attempts: i32,
}

impl EventIngestor {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        dedup: Arc<dyn DedupCache>,
        queue: Arc<dyn TaskQueue>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            storage,
            dedup,
            queue,
            dedup_ttl: Duration::from_secs(config.dedup_ttl_secs),
            max_attempts: config.max_attempts,
        }
    }

    /// Ingests one event addressed to `account_external_id`.
    ///
    /// Returns [`AutodmError::UnknownAccount`] for unknown or inactive
    /// accounts. Duplicate, unmatched and self-authored events yield an empty
    /// list. On a storage error the event's dedup mark is dropped again, so a
    /// redelivery is not mistaken for a duplicate.
    #[instrument(skip(self, event), fields(kind = %event.kind, event_id = %event.event_id))]
    pub async fn ingest(
        &self,
        account_external_id: &str,
        event: &EngagementEvent,
    ) -> Result<Vec<TriggerHandle>, AutodmError> {
        let account = match self
            .storage
            .get_account_by_external_id(account_external_id)
            .await?
        {
            Some(account) if account.is_active => account,
            _ => return Err(AutodmError::UnknownAccount(account_external_id.to_string())),
        };

        if event.sender_id == account.external_id {
            debug!("event written by the account itself, ignoring");
            return Ok(Vec::new());
        }

        let candidates = self
            .storage
            .list_candidate_automations(&account.id, event.kind)
            .await?;

        let mut handles = Vec::new();
        for automation in candidates {
            if !matcher::matches(&automation, &event.text, event.post_id.as_deref()) {
                continue;
            }

            if !self.dedup.claim(&event.event_id, self.dedup_ttl).await? {
                debug!(automation_id = %automation.id, "duplicate event, skipping");
                continue;
            }

            match self.create_trigger(&automation, event).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Let the platform's redelivery through.
                    if let Err(forget_err) = self.dedup.forget(&event.event_id).await {
                        error!(error = %forget_err, "dedup mark not released");
                    }
                    return Err(e);
                }
            }
        }

        Ok(handles)
    }

    /// Persists a pending trigger and enqueues its task. A trigger whose task
    /// could not be enqueued is removed again.
    async fn create_trigger(
        &self,
        automation: &Automation,
        event: &EngagementEvent,
    ) -> Result<TriggerHandle, AutodmError> {
        let trigger = Trigger::pending(automation, event);
        self.storage.insert_trigger(&trigger).await?;

        let queued = match serde_json::to_string(&TriggerTask {
            trigger_id: trigger.id.clone(),
        }) {
            Ok(payload) => {
                self.queue
                    .enqueue(TRIGGER_QUEUE, &payload, self.max_attempts)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        let queue_entry_id = match queued {
            Ok(id) => id,
            Err(e) => {
                if let Err(discard_err) = self.storage.discard_trigger(&trigger.id).await {
                    error!(trigger_id = %trigger.id, error = %discard_err, "orphan trigger not removed");
                }
                return Err(e);
            }
        };

        if let Err(e) = self
            .storage
            .increment_counter(&automation.id, AutomationCounter::Triggers)
            .await
        {
            error!(automation_id = %automation.id, error = %e, "trigger counter update failed");
        }

        info!(
            trigger_id = %trigger.id,
            automation_id = %automation.id,
            username = %event.username,
            "trigger created"
        );
        Ok(TriggerHandle {
            trigger_id: trigger.id,
            automation_id: automation.id.clone(),
            queue_entry_id,
        })
    }
}
