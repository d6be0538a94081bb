// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sweeps triggers stuck in `processing` and prunes spent bookkeeping rows.

use std::sync::Arc;
use std::time::Duration;

use autodm_core::error::AutodmError;
use autodm_core::traits::{DedupCache, StorageAdapter, TaskQueue};
use autodm_core::types::format_timestamp;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const REASON_PROCESSING_TIMED_OUT: &str = "processing timed out";

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Ids of the triggers moved to `failed`.
    pub failed: Vec<String>,
    pub dedup_purged: usize,
    pub queue_purged: usize,
}

/// Queue and dedup stores pruned by each sweep.
struct Housekeeping {
    dedup: Arc<dyn DedupCache>,
    queue: Arc<dyn TaskQueue>,
    queue_retention: Duration,
}

pub struct StaleTriggerReconciler {
    storage: Arc<dyn StorageAdapter>,
    stale_after: Duration,
    housekeeping: Option<Housekeeping>,
}

impl StaleTriggerReconciler {
    pub fn new(storage: Arc<dyn StorageAdapter>, stale_after: Duration) -> Self {
        Self {
            storage,
            stale_after,
            housekeeping: None,
        }
    }

    /// Also purge expired dedup marks and finished queue entries older than
    /// `queue_retention` on every sweep.
    pub fn with_housekeeping(
        mut self,
        dedup: Arc<dyn DedupCache>,
        queue: Arc<dyn TaskQueue>,
        queue_retention: Duration,
    ) -> Self {
        self.housekeeping = Some(Housekeeping {
            dedup,
            queue,
            queue_retention,
        });
        self
    }

    /// Fails every `processing` trigger untouched for longer than the
    /// threshold, then prunes. Pruning failures are logged, not returned.
    pub async fn sweep(&self) -> Result<SweepReport, AutodmError> {
        let age = chrono::Duration::from_std(self.stale_after)
            .map_err(|e| AutodmError::Internal(format!("stale threshold out of range: {e}")))?;
        let cutoff = Utc::now()
            .checked_sub_signed(age)
            .map(format_timestamp)
            .unwrap_or_default();
        let failed = self
            .storage
            .fail_stale_triggers(&cutoff, REASON_PROCESSING_TIMED_OUT)
            .await?;
        if !failed.is_empty() {
            info!(count = failed.len(), "stale triggers failed");
        }

        let mut report = SweepReport {
            failed,
            ..SweepReport::default()
        };
        if let Some(housekeeping) = &self.housekeeping {
            match housekeeping.dedup.purge_expired().await {
                Ok(n) => report.dedup_purged = n,
                Err(e) => warn!(error = %e, "dedup purge failed"),
            }
            match housekeeping
                .queue
                .purge_finished(housekeeping.queue_retention)
                .await
            {
                Ok(n) => report.queue_purged = n,
                Err(e) => warn!(error = %e, "queue purge failed"),
            }
            if report.dedup_purged + report.queue_purged > 0 {
                info!(
                    dedup = report.dedup_purged,
                    queue = report.queue_purged,
                    "expired rows purged"
                );
            }
        }
        Ok(report)
    }

    /// Sweeps every `interval` until cancelled. A zero interval disables the loop.
    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        if interval.is_zero() {
            info!("reconciler disabled");
            return;
        }
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "stale trigger sweep failed");
                    }
                }
            }
        }
    }
}
