// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded worker pool over the trigger queue.
//!
//! Each worker leases one task at a time, runs the [`TriggerProcessor`]
//! under the task timeout and acks. A task error or timeout is an
//! infrastructure failure: the entry is released for retry with exponential
//! backoff until its attempts run out.

use std::sync::Arc;
use std::time::Duration;

use autodm_config::model::PipelineConfig;
use autodm_core::error::AutodmError;
use autodm_core::traits::TaskQueue;
use autodm_core::types::QueueEntry;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ingest::{TRIGGER_QUEUE, TriggerTask};
use crate::processor::TriggerProcessor;

/// Extra lease time beyond the task timeout before a lease may be stolen.
const LEASE_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub workers: usize,
    pub task_timeout: Duration,
    pub retry_base: Duration,
    pub poll_interval: Duration,
}

impl From<&PipelineConfig> for WorkerSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            task_timeout: Duration::from_secs(config.task_timeout_secs),
            retry_base: Duration::from_secs(config.retry_base_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Delay before retry number `attempts + 1`: `base * 2^attempts`.
pub fn retry_delay(base: Duration, attempts: i32) -> Duration {
    let exponent = u32::try_from(attempts.max(0)).unwrap_or(0).min(16);
    base.saturating_mul(1u32 << exponent)
}

/// Outcome of handling one leased entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Acked,
    Retried,
}

pub struct WorkerPool {
    queue: Arc<dyn TaskQueue>,
    processor: Arc<TriggerProcessor>,
    settings: WorkerSettings,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        processor: Arc<TriggerProcessor>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            processor,
            settings,
        }
    }

    /// Runs `workers` loops until `cancel` fires, then waits for in-flight
    /// tasks to finish.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(workers = self.settings.workers, "worker pool started");
        let mut set = JoinSet::new();
        for worker_id in 0..self.settings.workers {
            let pool = self.clone();
            let cancel = cancel.clone();
            set.spawn(async move { pool.worker_loop(worker_id, cancel).await });
        }
        while let Some(result) = set.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "worker task panicked");
            }
        }
        info!("worker pool stopped");
    }

    async fn worker_loop(&self, worker_id: usize, cancel: CancellationToken) {
        debug!(worker_id, "worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(worker_id, error = %e, "queue access failed"),
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
        debug!(worker_id, "worker stopped");
    }

    /// Leases and handles at most one entry. `None` when the queue is empty.
    pub async fn run_once(&self) -> Result<Option<TaskOutcome>, AutodmError> {
        let lease = self.settings.task_timeout + LEASE_GRACE;
        let Some(entry) = self.queue.dequeue(TRIGGER_QUEUE, lease).await? else {
            return Ok(None);
        };
        self.handle(entry).await.map(Some)
    }

    /// Drains the queue until nothing is immediately available.
    pub async fn drain(&self) -> Result<usize, AutodmError> {
        let mut handled = 0;
        while self.run_once().await?.is_some() {
            handled += 1;
        }
        Ok(handled)
    }

    async fn handle(&self, entry: QueueEntry) -> Result<TaskOutcome, AutodmError> {
        let task: TriggerTask = match serde_json::from_str(&entry.payload) {
            Ok(task) => task,
            Err(e) => {
                error!(entry_id = entry.id, error = %e, "malformed trigger task, dropping");
                self.queue.ack(entry.id).await?;
                return Ok(TaskOutcome::Acked);
            }
        };

        let result = tokio::time::timeout(
            self.settings.task_timeout,
            self.processor.process(&task.trigger_id),
        )
        .await;

        let failure = match result {
            Ok(Ok(_)) => {
                self.queue.ack(entry.id).await?;
                return Ok(TaskOutcome::Acked);
            }
            Ok(Err(e)) => e,
            Err(_) => AutodmError::Timeout {
                duration: self.settings.task_timeout,
            },
        };

        let delay = retry_delay(self.settings.retry_base, entry.attempts);
        warn!(
            entry_id = entry.id,
            trigger_id = %task.trigger_id,
            attempt = entry.attempts + 1,
            max_attempts = entry.max_attempts,
            retry_in = ?delay,
            error = %failure,
            "trigger task failed"
        );
        self.queue.fail(entry.id, delay).await?;
        Ok(TaskOutcome::Retried)
    }
}
