// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of the pipeline stages over shared adapters.

use std::sync::Arc;
use std::time::Duration;

use autodm_bus::EventBus;
use autodm_config::model::{OpenRouterConfig, PipelineConfig};
use autodm_core::traits::{
    DedupCache, MessagingConnector, ProviderAdapter, RateLimiter, StorageAdapter, TaskQueue,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::enhance::EnhancementChain;
use crate::ingest::EventIngestor;
use crate::poller::CommentPoller;
use crate::processor::TriggerProcessor;
use crate::reconciler::StaleTriggerReconciler;
use crate::worker::{WorkerPool, WorkerSettings};

/// Assembled pipeline stages sharing one storage, queue and bus.
pub struct Pipeline {
    pub ingestor: Arc<EventIngestor>,
    pub processor: Arc<TriggerProcessor>,
    pub workers: Arc<WorkerPool>,
    pub bus: Arc<EventBus>,
    storage: Arc<dyn StorageAdapter>,
    queue: Arc<dyn TaskQueue>,
    dedup: Arc<dyn DedupCache>,
    connector: Arc<dyn MessagingConnector>,
    config: PipelineConfig,
}

pub struct PipelineBuilder {
    storage: Arc<dyn StorageAdapter>,
    queue: Arc<dyn TaskQueue>,
    dedup: Arc<dyn DedupCache>,
    rate_limiter: Arc<dyn RateLimiter>,
    connector: Arc<dyn MessagingConnector>,
    provider: Option<Arc<dyn ProviderAdapter>>,
    bus: Option<Arc<EventBus>>,
    pipeline: PipelineConfig,
    openrouter: OpenRouterConfig,
}

impl PipelineBuilder {
    pub fn provider(mut self, provider: Option<Arc<dyn ProviderAdapter>>) -> Self {
        self.provider = provider;
        self
    }

    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn dedup(mut self, dedup: Arc<dyn DedupCache>) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn openrouter(mut self, config: OpenRouterConfig) -> Self {
        self.openrouter = config;
        self
    }

    pub fn build(self) -> Pipeline {
        let bus = self.bus.unwrap_or_default();
        let chain = EnhancementChain::new(self.provider, &self.openrouter);
        let ingestor = Arc::new(EventIngestor::new(
            self.storage.clone(),
            self.dedup.clone(),
            self.queue.clone(),
            &self.pipeline,
        ));
        let processor = Arc::new(TriggerProcessor::new(
            self.storage.clone(),
            self.rate_limiter,
            self.connector.clone(),
            chain,
            bus.clone(),
            &self.pipeline,
        ));
        let workers = Arc::new(WorkerPool::new(
            self.queue.clone(),
            processor.clone(),
            WorkerSettings::from(&self.pipeline),
        ));
        Pipeline {
            ingestor,
            processor,
            workers,
            bus,
            storage: self.storage,
            queue: self.queue,
            dedup: self.dedup,
            connector: self.connector,
            config: self.pipeline,
        }
    }
}

impl Pipeline {
    /// Starts a builder. `store` backs the queue, dedup and rate limiter
    /// unless they are overridden.
    pub fn builder<S>(
        store: Arc<S>,
        connector: Arc<dyn MessagingConnector>,
        config: PipelineConfig,
    ) -> PipelineBuilder
    where
        S: StorageAdapter + TaskQueue + DedupCache + RateLimiter + 'static,
    {
        PipelineBuilder {
            storage: store.clone(),
            queue: store.clone(),
            dedup: store.clone(),
            rate_limiter: store,
            connector,
            provider: None,
            bus: None,
            pipeline: config,
            openrouter: OpenRouterConfig::default(),
        }
    }

    pub fn reconciler(&self) -> StaleTriggerReconciler {
        StaleTriggerReconciler::new(
            self.storage.clone(),
            Duration::from_secs(self.config.stale_after_secs),
        )
        .with_housekeeping(
            self.dedup.clone(),
            self.queue.clone(),
            Duration::from_secs(self.config.queue_retention_secs),
        )
    }

    pub fn comment_poller(&self) -> CommentPoller {
        CommentPoller::new(
            self.storage.clone(),
            self.connector.clone(),
            self.ingestor.clone(),
        )
    }

    /// Spawns workers and, when their intervals are non-zero, the reconciler
    /// and the comment poller.
    pub fn spawn_background(&self, tasks: &mut JoinSet<()>, cancel: &CancellationToken) {
        tasks.spawn(self.workers.clone().run(cancel.clone()));

        if self.config.reconcile_interval_secs > 0 {
            let reconcile_every = Duration::from_secs(self.config.reconcile_interval_secs);
            tasks.spawn(self.reconciler().run(reconcile_every, cancel.clone()));
        } else {
            info!("reconciler disabled");
        }

        if self.config.comment_poll_interval_secs > 0 {
            let poll_every = Duration::from_secs(self.config.comment_poll_interval_secs);
            tasks.spawn(self.comment_poller().run(poll_every, cancel.clone()));
        } else {
            info!("comment poller disabled");
        }
    }
}
