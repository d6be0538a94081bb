// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` assembles the full pipeline over a temp SQLite database,
//! a [`MockMessaging`] platform and, optionally, a [`MockProvider`]. One
//! active account is seeded. Tests ingest events and then call
//! [`TestHarness::drain`] to run queued triggers inline.

use std::sync::Arc;

use autodm_bus::EventBus;
use autodm_config::model::{OpenRouterConfig, PipelineConfig, StorageConfig};
use autodm_core::traits::{DedupCache, ProviderAdapter, RateLimiter, StorageAdapter};
use autodm_core::types::{
    Account, Automation, EngagementEvent, Trigger, TriggerType,
};
use autodm_core::AutodmError;
use autodm_pipeline::{InMemoryDedup, InMemoryRateLimiter, Pipeline, TriggerHandle};
use autodm_storage::SqliteStorage;

use crate::mock_messaging::{MockConnector, MockMessaging};
use crate::mock_provider::MockProvider;

pub const ACCOUNT_ID: &str = "acc-1";
pub const ACCOUNT_EXTERNAL_ID: &str = "17841400000000001";
pub const OWNER_ID: &str = "owner-1";

pub struct TestHarnessBuilder {
    pipeline: PipelineConfig,
    models: Option<Vec<String>>,
    in_memory_guards: bool,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            models: None,
            in_memory_guards: false,
            rate_limiter: None,
        }
    }

    /// Caps sends per account per window.
    pub fn with_rate_limit(mut self, per_hour: u32) -> Self {
        self.pipeline.rate_limit_per_hour = per_hour;
        self
    }

    /// Overrides any pipeline setting.
    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    /// Enables AI enhancement through a [`MockProvider`] over `models`.
    pub fn with_enhancement_models(mut self, models: &[&str]) -> Self {
        self.models = Some(models.iter().map(|m| m.to_string()).collect());
        self
    }

    /// Uses the in-process dedup cache and rate limiter instead of SQLite.
    pub fn with_in_memory_guards(mut self) -> Self {
        self.in_memory_guards = true;
        self
    }

    /// Replaces the rate limiter, e.g. with one that injects failures.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub async fn build(self) -> Result<TestHarness, AutodmError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| AutodmError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        }));
        storage.initialize().await?;

        let account = Account {
            id: ACCOUNT_ID.to_string(),
            external_id: ACCOUNT_EXTERNAL_ID.to_string(),
            username: "test_shop".to_string(),
            access_token: "test-token".to_string(),
            owner_id: OWNER_ID.to_string(),
            is_active: true,
        };
        storage.upsert_account(&account).await?;

        let messaging = Arc::new(MockMessaging::new());
        let provider = Arc::new(MockProvider::new());
        let bus = Arc::new(EventBus::default());

        let mut builder = Pipeline::builder(
            storage.clone(),
            Arc::new(MockConnector::new(messaging.clone())),
            self.pipeline,
        )
        .bus(bus.clone());

        if let Some(models) = self.models {
            builder = builder
                .provider(Some(provider.clone() as Arc<dyn ProviderAdapter>))
                .openrouter(OpenRouterConfig {
                    models,
                    timeout_secs: 5,
                    ..OpenRouterConfig::default()
                });
        }
        if self.in_memory_guards {
            builder = builder
                .dedup(Arc::new(InMemoryDedup::new()) as Arc<dyn DedupCache>)
                .rate_limiter(Arc::new(InMemoryRateLimiter::new()) as Arc<dyn RateLimiter>);
        }
        if let Some(limiter) = self.rate_limiter {
            builder = builder.rate_limiter(limiter);
        }

        Ok(TestHarness {
            storage,
            messaging,
            provider,
            bus,
            account,
            pipeline: builder.build(),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete pipeline with mock adapters and temp storage.
pub struct TestHarness {
    /// SQLite storage (temp DB, removed on drop). Also the queue.
    pub storage: Arc<SqliteStorage>,
    pub messaging: Arc<MockMessaging>,
    /// Only consulted when enhancement models were configured.
    pub provider: Arc<MockProvider>,
    pub bus: Arc<EventBus>,
    /// The seeded active account.
    pub account: Account,
    pub pipeline: Pipeline,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Persists an automation for the seeded account after `configure` tweaks it.
    pub async fn add_automation(
        &self,
        trigger_type: TriggerType,
        configure: impl FnOnce(&mut Automation),
    ) -> Result<Automation, AutodmError> {
        let mut automation = Automation::new(
            &self.account.id,
            "test automation",
            trigger_type,
            "Hi {username}, here is your link",
        );
        configure(&mut automation);
        self.storage.upsert_automation(&automation).await?;
        Ok(automation)
    }

    /// Ingests `event` for the seeded account.
    pub async fn ingest(&self, event: &EngagementEvent) -> Result<Vec<TriggerHandle>, AutodmError> {
        self.pipeline
            .ingestor
            .ingest(&self.account.external_id, event)
            .await
    }

    /// Runs queued triggers inline until the queue has nothing available.
    pub async fn drain(&self) -> Result<usize, AutodmError> {
        self.pipeline.workers.drain().await
    }

    pub async fn trigger(&self, id: &str) -> Result<Trigger, AutodmError> {
        self.storage
            .get_trigger(id)
            .await?
            .ok_or_else(|| AutodmError::NotFound {
                entity: "trigger",
                id: id.to_string(),
            })
    }

    pub async fn automation(&self, id: &str) -> Result<Automation, AutodmError> {
        self.storage
            .get_automation(id)
            .await?
            .ok_or_else(|| AutodmError::NotFound {
                entity: "automation",
                id: id.to_string(),
            })
    }
}

/// A comment event on `post_id`.
pub fn comment_event(comment_id: &str, user_id: &str, text: &str, post_id: &str) -> EngagementEvent {
    EngagementEvent {
        kind: TriggerType::Comment,
        event_id: comment_id.to_string(),
        sender_id: user_id.to_string(),
        username: format!("user_{user_id}"),
        text: text.to_string(),
        post_id: Some(post_id.to_string()),
        comment_id: Some(comment_id.to_string()),
    }
}

/// A direct-message event of `kind` (story mention, story reply or DM keyword).
pub fn message_event(kind: TriggerType, message_id: &str, user_id: &str, text: &str) -> EngagementEvent {
    EngagementEvent {
        kind,
        event_id: message_id.to_string(),
        sender_id: user_id.to_string(),
        username: format!("user_{user_id}"),
        text: text.to_string(),
        post_id: None,
        comment_id: None,
    }
}
