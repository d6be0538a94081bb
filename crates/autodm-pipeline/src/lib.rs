// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger-processing pipeline for autodm.
//!
//! Webhook ingestion matches and deduplicates events and enqueues one task
//! per trigger; a worker pool runs the [`TriggerProcessor`] state machine
//! against the messaging platform and publishes lifecycle events on the bus.

pub mod enhance;
pub mod ingest;
pub mod matcher;
pub mod memory;
pub mod payload;
pub mod pipeline;
pub mod poller;
pub mod processor;
pub mod reconciler;
pub mod template;
pub mod user_gate;
pub mod worker;

pub use enhance::{Enhancement, EnhancementChain};
pub use ingest::{EventIngestor, TRIGGER_QUEUE, TriggerHandle, TriggerTask};
pub use memory::{InMemoryDedup, InMemoryRateLimiter};
pub use payload::{AddressedEvent, WebhookEnvelope};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use poller::CommentPoller;
pub use processor::TriggerProcessor;
pub use reconciler::{StaleTriggerReconciler, SweepReport};
pub use worker::{TaskOutcome, WorkerPool, WorkerSettings};
