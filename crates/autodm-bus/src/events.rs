// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification payloads published by the trigger pipeline.

use autodm_core::types::TriggerStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trigger lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A trigger was claimed by a worker.
    #[serde(rename_all = "camelCase")]
    Triggered {
        automation_id: String,
        trigger_id: String,
        username: String,
        status: TriggerStatus,
    },
    /// A private message was delivered.
    #[serde(rename_all = "camelCase")]
    Sent {
        automation_id: String,
        trigger_id: String,
        recipient: String,
        status: TriggerStatus,
        comment_reply_sent: bool,
    },
}

impl PipelineEvent {
    /// The SSE event name (`triggered` or `sent`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Triggered { .. } => "triggered",
            Self::Sent { .. } => "sent",
        }
    }

    pub fn trigger_id(&self) -> &str {
        match self {
            Self::Triggered { trigger_id, .. } | Self::Sent { trigger_id, .. } => trigger_id,
        }
    }
}

/// Envelope routing a [`PipelineEvent`] to its account topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Monotonic per-bus sequence, assigned on publish.
    pub sequence: u64,
    pub account_id: String,
    /// Owning user of the account.
    pub owner_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: PipelineEvent,
}
