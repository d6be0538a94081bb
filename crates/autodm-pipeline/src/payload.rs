// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook envelope parsing.
//!
//! Turns the platform's `{object, entry: [...]}` delivery into normalized
//! [`EngagementEvent`]s addressed by account external id. Items that cannot
//! be attributed or deduplicated (no sender, no event id) are dropped.

use autodm_core::types::{EngagementEvent, TriggerType};
use serde::Deserialize;
use tracing::debug;

use crate::matcher::STORY_MENTION_TEXT;

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    /// Platform id of the account the entry is addressed to.
    pub id: String,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub messaging: Vec<MessagingItem>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub field: String,
    #[serde(default)]
    pub value: CommentValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentValue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub from: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
pub struct UserRef {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingItem {
    #[serde(default)]
    pub sender: Option<UserRef>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub story_mention: Option<serde_json::Value>,
    #[serde(default)]
    pub reply_to: Option<serde_json::Value>,
}

/// One normalized event and the account it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedEvent {
    pub account_external_id: String,
    pub event: EngagementEvent,
}

impl WebhookEnvelope {
    /// Flattens every entry into addressed events, in delivery order.
    pub fn into_events(self) -> Vec<AddressedEvent> {
        let mut events = Vec::new();
        for entry in self.entry {
            for change in entry.changes {
                if let Some(event) = comment_event(change) {
                    events.push(AddressedEvent {
                        account_external_id: entry.id.clone(),
                        event,
                    });
                }
            }
            for item in entry.messaging {
                if let Some(event) = message_event(item) {
                    events.push(AddressedEvent {
                        account_external_id: entry.id.clone(),
                        event,
                    });
                }
            }
        }
        events
    }
}

fn comment_event(change: Change) -> Option<EngagementEvent> {
    if change.field != "comments" {
        debug!(field = %change.field, "ignoring non-comment change");
        return None;
    }
    let value = change.value;
    let comment_id = value.id.or(value.comment_id)?;
    let from = value.from?;
    Some(EngagementEvent {
        kind: TriggerType::Comment,
        event_id: comment_id.clone(),
        sender_id: from.id,
        username: from.username.unwrap_or_default(),
        text: value.text,
        post_id: value.media_id,
        comment_id: Some(comment_id),
    })
}

fn message_event(item: MessagingItem) -> Option<EngagementEvent> {
    let sender = item.sender?;
    let message = item.message?;
    if message.is_echo {
        return None;
    }
    let mid = message.mid?;
    let text = message.text.unwrap_or_default();

    let (kind, text) = if message.story_mention.is_some() {
        (TriggerType::StoryMention, STORY_MENTION_TEXT.to_string())
    } else if message.reply_to.is_some() {
        (TriggerType::StoryReply, text)
    } else if !text.is_empty() {
        (TriggerType::DmKeyword, text)
    } else {
        return None;
    };

    Some(EngagementEvent {
        kind,
        event_id: mid,
        sender_id: sender.id,
        username: sender.username.unwrap_or_default(),
        text,
        post_id: None,
        comment_id: None,
    })
}
