// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Timestamp format used for every persisted timestamp.
///
/// Fixed-width UTC so that lexicographic order equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats a UTC instant in the canonical storage format.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// The current instant in the canonical storage format.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Identifier returned by the messaging platform for a delivered message or reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Messaging,
    Provider,
    Storage,
}

/// Kind of platform event an automation reacts to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerType {
    /// Comment on a post.
    Comment,
    /// The account was @mentioned in a story.
    StoryMention,
    /// Direct reply to one of the account's stories.
    StoryReply,
    /// Direct message containing a keyword.
    DmKeyword,
}

/// How the event text is compared against an automation's keywords.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive equality with at least one keyword.
    #[default]
    Exact,
    /// Case-insensitive substring match with at least one keyword.
    Contains,
    /// Every event matches.
    Any,
}

/// Lifecycle status of a trigger.
///
/// `Pending -> Processing -> {Sent | Failed | Skipped}`; the last three are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Skipped,
}

impl TriggerStatus {
    /// Whether no further transition is allowed out of this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Skipped)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: TriggerStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Processing) => true,
            (Self::Processing, n) => n.is_terminal(),
            _ => false,
        }
    }
}

/// Which running counter on an automation to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AutomationCounter {
    /// `total_triggers`, bumped by the ingestor.
    Triggers,
    /// `total_dms_sent`, bumped on a successful private send.
    DmsSent,
    /// `total_comment_replies`, bumped when a sent trigger also replied publicly.
    CommentReplies,
}

/// A connected platform account, as supplied by the account layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Internal identifier.
    pub id: String,
    /// Platform-side account id; webhook entries are addressed by it.
    pub external_id: String,
    pub username: String,
    /// Platform access token used for every messaging call made on behalf of the account.
    pub access_token: String,
    /// Owning user; notifications are published on this user's topic.
    pub owner_id: String,
    pub is_active: bool,
}

/// A quick-reply button attached to a private message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmButton {
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A user-defined rule mapping an event pattern to a reply/message action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub trigger_type: TriggerType,
    pub keywords: Vec<String>,
    pub match_mode: MatchMode,
    /// Post ids this automation is limited to. Empty means any post.
    pub target_posts: Vec<String>,
    pub enable_comment_reply: bool,
    /// Public reply template; `{username}` is substituted.
    pub comment_reply_message: String,
    /// Private message template; `{username}` is substituted.
    pub dm_message: String,
    pub dm_buttons: Vec<DmButton>,
    pub require_follow: bool,
    /// Sent instead of the private message when the follow gate rejects a user.
    pub follow_check_message: String,
    pub use_ai_enhancement: bool,
    /// Business context handed to the AI enhancement chain.
    pub ai_context: String,
    /// Maximum sent triggers per external user. Zero disables the cap.
    pub max_triggers_per_user: i64,
    /// Minimum minutes between sends to the same user. Zero disables the cooldown.
    pub cooldown_minutes: i64,
    pub priority: i64,
    pub is_active: bool,
    pub total_triggers: i64,
    pub total_dms_sent: i64,
    pub total_comment_replies: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Automation {
    /// Creates an automation with the platform defaults for every optional setting.
    pub fn new(
        account_id: impl Into<String>,
        name: impl Into<String>,
        trigger_type: TriggerType,
        dm_message: impl Into<String>,
    ) -> Self {
        let now = now_timestamp();
        Self {
            id: new_id(),
            account_id: account_id.into(),
            name: name.into(),
            trigger_type,
            keywords: Vec::new(),
            match_mode: MatchMode::default(),
            target_posts: Vec::new(),
            enable_comment_reply: true,
            comment_reply_message: "✅ Sent! Check your DM".to_string(),
            dm_message: dm_message.into(),
            dm_buttons: Vec::new(),
            require_follow: false,
            follow_check_message: String::new(),
            use_ai_enhancement: false,
            ai_context: String::new(),
            max_triggers_per_user: 1,
            cooldown_minutes: 0,
            priority: 0,
            is_active: true,
            total_triggers: 0,
            total_dms_sent: 0,
            total_comment_replies: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// One firing of an automation against one inbound platform event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub automation_id: String,
    pub account_id: String,
    /// Platform id of the user who produced the event.
    pub external_user_id: String,
    pub username: String,
    pub post_id: Option<String>,
    /// Platform comment id. Absent for DM and story events.
    pub comment_id: Option<String>,
    pub event_text: String,
    pub status: TriggerStatus,
    pub failure_reason: Option<String>,
    pub comment_reply_sent: bool,
    pub comment_reply_text: Option<String>,
    pub comment_reply_sent_at: Option<String>,
    pub dm_sent_at: Option<String>,
    pub dm_message_sent: Option<String>,
    pub was_ai_enhanced: bool,
    /// `provider/model` that produced the enhanced text.
    pub ai_model_used: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Trigger {
    /// Creates a pending trigger for `automation` fired by `event`.
    pub fn pending(automation: &Automation, event: &EngagementEvent) -> Self {
        let now = now_timestamp();
        Self {
            id: new_id(),
            automation_id: automation.id.clone(),
            account_id: automation.account_id.clone(),
            external_user_id: event.sender_id.clone(),
            username: event.username.clone(),
            post_id: event.post_id.clone(),
            comment_id: event.comment_id.clone(),
            event_text: event.text.clone(),
            status: TriggerStatus::Pending,
            failure_reason: None,
            comment_reply_sent: false,
            comment_reply_text: None,
            comment_reply_sent_at: None,
            dm_sent_at: None,
            dm_message_sent: None,
            was_ai_enhanced: false,
            ai_model_used: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The platform comment id, treating an empty string as absent.
    pub fn reply_target(&self) -> Option<&str> {
        self.comment_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Per-account rollup of one external user's interaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub account_id: String,
    pub external_user_id: String,
    pub username: String,
    pub full_name: String,
    pub total_interactions: i64,
    pub total_dms_received: i64,
    pub first_interaction: String,
    pub last_interaction: String,
    pub is_follower: bool,
    pub tags: Vec<String>,
}

/// A normalized engagement event extracted from a webhook delivery or a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub kind: TriggerType,
    /// Platform id used for deduplication (comment id or message id).
    pub event_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
}

/// A comment returned by the platform's comment listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformComment {
    pub id: String,
    pub text: String,
    pub from_id: String,
    pub username: String,
}

/// A request to an AI text-generation provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    /// Model that actually answered, as reported by the provider.
    pub model: String,
}

/// A persisted unit of asynchronous work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

/// Outcome of a rate-limiter admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// A slot was reserved; `remaining` slots are left in the window.
    Allowed { remaining: u32 },
    /// The window is full.
    Limited { current: u32 },
}

impl RateDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
