// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging platform for deterministic testing.
//!
//! `MockMessaging` records every outbound call and lets tests script
//! followers, comment listings and failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use autodm_core::AutodmError;
use autodm_core::traits::{MessagingAdapter, MessagingConnector, PluginAdapter};
use autodm_core::types::{
    Account, AdapterType, DmButton, HealthStatus, MessageId, PlatformComment,
};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagingCall {
    PrivateMessage {
        recipient_id: String,
        text: String,
        buttons: Vec<DmButton>,
    },
    CommentReply {
        comment_id: String,
        text: String,
    },
    FollowCheck {
        account_id: String,
        user_id: String,
    },
    ListComments {
        post_id: String,
    },
}

#[derive(Debug, Default)]
struct Script {
    followers: HashSet<String>,
    follow_check_fails: bool,
    private_failure: Option<(u16, String)>,
    private_delay: Option<Duration>,
    reply_failure: Option<(u16, String)>,
    comments: HashMap<String, Vec<PlatformComment>>,
}

/// A scripted messaging platform.
#[derive(Default)]
pub struct MockMessaging {
    calls: Mutex<Vec<MessagingCall>>,
    script: Mutex<Script>,
}

fn upstream(status: u16, message: &str) -> AutodmError {
    AutodmError::Messaging {
        status: Some(status),
        message: message.to_string(),
    }
}

impl MockMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_follower(&self, user_id: &str) {
        self.script.lock().await.followers.insert(user_id.to_string());
    }

    /// Makes every follow check return an error.
    pub async fn fail_follow_checks(&self) {
        self.script.lock().await.follow_check_fails = true;
    }

    /// Makes every private send fail with the given upstream status and message.
    pub async fn fail_private_messages(&self, status: u16, message: &str) {
        self.script.lock().await.private_failure = Some((status, message.to_string()));
    }

    /// Holds every private send for `delay` before it completes.
    pub async fn delay_private_messages(&self, delay: Duration) {
        self.script.lock().await.private_delay = Some(delay);
    }

    /// Makes every comment reply fail with the given upstream status and message.
    pub async fn fail_comment_replies(&self, status: u16, message: &str) {
        self.script.lock().await.reply_failure = Some((status, message.to_string()));
    }

    pub async fn set_comments(&self, post_id: &str, comments: Vec<PlatformComment>) {
        self.script
            .lock()
            .await
            .comments
            .insert(post_id.to_string(), comments);
    }

    pub async fn calls(&self) -> Vec<MessagingCall> {
        self.calls.lock().await.clone()
    }

    /// Private messages sent so far, as `(recipient, text)`.
    pub async fn private_messages(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                MessagingCall::PrivateMessage {
                    recipient_id, text, ..
                } => Some((recipient_id.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    /// Comment replies attempted so far, as `(comment_id, text)`.
    pub async fn comment_replies(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                MessagingCall::CommentReply { comment_id, text } => {
                    Some((comment_id.clone(), text.clone()))
                }
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: MessagingCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl PluginAdapter for MockMessaging {
    fn name(&self) -> &str {
        "mock-messaging"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messaging
    }

    async fn health_check(&self) -> Result<HealthStatus, AutodmError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AutodmError> {
        Ok(())
    }
}

#[async_trait]
impl MessagingAdapter for MockMessaging {
    async fn send_private_message(
        &self,
        recipient_id: &str,
        text: &str,
        buttons: &[DmButton],
    ) -> Result<MessageId, AutodmError> {
        self.record(MessagingCall::PrivateMessage {
            recipient_id: recipient_id.to_string(),
            text: text.to_string(),
            buttons: buttons.to_vec(),
        })
        .await;
        let (failure, delay) = {
            let script = self.script.lock().await;
            (script.private_failure.clone(), script.private_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((status, message)) = failure {
            return Err(upstream(status, &message));
        }
        Ok(MessageId(format!("mock-dm-{}", uuid::Uuid::new_v4())))
    }

    async fn reply_to_comment(
        &self,
        comment_id: &str,
        text: &str,
    ) -> Result<MessageId, AutodmError> {
        self.record(MessagingCall::CommentReply {
            comment_id: comment_id.to_string(),
            text: text.to_string(),
        })
        .await;
        if let Some((status, message)) = &self.script.lock().await.reply_failure {
            return Err(upstream(*status, message));
        }
        Ok(MessageId(format!("mock-reply-{}", uuid::Uuid::new_v4())))
    }

    async fn is_following(&self, account_id: &str, user_id: &str) -> Result<bool, AutodmError> {
        self.record(MessagingCall::FollowCheck {
            account_id: account_id.to_string(),
            user_id: user_id.to_string(),
        })
        .await;
        let script = self.script.lock().await;
        if script.follow_check_fails {
            return Err(upstream(500, "follower lookup failed"));
        }
        Ok(script.followers.contains(user_id))
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<PlatformComment>, AutodmError> {
        self.record(MessagingCall::ListComments {
            post_id: post_id.to_string(),
        })
        .await;
        Ok(self
            .script
            .lock()
            .await
            .comments
            .get(post_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Hands the same [`MockMessaging`] to every account.
pub struct MockConnector {
    messaging: Arc<MockMessaging>,
}

impl MockConnector {
    pub fn new(messaging: Arc<MockMessaging>) -> Self {
        Self { messaging }
    }
}

impl MessagingConnector for MockConnector {
    fn connect(&self, _account: &Account) -> Result<Arc<dyn MessagingAdapter>, AutodmError> {
        Ok(self.messaging.clone())
    }
}
