// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging adapter trait for the social platform's messaging API.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AutodmError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Account, DmButton, MessageId, PlatformComment};

/// Adapter for the outbound side of the social platform.
///
/// Every call is bounded by a timeout and performs no retries. Non-2xx
/// responses and transport errors both come back as
/// [`AutodmError::Messaging`] carrying the upstream status and message.
#[async_trait]
pub trait MessagingAdapter: PluginAdapter {
    /// Sends a private message, optionally with quick-reply buttons.
    async fn send_private_message(
        &self,
        recipient_id: &str,
        text: &str,
        buttons: &[DmButton],
    ) -> Result<MessageId, AutodmError>;

    /// Publishes a public reply under a comment.
    async fn reply_to_comment(&self, comment_id: &str, text: &str)
    -> Result<MessageId, AutodmError>;

    /// Whether `user_id` follows the account `account_id`.
    async fn is_following(&self, account_id: &str, user_id: &str) -> Result<bool, AutodmError>;

    /// Lists recent comments on a post.
    async fn list_comments(&self, post_id: &str) -> Result<Vec<PlatformComment>, AutodmError>;
}

/// Builds a messaging adapter bound to one account's credentials.
pub trait MessagingConnector: Send + Sync + 'static {
    fn connect(&self, account: &Account) -> Result<Arc<dyn MessagingAdapter>, AutodmError>;
}
