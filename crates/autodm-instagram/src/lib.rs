// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instagram Graph API messaging adapter for autodm.
//!
//! [`InstagramConnector`] builds one [`InstagramMessaging`] per connected
//! account; all of them share a single HTTP connection pool.

pub mod client;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autodm_config::model::InstagramConfig;
use autodm_core::error::AutodmError;
use autodm_core::traits::{MessagingAdapter, MessagingConnector, PluginAdapter};
use autodm_core::types::{Account, AdapterType, DmButton, HealthStatus, MessageId, PlatformComment};
use tracing::{debug, info};

use crate::client::GraphClient;
use crate::types::{
    ApiComment, FollowersResponse, IdResponse, OutgoingMessage, Page, QuickReply, Recipient,
    ReplyRequest, SendMessageRequest, SendMessageResponse,
};

/// Messaging adapter bound to one account's access token.
pub struct InstagramMessaging {
    client: GraphClient,
    access_token: String,
}

impl InstagramMessaging {
    pub fn new(client: GraphClient, access_token: impl Into<String>) -> Self {
        Self {
            client,
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl PluginAdapter for InstagramMessaging {
    fn name(&self) -> &str {
        "instagram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messaging
    }

    async fn health_check(&self) -> Result<HealthStatus, AutodmError> {
        if self.access_token.is_empty() {
            return Ok(HealthStatus::Unhealthy("missing access token".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AutodmError> {
        Ok(())
    }
}

#[async_trait]
impl MessagingAdapter for InstagramMessaging {
    async fn send_private_message(
        &self,
        recipient_id: &str,
        text: &str,
        buttons: &[DmButton],
    ) -> Result<MessageId, AutodmError> {
        let body = SendMessageRequest {
            recipient: Recipient { id: recipient_id },
            message: OutgoingMessage {
                text,
                quick_replies: buttons.iter().map(QuickReply::from).collect(),
            },
        };
        let response: SendMessageResponse = self
            .client
            .post("me/messages", &self.access_token, &body)
            .await?;
        debug!(recipient_id, message_id = %response.message_id, "private message sent");
        Ok(MessageId(response.message_id))
    }

    async fn reply_to_comment(
        &self,
        comment_id: &str,
        text: &str,
    ) -> Result<MessageId, AutodmError> {
        let response: IdResponse = self
            .client
            .post(
                &format!("{comment_id}/replies"),
                &self.access_token,
                &ReplyRequest { message: text },
            )
            .await?;
        debug!(comment_id, reply_id = %response.id, "comment reply published");
        Ok(MessageId(response.id))
    }

    async fn is_following(&self, account_id: &str, user_id: &str) -> Result<bool, AutodmError> {
        let response: FollowersResponse = self
            .client
            .get(account_id, &self.access_token, &[("fields", "followers{id}")])
            .await?;
        Ok(response
            .followers
            .map(|page| page.data.iter().any(|f| f.id == user_id))
            .unwrap_or(false))
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<PlatformComment>, AutodmError> {
        let page: Page<ApiComment> = self
            .client
            .get(
                &format!("{post_id}/comments"),
                &self.access_token,
                &[("fields", "id,text,username,from,timestamp"), ("limit", "100")],
            )
            .await?;
        Ok(page
            .data
            .into_iter()
            .filter_map(ApiComment::into_platform_comment)
            .collect())
    }
}

/// Produces account-bound [`InstagramMessaging`] adapters over one shared client.
pub struct InstagramConnector {
    client: GraphClient,
}

impl InstagramConnector {
    pub fn new(config: &InstagramConfig) -> Result<Self, AutodmError> {
        let client = GraphClient::new(
            &config.base_url,
            Duration::from_secs(config.read_timeout_secs),
            Duration::from_secs(config.write_timeout_secs),
        )?;
        info!(base_url = %config.base_url, "instagram connector initialized");
        Ok(Self { client })
    }
}

impl MessagingConnector for InstagramConnector {
    fn connect(&self, account: &Account) -> Result<Arc<dyn MessagingAdapter>, AutodmError> {
        if account.access_token.is_empty() {
            return Err(AutodmError::Config(format!(
                "account {} has no access token",
                account.id
            )));
        }
        Ok(Arc::new(InstagramMessaging::new(
            self.client.clone(),
            account.access_token.clone(),
        )))
    }
}
