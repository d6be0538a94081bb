// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comment poller.
//!
//! Lists comments on every target post of the active comment automations and
//! replays them through the [`EventIngestor`]. Dedup keeps a comment seen by
//! both the webhook and the poller from firing twice.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use autodm_core::error::AutodmError;
use autodm_core::traits::{MessagingAdapter, MessagingConnector, StorageAdapter};
use autodm_core::types::{EngagementEvent, TriggerType};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::ingest::EventIngestor;

pub struct CommentPoller {
    storage: Arc<dyn StorageAdapter>,
    connector: Arc<dyn MessagingConnector>,
    ingestor: Arc<EventIngestor>,
}

impl CommentPoller {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        connector: Arc<dyn MessagingConnector>,
        ingestor: Arc<EventIngestor>,
    ) -> Self {
        Self {
            storage,
            connector,
            ingestor,
        }
    }

    /// One pass over all targeted posts. Returns the number of triggers created.
    ///
    /// A failing account or post is logged and skipped.
    pub async fn poll_once(&self) -> Result<usize, AutodmError> {
        let automations = self
            .storage
            .list_active_automations(TriggerType::Comment)
            .await?;

        let mut targets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for automation in &automations {
            targets
                .entry(automation.account_id.clone())
                .or_default()
                .extend(automation.target_posts.iter().cloned());
        }

        let mut created = 0;
        for (account_id, posts) in targets {
            let Some((external_id, messaging)) = self.connect(&account_id).await? else {
                continue;
            };
            for post_id in posts {
                created += self
                    .poll_post(&external_id, messaging.as_ref(), &post_id)
                    .await?;
            }
        }

        if created > 0 {
            debug!(created, "comment poll created triggers");
        }
        Ok(created)
    }

    async fn poll_post(
        &self,
        account_external_id: &str,
        messaging: &dyn MessagingAdapter,
        post_id: &str,
    ) -> Result<usize, AutodmError> {
        let comments = match messaging.list_comments(post_id).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(post_id, error = %e, "comment listing failed");
                return Ok(0);
            }
        };

        let mut created = 0;
        for comment in comments {
            // The account's own replies show up in the listing too.
            if comment.from_id == account_external_id {
                continue;
            }
            let event = EngagementEvent {
                kind: TriggerType::Comment,
                event_id: comment.id.clone(),
                sender_id: comment.from_id,
                username: comment.username,
                text: comment.text,
                post_id: Some(post_id.to_string()),
                comment_id: Some(comment.id),
            };
            created += self.ingestor.ingest(account_external_id, &event).await?.len();
        }
        Ok(created)
    }

    /// Resolves an account to its external id and messaging adapter.
    /// `None` when the account is gone, inactive, or cannot be connected.
    async fn connect(
        &self,
        account_id: &str,
    ) -> Result<Option<(String, Arc<dyn MessagingAdapter>)>, AutodmError> {
        let Some(account) = self.storage.get_account(account_id).await? else {
            return Ok(None);
        };
        if !account.is_active {
            return Ok(None);
        }
        match self.connector.connect(&account) {
            Ok(messaging) => Ok(Some((account.external_id, messaging))),
            Err(e) => {
                warn!(account_id, error = %e, "cannot connect account for polling");
                Ok(None)
            }
        }
    }

    /// Polls every `interval` until cancelled.
    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "comment poll failed");
                    }
                }
            }
        }
    }
}
