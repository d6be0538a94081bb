// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger state machine.
//!
//! Drives one trigger from `pending` to a terminal status:
//!
//! 1. claim (`pending -> processing`) and emit `triggered`
//! 2. per-account rate check
//! 3. per-user cap and cooldown, under the [`UserGate`]
//! 4. follow gate
//! 5. public reply (best-effort)
//! 6. message composition, optionally AI-enhanced
//! 7. private send, counters, contact rollup, emit `sent`
//!
//! Business outcomes end as `sent`, `failed` or `skipped` on the trigger and
//! return `Ok`. Only storage failures surface as errors, so the queue can
//! retry the task. A trigger skipped after step 2 gives its rate slot back:
//! the window counts sends and failed send attempts, not skips.

use std::sync::Arc;
use std::time::Duration;

use autodm_bus::{EventBus, PipelineEvent};
use autodm_config::model::PipelineConfig;
use autodm_core::error::AutodmError;
use autodm_core::traits::{MessagingAdapter, MessagingConnector, RateLimiter, StorageAdapter};
use autodm_core::types::{
    Account, Automation, AutomationCounter, RateDecision, Trigger, TriggerStatus,
    format_timestamp, now_timestamp,
};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::enhance::EnhancementChain;
use crate::template;
use crate::user_gate::{UserGate, UserGuard};

pub const REASON_RATE_LIMITED: &str = "rate limit exceeded";
pub const REASON_USER_LIMIT: &str = "per-user limit reached";
pub const REASON_COOLDOWN: &str = "cooldown active";
pub const REASON_NOT_FOLLOWING: &str = "not following";

/// Runs the trigger lifecycle. Shared by every worker.
pub struct TriggerProcessor {
    storage: Arc<dyn StorageAdapter>,
    rate_limiter: Arc<dyn RateLimiter>,
    connector: Arc<dyn MessagingConnector>,
    chain: EnhancementChain,
    bus: Arc<EventBus>,
    gate: UserGate,
    rate_limit: u32,
    rate_window: Duration,
}

/// Everything the steps after admission need.
struct Claimed {
    trigger: Trigger,
    automation: Automation,
    account: Account,
    messaging: Arc<dyn MessagingAdapter>,
}

enum Admission {
    /// The trigger already reached a terminal status.
    Finished(TriggerStatus),
    /// Cleared for delivery; the guard holds the per-user gate.
    Admitted(Claimed, UserGuard),
}

impl TriggerProcessor {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        rate_limiter: Arc<dyn RateLimiter>,
        connector: Arc<dyn MessagingConnector>,
        chain: EnhancementChain,
        bus: Arc<EventBus>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            storage,
            rate_limiter,
            connector,
            chain,
            bus,
            gate: UserGate::new(),
            rate_limit: config.rate_limit_per_hour,
            rate_window: Duration::from_secs(config.rate_window_secs),
        }
    }

    /// Processes one trigger. Returns the terminal status reached, or `None`
    /// when the trigger was missing, not pending, or claimed by someone else.
    ///
    /// A storage error before the first outbound call hands the trigger back
    /// to `pending` so the queue retry can run it again.
    #[instrument(skip(self))]
    pub async fn process(&self, trigger_id: &str) -> Result<Option<TriggerStatus>, AutodmError> {
        let Some(mut trigger) = self.storage.get_trigger(trigger_id).await? else {
            warn!("trigger not found, nothing to process");
            return Ok(None);
        };
        if trigger.status != TriggerStatus::Pending {
            debug!(status = %trigger.status, "trigger is not pending, skipping");
            return Ok(None);
        }
        if !self.storage.claim_trigger(trigger_id).await? {
            debug!("trigger claimed by another worker");
            return Ok(None);
        }
        trigger.status = TriggerStatus::Processing;
        trigger.updated_at = now_timestamp();

        let (claimed, _user_guard) = match self.admit(trigger).await {
            Ok(Admission::Finished(status)) => return Ok(Some(status)),
            Ok(Admission::Admitted(claimed, guard)) => (claimed, guard),
            Err(e) => {
                match self.storage.release_trigger(trigger_id).await {
                    Ok(_) => debug!("trigger handed back for retry"),
                    Err(release_err) => {
                        error!(error = %release_err, "could not hand trigger back for retry")
                    }
                }
                return Err(e);
            }
        };
        self.deliver(claimed).await.map(Some)
    }

    /// Steps that touch only storage: lookups, the rate slot and the per-user
    /// gate. Nothing has been sent when this returns an error.
    async fn admit(&self, trigger: Trigger) -> Result<Admission, AutodmError> {
        let Some(automation) = self.storage.get_automation(&trigger.automation_id).await? else {
            return self
                .finish(trigger, TriggerStatus::Failed, Some("automation not found".into()))
                .await
                .map(Admission::Finished);
        };
        let Some(account) = self.storage.get_account(&trigger.account_id).await? else {
            return self
                .finish(trigger, TriggerStatus::Failed, Some("account not found".into()))
                .await
                .map(Admission::Finished);
        };

        self.bus.publish(
            &account.id,
            &account.owner_id,
            PipelineEvent::Triggered {
                automation_id: automation.id.clone(),
                trigger_id: trigger.id.clone(),
                username: trigger.username.clone(),
                status: TriggerStatus::Processing,
            },
        );

        let messaging = match self.connector.connect(&account) {
            Ok(messaging) => messaging,
            Err(e) => {
                return self
                    .finish(trigger, TriggerStatus::Failed, Some(e.to_string()))
                    .await
                    .map(Admission::Finished);
            }
        };

        let decision = self
            .rate_limiter
            .try_acquire(&account.id, self.rate_limit, self.rate_window)
            .await?;
        if let RateDecision::Limited { current } = decision {
            info!(account_id = %account.id, current, "rate limit exceeded");
            return self
                .finish(trigger, TriggerStatus::Skipped, Some(REASON_RATE_LIMITED.into()))
                .await
                .map(Admission::Finished);
        }

        let user_guard = self
            .gate
            .lock(&automation.id, &trigger.external_user_id)
            .await;
        let limited = match self.user_limit_reason(&automation, &trigger).await {
            Ok(limited) => limited,
            Err(e) => {
                self.release_rate_slot(&account.id).await;
                return Err(e);
            }
        };
        if let Some(reason) = limited {
            self.release_rate_slot(&account.id).await;
            return self
                .finish(trigger, TriggerStatus::Skipped, Some(reason.into()))
                .await
                .map(Admission::Finished);
        }

        let claimed = Claimed {
            trigger,
            automation,
            account,
            messaging,
        };
        Ok(Admission::Admitted(claimed, user_guard))
    }

    /// Follow gate, public reply, composition and the private send.
    async fn deliver(&self, claimed: Claimed) -> Result<TriggerStatus, AutodmError> {
        let Claimed {
            mut trigger,
            automation,
            account,
            messaging,
        } = claimed;

        let mut is_follower = false;
        if automation.require_follow {
            is_follower = match messaging
                .is_following(&account.external_id, &trigger.external_user_id)
                .await
            {
                Ok(following) => following,
                Err(e) => {
                    warn!(error = %e, "follow check failed, treating as not following");
                    false
                }
            };
            if !is_follower {
                if !automation.follow_check_message.is_empty() {
                    let text = template::render(&automation.follow_check_message, &trigger.username);
                    if let Err(e) = messaging
                        .send_private_message(&trigger.external_user_id, &text, &[])
                        .await
                    {
                        warn!(error = %e, "follow gating message not delivered");
                    }
                }
                self.release_rate_slot(&account.id).await;
                return self
                    .finish(trigger, TriggerStatus::Skipped, Some(REASON_NOT_FOLLOWING.into()))
                    .await;
            }
        }

        if automation.enable_comment_reply && !automation.comment_reply_message.is_empty() {
            if let Some(comment_id) = trigger.reply_target().map(str::to_string) {
                let text = template::render(&automation.comment_reply_message, &trigger.username);
                match messaging.reply_to_comment(&comment_id, &text).await {
                    Ok(_) => {
                        trigger.comment_reply_sent = true;
                        trigger.comment_reply_text = Some(text);
                        trigger.comment_reply_sent_at = Some(now_timestamp());
                    }
                    Err(e) => warn!(comment_id = %comment_id, error = %e, "public reply failed"),
                }
            }
        }

        let base = template::render(&automation.dm_message, &trigger.username);
        let text = if automation.use_ai_enhancement && !automation.ai_context.trim().is_empty() {
            let enhancement = self
                .chain
                .enhance(
                    &base,
                    &automation.ai_context,
                    &trigger.event_text,
                    &trigger.username,
                    None,
                )
                .await;
            if enhancement.success {
                trigger.was_ai_enhanced = true;
                trigger.ai_model_used = enhancement.label();
            }
            enhancement.text
        } else {
            base
        };

        match messaging
            .send_private_message(&trigger.external_user_id, &text, &automation.dm_buttons)
            .await
        {
            Ok(_) => {
                trigger.dm_sent_at = Some(now_timestamp());
                trigger.dm_message_sent = Some(text);
                let comment_reply_sent = trigger.comment_reply_sent;
                let recipient = trigger.external_user_id.clone();
                let username = trigger.username.clone();
                let trigger_id = trigger.id.clone();

                let status = self.finish(trigger, TriggerStatus::Sent, None).await?;
                if status == TriggerStatus::Sent {
                    self.record_send(
                        &automation,
                        &account,
                        &recipient,
                        &username,
                        is_follower,
                        comment_reply_sent,
                    )
                    .await;
                    self.bus.publish(
                        &account.id,
                        &account.owner_id,
                        PipelineEvent::Sent {
                            automation_id: automation.id.clone(),
                            trigger_id,
                            recipient,
                            status,
                            comment_reply_sent,
                        },
                    );
                }
                Ok(status)
            }
            Err(e) => {
                warn!(error = %e, status = ?e.upstream_status(), "private message failed");
                self.finish(trigger, TriggerStatus::Failed, Some(e.to_string()))
                    .await
            }
        }
    }

    /// Gives back a reserved rate slot. Failures only cost window capacity.
    async fn release_rate_slot(&self, account_id: &str) {
        if let Err(e) = self.rate_limiter.release(account_id).await {
            warn!(account_id, error = %e, "rate slot not released");
        }
    }

    async fn user_limit_reason(
        &self,
        automation: &Automation,
        trigger: &Trigger,
    ) -> Result<Option<&'static str>, AutodmError> {
        if automation.max_triggers_per_user > 0 {
            let sent = self
                .storage
                .count_sent_for_user(&automation.id, &trigger.external_user_id)
                .await?;
            if sent >= automation.max_triggers_per_user {
                return Ok(Some(REASON_USER_LIMIT));
            }
        }
        if automation.cooldown_minutes > 0 {
            let last = self
                .storage
                .last_sent_for_user(&automation.id, &trigger.external_user_id)
                .await?;
            if let Some(last) = last {
                // Out-of-range cooldowns compare against "" and always apply.
                let cutoff = chrono::Duration::try_minutes(automation.cooldown_minutes)
                    .and_then(|d| Utc::now().checked_sub_signed(d))
                    .map(format_timestamp)
                    .unwrap_or_default();
                if last > cutoff {
                    return Ok(Some(REASON_COOLDOWN));
                }
            }
        }
        Ok(None)
    }

    /// Counters and contact rollup after a committed send. Failures here are
    /// logged; the trigger is already `sent`.
    async fn record_send(
        &self,
        automation: &Automation,
        account: &Account,
        recipient: &str,
        username: &str,
        is_follower: bool,
        comment_reply_sent: bool,
    ) {
        let mut counters = vec![AutomationCounter::DmsSent];
        if comment_reply_sent {
            counters.push(AutomationCounter::CommentReplies);
        }
        for counter in counters {
            if let Err(e) = self.storage.increment_counter(&automation.id, counter).await {
                error!(automation_id = %automation.id, counter = %counter, error = %e, "counter update failed");
            }
        }
        if let Err(e) = self
            .storage
            .record_contact_send(&account.id, recipient, username, is_follower)
            .await
        {
            error!(account_id = %account.id, error = %e, "contact update failed");
        }
    }

    /// Persists a terminal status. Returns the status actually stored.
    async fn finish(
        &self,
        mut trigger: Trigger,
        status: TriggerStatus,
        reason: Option<String>,
    ) -> Result<TriggerStatus, AutodmError> {
        debug_assert!(trigger.status.can_transition_to(status));
        trigger.status = status;
        trigger.failure_reason = reason;
        trigger.updated_at = now_timestamp();

        if self.storage.complete_trigger(&trigger).await? {
            info!(
                trigger_id = %trigger.id,
                status = %status,
                reason = trigger.failure_reason.as_deref().unwrap_or(""),
                "trigger finished"
            );
            return Ok(status);
        }

        // Someone else (the stale reconciler) already finished the row.
        let stored = self
            .storage
            .get_trigger(&trigger.id)
            .await?
            .map(|t| t.status)
            .unwrap_or(status);
        warn!(trigger_id = %trigger.id, intended = %status, stored = %stored, "trigger already finished");
        Ok(stored)
    }
}
