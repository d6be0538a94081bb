// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end trigger pipeline scenarios over the test harness.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use autodm_bus::{Delivery, PipelineEvent};
use autodm_config::model::PipelineConfig;
use autodm_core::AutodmError;
use autodm_core::types::{
    DmButton, MatchMode, PlatformComment, QueueEntry, RateDecision, TriggerStatus, TriggerType,
};
use autodm_core::{RateLimiter, StorageAdapter, TaskQueue};
use autodm_pipeline::matcher::STORY_MENTION_TEXT;
use autodm_pipeline::{EventIngestor, InMemoryRateLimiter, TaskOutcome};
use autodm_test_utils::harness::ACCOUNT_EXTERNAL_ID;
use autodm_test_utils::{MessagingCall, TestHarness, comment_event, message_event};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Fails the first `failures` intercepted calls, then delegates to `inner`.
struct Flaky<T> {
    inner: Arc<T>,
    failures: AtomicUsize,
}

impl<T> Flaky<T> {
    fn new(inner: Arc<T>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }

    fn trip(&self) -> Result<(), AutodmError> {
        let tripped = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(AutodmError::Storage {
                source: "database is locked".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<T: RateLimiter> RateLimiter for Flaky<T> {
    async fn try_acquire(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateDecision, AutodmError> {
        self.trip()?;
        self.inner.try_acquire(key, limit, window).await
    }

    async fn release(&self, key: &str) -> Result<(), AutodmError> {
        self.inner.release(key).await
    }
}

#[async_trait]
impl<T: TaskQueue> TaskQueue for Flaky<T> {
    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, AutodmError> {
        self.trip()?;
        self.inner.enqueue(queue_name, payload, max_attempts).await
    }

    async fn dequeue(
        &self,
        queue_name: &str,
        lease: Duration,
    ) -> Result<Option<QueueEntry>, AutodmError> {
        self.inner.dequeue(queue_name, lease).await
    }

    async fn ack(&self, id: i64) -> Result<(), AutodmError> {
        self.inner.ack(id).await
    }

    async fn fail(&self, id: i64, retry_after: Duration) -> Result<(), AutodmError> {
        self.inner.fail(id, retry_after).await
    }

    async fn purge_finished(&self, older_than: Duration) -> Result<usize, AutodmError> {
        self.inner.purge_finished(older_than).await
    }
}

#[tokio::test]
async fn keyword_comment_is_replied_and_messaged() {
    let harness = TestHarness::builder().build().await.unwrap();
    let automation = harness
        .add_automation(TriggerType::Comment, |a| {
            a.keywords = vec!["price".into(), "cost".into()];
            a.match_mode = MatchMode::Contains;
            a.comment_reply_message = "Sent you a DM, {username}!".into();
            a.dm_message = "Hi {username}, prices are on our site".into();
            a.dm_buttons = vec![DmButton {
                text: "Shop".into(),
                url: Some("https://shop.example".into()),
            }];
        })
        .await
        .unwrap();

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "what's the price?", "post-1"))
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);
    let pending = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(pending.status, TriggerStatus::Pending);

    assert_eq!(harness.drain().await.unwrap(), 1);

    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Sent);
    assert!(trigger.dm_sent_at.is_some());
    assert!(trigger.failure_reason.is_none());
    assert_eq!(
        trigger.dm_message_sent.as_deref(),
        Some("Hi user_u-1, prices are on our site")
    );
    assert!(trigger.comment_reply_sent);
    assert_eq!(
        trigger.comment_reply_text.as_deref(),
        Some("Sent you a DM, user_u-1!")
    );
    assert!(!trigger.was_ai_enhanced);

    let calls = harness.messaging.calls().await;
    assert_eq!(
        calls,
        vec![
            MessagingCall::CommentReply {
                comment_id: "c-1".into(),
                text: "Sent you a DM, user_u-1!".into(),
            },
            MessagingCall::PrivateMessage {
                recipient_id: "u-1".into(),
                text: "Hi user_u-1, prices are on our site".into(),
                buttons: automation.dm_buttons.clone(),
            },
        ]
    );

    let stored = harness.automation(&automation.id).await.unwrap();
    assert_eq!(stored.total_triggers, 1);
    assert_eq!(stored.total_dms_sent, 1);
    assert_eq!(stored.total_comment_replies, 1);

    let contact = harness
        .storage
        .get_contact(&harness.account.id, "u-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contact.total_dms_received, 1);
    assert_eq!(contact.username, "user_u-1");
}

#[tokio::test]
async fn replayed_event_creates_one_trigger() {
    let harness = TestHarness::builder().build().await.unwrap();
    let automation = harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();

    let event = comment_event("c-1", "u-1", "hello", "post-1");
    assert_eq!(harness.ingest(&event).await.unwrap().len(), 1);
    assert!(harness.ingest(&event).await.unwrap().is_empty());

    assert_eq!(harness.drain().await.unwrap(), 1);
    assert_eq!(harness.automation(&automation.id).await.unwrap().total_triggers, 1);
    assert_eq!(harness.messaging.private_messages().await.len(), 1);
}

#[tokio::test]
async fn highest_priority_match_claims_the_event() {
    let harness = TestHarness::builder().build().await.unwrap();
    let low = harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.priority = 1;
        })
        .await
        .unwrap();
    let high = harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.priority = 10;
        })
        .await
        .unwrap();

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "hi", "post-1"))
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].automation_id, high.id);
    assert_eq!(harness.automation(&low.id).await.unwrap().total_triggers, 0);
}

#[tokio::test]
async fn unmatched_and_filtered_events_have_no_side_effects() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.keywords = vec!["link please".into()];
            a.target_posts = vec!["A".into(), "B".into()];
        })
        .await
        .unwrap();

    assert!(harness
        .ingest(&comment_event("c-1", "u-1", "Link Please", "C"))
        .await
        .unwrap()
        .is_empty());
    assert!(harness
        .ingest(&comment_event("c-2", "u-1", "nice pic", "A"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        harness
            .ingest(&comment_event("c-3", "u-1", "LINK PLEASE", "B"))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn unknown_account_is_rejected() {
    let harness = TestHarness::builder().build().await.unwrap();
    let err = harness
        .pipeline
        .ingestor
        .ingest("not-connected", &comment_event("c-1", "u", "x", "p"))
        .await
        .unwrap_err();
    assert!(matches!(err, AutodmError::UnknownAccount(id) if id == "not-connected"));
}

#[tokio::test]
async fn inactive_account_is_treated_as_unknown() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut account = harness.account.clone();
    account.is_active = false;
    harness.storage.upsert_account(&account).await.unwrap();

    let err = harness
        .ingest(&comment_event("c-1", "u", "x", "p"))
        .await
        .unwrap_err();
    assert!(matches!(err, AutodmError::UnknownAccount(_)));
}

#[tokio::test]
async fn not_following_is_skipped_after_gating_message() {
    let harness = TestHarness::builder().build().await.unwrap();
    let automation = harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.require_follow = true;
            a.follow_check_message = "Follow us first, {username}!".into();
        })
        .await
        .unwrap();

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "link", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Skipped);
    assert_eq!(trigger.failure_reason.as_deref(), Some("not following"));
    assert!(trigger.dm_sent_at.is_none());
    assert!(!trigger.comment_reply_sent);

    assert_eq!(
        harness.messaging.private_messages().await,
        vec![("u-1".to_string(), "Follow us first, user_u-1!".to_string())]
    );
    assert!(harness.messaging.calls().await.contains(&MessagingCall::FollowCheck {
        account_id: ACCOUNT_EXTERNAL_ID.into(),
        user_id: "u-1".into(),
    }));
    assert_eq!(harness.automation(&automation.id).await.unwrap().total_dms_sent, 0);
}

#[tokio::test]
async fn failing_follow_check_counts_as_not_following() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.require_follow = true;
        })
        .await
        .unwrap();
    harness.messaging.add_follower("u-1").await;
    harness.messaging.fail_follow_checks().await;

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.failure_reason.as_deref(), Some("not following"));
    // Empty gating message: nothing is sent.
    assert!(harness.messaging.private_messages().await.is_empty());
}

#[tokio::test]
async fn followers_pass_the_gate_and_are_recorded() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.require_follow = true;
        })
        .await
        .unwrap();
    harness.messaging.add_follower("u-1").await;

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    assert_eq!(
        harness.trigger(&handles[0].trigger_id).await.unwrap().status,
        TriggerStatus::Sent
    );
    let contact = harness
        .storage
        .get_contact(&harness.account.id, "u-1")
        .await
        .unwrap()
        .unwrap();
    assert!(contact.is_follower);
}

#[tokio::test]
async fn rate_limit_skips_sends_over_threshold() {
    let harness = TestHarness::builder().with_rate_limit(2).build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();

    let mut ids = Vec::new();
    for n in 0..3 {
        let handles = harness
            .ingest(&comment_event(&format!("c-{n}"), &format!("u-{n}"), "x", "p"))
            .await
            .unwrap();
        ids.push(handles[0].trigger_id.clone());
    }
    assert_eq!(harness.drain().await.unwrap(), 3);

    let mut delivered = 0;
    let mut rate_limited = 0;
    for id in &ids {
        let trigger = harness.trigger(id).await.unwrap();
        match trigger.status {
            TriggerStatus::Sent | TriggerStatus::Failed => delivered += 1,
            TriggerStatus::Skipped => {
                assert_eq!(trigger.failure_reason.as_deref(), Some("rate limit exceeded"));
                rate_limited += 1;
            }
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!((delivered, rate_limited), (2, 1));
}

#[tokio::test]
async fn reply_failure_does_not_change_send_outcome() {
    let harness = TestHarness::builder().build().await.unwrap();
    let automation = harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    harness
        .messaging
        .fail_comment_replies(400, "comment deleted")
        .await;

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Sent);
    assert!(!trigger.comment_reply_sent);
    assert!(trigger.comment_reply_sent_at.is_none());

    let stored = harness.automation(&automation.id).await.unwrap();
    assert_eq!(stored.total_dms_sent, 1);
    assert_eq!(stored.total_comment_replies, 0);
}

#[tokio::test]
async fn private_send_failure_records_upstream_text() {
    let harness = TestHarness::builder().build().await.unwrap();
    let automation = harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    harness
        .messaging
        .fail_private_messages(400, "(#551) This person isn't available right now.")
        .await;

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Failed);
    assert_eq!(
        trigger.failure_reason.as_deref(),
        Some("(#551) This person isn't available right now.")
    );
    assert!(trigger.dm_sent_at.is_none());

    let stored = harness.automation(&automation.id).await.unwrap();
    assert_eq!(stored.total_dms_sent, 0);
    assert_eq!(stored.total_comment_replies, 0);
    assert!(harness
        .storage
        .get_contact(&harness.account.id, "u-1")
        .await
        .unwrap()
        .is_none());
    // One attempt, no retry.
    assert_eq!(harness.messaging.private_messages().await.len(), 1);
}

#[tokio::test]
async fn dm_events_skip_the_public_reply() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::DmKeyword, |a| a.keywords = vec!["link".into()])
        .await
        .unwrap();

    let handles = harness
        .ingest(&message_event(TriggerType::DmKeyword, "m-1", "u-1", "LINK"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Sent);
    assert!(!trigger.comment_reply_sent);
    assert!(harness.messaging.comment_replies().await.is_empty());
}

#[tokio::test]
async fn story_mentions_fire_any_automations_only() {
    let harness = TestHarness::builder().build().await.unwrap();
    let any = harness
        .add_automation(TriggerType::StoryMention, |a| {
            a.match_mode = MatchMode::Any;
            a.priority = 0;
        })
        .await
        .unwrap();
    harness
        .add_automation(TriggerType::StoryMention, |a| {
            a.keywords = vec!["price".into()];
            a.priority = 5;
        })
        .await
        .unwrap();

    let handles = harness
        .ingest(&message_event(
            TriggerType::StoryMention,
            "m-1",
            "u-1",
            STORY_MENTION_TEXT,
        ))
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].automation_id, any.id);
}

#[tokio::test]
async fn per_user_limit_stops_repeat_sends() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();

    let first = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    let second = harness
        .ingest(&comment_event("c-2", "u-1", "again", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    assert_eq!(
        harness.trigger(&first[0].trigger_id).await.unwrap().status,
        TriggerStatus::Sent
    );
    let repeat = harness.trigger(&second[0].trigger_id).await.unwrap();
    assert_eq!(repeat.status, TriggerStatus::Skipped);
    assert_eq!(repeat.failure_reason.as_deref(), Some("per-user limit reached"));
}

#[tokio::test]
async fn cooldown_blocks_quick_repeats() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.max_triggers_per_user = 0;
            a.cooldown_minutes = 10;
        })
        .await
        .unwrap();

    harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();
    let second = harness
        .ingest(&comment_event("c-2", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let repeat = harness.trigger(&second[0].trigger_id).await.unwrap();
    assert_eq!(repeat.failure_reason.as_deref(), Some("cooldown active"));
}

#[tokio::test]
async fn ai_enhancement_falls_back_across_models() {
    let harness = TestHarness::builder()
        .with_enhancement_models(&["model-a", "model-b"])
        .build()
        .await
        .unwrap();
    harness.provider.fail("model-a", "overloaded").await;
    harness
        .provider
        .respond("model-b", "Hey user_u-1! Loved your comment, here's the link.")
        .await;
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.use_ai_enhancement = true;
            a.ai_context = "We sell handmade candles".into();
        })
        .await
        .unwrap();

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "so pretty", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Sent);
    assert!(trigger.was_ai_enhanced);
    assert_eq!(trigger.ai_model_used.as_deref(), Some("mock/model-b"));
    assert_eq!(
        trigger.dm_message_sent.as_deref(),
        Some("Hey user_u-1! Loved your comment, here's the link.")
    );
    assert_eq!(
        harness.provider.requested_models().await,
        vec!["model-a", "model-b"]
    );
    let requests = harness.provider.requests().await;
    let prompt = &requests[0].prompt;
    assert!(prompt.contains("We sell handmade candles"));
    assert!(prompt.contains("\"so pretty\" by @user_u-1"));
}

#[tokio::test]
async fn ai_exhaustion_sends_the_original_template() {
    let harness = TestHarness::builder()
        .with_enhancement_models(&["model-a"])
        .build()
        .await
        .unwrap();
    harness.provider.fail("model-a", "overloaded").await;
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.use_ai_enhancement = true;
            a.ai_context = "context".into();
        })
        .await
        .unwrap();

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Sent);
    assert!(!trigger.was_ai_enhanced);
    assert!(trigger.ai_model_used.is_none());
    assert_eq!(
        trigger.dm_message_sent.as_deref(),
        Some("Hi user_u-1, here is your link")
    );
}

#[tokio::test]
async fn enhancement_needs_business_context() {
    let harness = TestHarness::builder()
        .with_enhancement_models(&["model-a"])
        .build()
        .await
        .unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.use_ai_enhancement = true;
            a.ai_context = "   ".into();
        })
        .await
        .unwrap();

    harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();
    assert!(harness.provider.requests().await.is_empty());
}

#[tokio::test]
async fn lifecycle_events_are_published_on_the_account_topic() {
    let harness = TestHarness::builder().build().await.unwrap();
    let automation = harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    let mut subscription = harness.bus.subscribe_account(&harness.account.id);

    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let mut events = Vec::new();
    for _ in 0..2 {
        match tokio::time::timeout(Duration::from_secs(1), subscription.recv())
            .await
            .unwrap()
        {
            Some(Delivery::Event(event)) => {
                assert_eq!(event.owner_id, harness.account.owner_id);
                events.push(event.event);
            }
            other => panic!("unexpected delivery {other:?}"),
        }
    }

    assert_eq!(
        events,
        vec![
            PipelineEvent::Triggered {
                automation_id: automation.id.clone(),
                trigger_id: handles[0].trigger_id.clone(),
                username: "user_u-1".into(),
                status: TriggerStatus::Processing,
            },
            PipelineEvent::Sent {
                automation_id: automation.id.clone(),
                trigger_id: handles[0].trigger_id.clone(),
                recipient: "u-1".into(),
                status: TriggerStatus::Sent,
                comment_reply_sent: true,
            },
        ]
    );
}

#[tokio::test]
async fn processing_a_finished_trigger_is_a_no_op() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let again = harness
        .pipeline
        .processor
        .process(&handles[0].trigger_id)
        .await
        .unwrap();
    assert_eq!(again, None);
    assert_eq!(harness.messaging.private_messages().await.len(), 1);
    assert_eq!(
        harness.pipeline.processor.process("missing").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn reconciler_fails_stuck_processing_triggers() {
    let harness = TestHarness::builder()
        .with_pipeline_config(autodm_config::model::PipelineConfig {
            stale_after_secs: 0,
            ..Default::default()
        })
        .build()
        .await
        .unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    let id = &handles[0].trigger_id;

    // A worker claimed the trigger and then disappeared.
    assert!(harness.storage.claim_trigger(id).await.unwrap());
    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = harness.pipeline.reconciler().sweep().await.unwrap();
    assert_eq!(report.failed, vec![id.clone()]);
    let trigger = harness.trigger(id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Failed);
    assert_eq!(trigger.failure_reason.as_deref(), Some("processing timed out"));

    // The queued task finds nothing left to do.
    harness.drain().await.unwrap();
    assert!(harness.messaging.private_messages().await.is_empty());
}

#[tokio::test]
async fn comment_poller_feeds_new_comments_once() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.keywords = vec!["link".into()];
            a.match_mode = MatchMode::Contains;
            a.target_posts = vec!["post-1".into()];
            a.max_triggers_per_user = 0;
        })
        .await
        .unwrap();
    harness
        .messaging
        .set_comments(
            "post-1",
            vec![
                PlatformComment {
                    id: "c-1".into(),
                    text: "link please".into(),
                    from_id: "u-1".into(),
                    username: "alice".into(),
                },
                PlatformComment {
                    id: "c-2".into(),
                    text: "nice".into(),
                    from_id: "u-2".into(),
                    username: "bob".into(),
                },
                PlatformComment {
                    id: "c-3".into(),
                    text: "link in bio".into(),
                    from_id: ACCOUNT_EXTERNAL_ID.into(),
                    username: "test_shop".into(),
                },
            ],
        )
        .await;

    let poller = harness.pipeline.comment_poller();
    assert_eq!(poller.poll_once().await.unwrap(), 1);
    assert_eq!(poller.poll_once().await.unwrap(), 0);

    harness.drain().await.unwrap();
    assert_eq!(
        harness.messaging.private_messages().await,
        vec![("u-1".to_string(), "Hi alice, here is your link".to_string())]
    );
}

#[tokio::test]
async fn poller_ignores_untargeted_automations() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();

    assert_eq!(
        harness.pipeline.comment_poller().poll_once().await.unwrap(),
        0
    );
    assert!(harness.messaging.calls().await.is_empty());
}

#[tokio::test]
async fn in_memory_guards_deduplicate_and_limit() {
    let harness = TestHarness::builder()
        .with_in_memory_guards()
        .with_rate_limit(1)
        .build()
        .await
        .unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.max_triggers_per_user = 0;
        })
        .await
        .unwrap();

    let first = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    assert!(harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap()
        .is_empty());
    let second = harness
        .ingest(&comment_event("c-2", "u-2", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    assert_eq!(
        harness.trigger(&first[0].trigger_id).await.unwrap().status,
        TriggerStatus::Sent
    );
    assert_eq!(
        harness
            .trigger(&second[0].trigger_id)
            .await
            .unwrap()
            .failure_reason
            .as_deref(),
        Some("rate limit exceeded")
    );
}

#[tokio::test]
async fn status_counts_reflect_outcomes() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness
        .ingest(&comment_event("c-2", "u-1", "x", "p"))
        .await
        .unwrap();
    harness
        .ingest(&comment_event("c-3", "u-2", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let counts = harness.storage.count_triggers_by_status().await.unwrap();
    let count = |status: TriggerStatus| {
        counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };
    assert_eq!(count(TriggerStatus::Sent), 2);
    assert_eq!(count(TriggerStatus::Skipped), 1);
    assert_eq!(count(TriggerStatus::Pending), 0);
}

#[tokio::test]
async fn skipped_triggers_give_back_their_rate_slot() {
    let harness = TestHarness::builder().with_rate_limit(2).build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();

    let mut ids = Vec::new();
    for (comment, user) in [("c-1", "u-1"), ("c-2", "u-1"), ("c-3", "u-2")] {
        let handles = harness
            .ingest(&comment_event(comment, user, "x", "p"))
            .await
            .unwrap();
        ids.push(handles[0].trigger_id.clone());
    }
    assert_eq!(harness.drain().await.unwrap(), 3);

    let mut outcomes = Vec::new();
    for id in &ids {
        let trigger = harness.trigger(id).await.unwrap();
        outcomes.push((trigger.status, trigger.failure_reason));
    }
    assert_eq!(
        outcomes,
        vec![
            (TriggerStatus::Sent, None),
            (TriggerStatus::Skipped, Some("per-user limit reached".to_string())),
            (TriggerStatus::Sent, None),
        ]
    );
    assert_eq!(harness.messaging.private_messages().await.len(), 2);
}

#[tokio::test]
async fn non_followers_do_not_use_up_the_rate_window() {
    let harness = TestHarness::builder().with_rate_limit(1).build().await.unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.require_follow = true;
        })
        .await
        .unwrap();
    harness.messaging.add_follower("u-2").await;

    let stranger = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    let fan = harness
        .ingest(&comment_event("c-2", "u-2", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();

    let skipped = harness.trigger(&stranger[0].trigger_id).await.unwrap();
    assert_eq!(skipped.failure_reason.as_deref(), Some("not following"));
    let sent = harness.trigger(&fan[0].trigger_id).await.unwrap();
    assert_eq!(sent.status, TriggerStatus::Sent);
}

#[tokio::test]
async fn own_comments_from_the_webhook_are_ignored() {
    let harness = TestHarness::builder().build().await.unwrap();
    let automation = harness
        .add_automation(TriggerType::Comment, |a| {
            a.match_mode = MatchMode::Any;
            a.max_triggers_per_user = 0;
        })
        .await
        .unwrap();

    // The account's own public reply comes back as a comment change.
    let echo = comment_event("c-reply", ACCOUNT_EXTERNAL_ID, "✅ Sent! Check your DM", "p");
    assert!(harness.ingest(&echo).await.unwrap().is_empty());
    assert_eq!(harness.drain().await.unwrap(), 0);
    assert!(harness.messaging.calls().await.is_empty());
    assert_eq!(harness.automation(&automation.id).await.unwrap().total_triggers, 0);
}

#[tokio::test]
async fn failed_enqueue_leaves_the_event_open_for_redelivery() {
    let harness = TestHarness::builder().build().await.unwrap();
    let automation = harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    let ingestor = EventIngestor::new(
        harness.storage.clone(),
        harness.storage.clone(),
        Arc::new(Flaky::new(harness.storage.clone(), 1)),
        &PipelineConfig::default(),
    );
    let event = comment_event("c-1", "u-1", "x", "p");

    assert!(ingestor.ingest(ACCOUNT_EXTERNAL_ID, &event).await.is_err());
    let counts = harness.storage.count_triggers_by_status().await.unwrap();
    assert_eq!(counts.iter().map(|(_, n)| n).sum::<i64>(), 0);
    assert_eq!(harness.automation(&automation.id).await.unwrap().total_triggers, 0);

    // The platform redelivers the same event.
    let handles = ingestor.ingest(ACCOUNT_EXTERNAL_ID, &event).await.unwrap();
    assert_eq!(handles.len(), 1);
    assert!(ingestor.ingest(ACCOUNT_EXTERNAL_ID, &event).await.unwrap().is_empty());

    assert_eq!(harness.drain().await.unwrap(), 1);
    assert_eq!(
        harness.trigger(&handles[0].trigger_id).await.unwrap().status,
        TriggerStatus::Sent
    );
}

#[tokio::test]
async fn storage_error_before_sending_is_retried() {
    let harness = TestHarness::builder()
        .with_pipeline_config(PipelineConfig {
            retry_base_secs: 0,
            ..PipelineConfig::default()
        })
        .with_rate_limiter(Arc::new(Flaky::new(Arc::new(InMemoryRateLimiter::new()), 1)))
        .build()
        .await
        .unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    let id = &handles[0].trigger_id;

    let workers = &harness.pipeline.workers;
    assert_eq!(workers.run_once().await.unwrap(), Some(TaskOutcome::Retried));
    assert_eq!(harness.trigger(id).await.unwrap().status, TriggerStatus::Pending);
    let entry = harness
        .storage
        .queue_entry(handles[0].queue_entry_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((entry.status.as_str(), entry.attempts), ("pending", 1));
    assert!(harness.messaging.calls().await.is_empty());

    assert_eq!(workers.run_once().await.unwrap(), Some(TaskOutcome::Acked));
    assert_eq!(harness.trigger(id).await.unwrap().status, TriggerStatus::Sent);
    assert_eq!(harness.messaging.private_messages().await.len(), 1);
}

#[tokio::test]
async fn repeated_infrastructure_failures_park_the_task() {
    let harness = TestHarness::builder()
        .with_pipeline_config(PipelineConfig {
            retry_base_secs: 0,
            max_attempts: 2,
            ..PipelineConfig::default()
        })
        .with_rate_limiter(Arc::new(Flaky::new(
            Arc::new(InMemoryRateLimiter::new()),
            usize::MAX,
        )))
        .build()
        .await
        .unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();

    let workers = &harness.pipeline.workers;
    assert_eq!(workers.run_once().await.unwrap(), Some(TaskOutcome::Retried));
    assert_eq!(workers.run_once().await.unwrap(), Some(TaskOutcome::Retried));
    assert_eq!(workers.run_once().await.unwrap(), None);

    let entry = harness
        .storage
        .queue_entry(handles[0].queue_entry_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((entry.status.as_str(), entry.attempts), ("failed", 2));
    assert_eq!(
        harness.trigger(&handles[0].trigger_id).await.unwrap().status,
        TriggerStatus::Pending
    );
}

#[tokio::test]
async fn hung_task_times_out_and_is_retried() {
    let harness = TestHarness::builder()
        .with_pipeline_config(PipelineConfig {
            task_timeout_secs: 1,
            retry_base_secs: 0,
            max_attempts: 2,
            ..PipelineConfig::default()
        })
        .build()
        .await
        .unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    harness
        .messaging
        .delay_private_messages(Duration::from_secs(30))
        .await;
    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    let entry_id = handles[0].queue_entry_id;

    let workers = &harness.pipeline.workers;
    assert_eq!(workers.run_once().await.unwrap(), Some(TaskOutcome::Retried));
    let entry = harness.storage.queue_entry(entry_id).await.unwrap().unwrap();
    assert_eq!((entry.status.as_str(), entry.attempts), ("pending", 1));

    // The send had started, so the trigger is left for the reconciler and the
    // retried task has nothing to do.
    let trigger = harness.trigger(&handles[0].trigger_id).await.unwrap();
    assert_eq!(trigger.status, TriggerStatus::Processing);
    assert_eq!(workers.run_once().await.unwrap(), Some(TaskOutcome::Acked));
    let entry = harness.storage.queue_entry(entry_id).await.unwrap().unwrap();
    assert_eq!(entry.status, "completed");
}

#[tokio::test]
async fn zero_reconcile_interval_disables_the_sweeper() {
    let harness = TestHarness::builder()
        .with_pipeline_config(PipelineConfig {
            reconcile_interval_secs: 0,
            comment_poll_interval_secs: 0,
            ..PipelineConfig::default()
        })
        .build()
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();
    harness.pipeline.spawn_background(&mut tasks, &cancel);
    assert_eq!(tasks.len(), 1);

    // Called directly with a zero period, the loop returns instead of panicking.
    tokio::time::timeout(
        Duration::from_secs(1),
        harness.pipeline.reconciler().run(Duration::ZERO, cancel.clone()),
    )
    .await
    .unwrap();

    cancel.cancel();
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }
}

#[tokio::test]
async fn sweep_purges_expired_marks_and_finished_tasks() {
    let harness = TestHarness::builder()
        .with_pipeline_config(PipelineConfig {
            dedup_ttl_secs: 0,
            queue_retention_secs: 0,
            ..PipelineConfig::default()
        })
        .build()
        .await
        .unwrap();
    harness
        .add_automation(TriggerType::Comment, |a| a.match_mode = MatchMode::Any)
        .await
        .unwrap();
    let handles = harness
        .ingest(&comment_event("c-1", "u-1", "x", "p"))
        .await
        .unwrap();
    harness.drain().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = harness.pipeline.reconciler().sweep().await.unwrap();
    assert!(report.failed.is_empty());
    assert_eq!((report.dedup_purged, report.queue_purged), (1, 1));
    assert!(harness
        .storage
        .queue_entry(handles[0].queue_entry_id)
        .await
        .unwrap()
        .is_none());
    // Triggers are history and are never purged.
    assert_eq!(
        harness.trigger(&handles[0].trigger_id).await.unwrap().status,
        TriggerStatus::Sent
    );
}
