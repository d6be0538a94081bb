// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the SQLite repository, queue, dedup and rate windows.

use std::sync::Arc;
use std::time::Duration;

use autodm_config::model::StorageConfig;
use autodm_core::types::{
    Account, Automation, AutomationCounter, EngagementEvent, MatchMode, Trigger, TriggerStatus,
    TriggerType, now_timestamp,
};
use autodm_core::{DedupCache, RateLimiter, StorageAdapter, TaskQueue};
use autodm_storage::SqliteStorage;
use tempfile::TempDir;

async fn open_storage() -> (Arc<SqliteStorage>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autodm.db");
    let storage = SqliteStorage::new(StorageConfig {
        database_path: path.to_str().unwrap().to_string(),
        wal_mode: true,
    });
    storage.initialize().await.unwrap();
    (Arc::new(storage), dir)
}

fn account(id: &str) -> Account {
    Account {
        id: id.to_string(),
        external_id: format!("ig-{id}"),
        username: "shop".to_string(),
        access_token: "token".to_string(),
        owner_id: "owner-1".to_string(),
        is_active: true,
    }
}

fn comment_event(event_id: &str, user: &str) -> EngagementEvent {
    EngagementEvent {
        kind: TriggerType::Comment,
        event_id: event_id.to_string(),
        sender_id: user.to_string(),
        username: format!("{user}_name"),
        text: "link please".to_string(),
        post_id: Some("post-1".to_string()),
        comment_id: Some(event_id.to_string()),
    }
}

async fn seed(storage: &SqliteStorage) -> Automation {
    storage.upsert_account(&account("acc-1")).await.unwrap();
    let mut automation = Automation::new("acc-1", "link", TriggerType::Comment, "Hi {username}");
    automation.keywords = vec!["link please".to_string()];
    automation.match_mode = MatchMode::Exact;
    automation.target_posts = vec!["post-1".to_string()];
    storage.upsert_automation(&automation).await.unwrap();
    automation
}

#[tokio::test]
async fn account_lookup_by_external_id() {
    let (storage, _dir) = open_storage().await;
    storage.upsert_account(&account("acc-1")).await.unwrap();

    let found = storage.get_account_by_external_id("ig-acc-1").await.unwrap().unwrap();
    assert_eq!(found.id, "acc-1");
    assert!(storage.get_account_by_external_id("ig-none").await.unwrap().is_none());

    let mut deactivated = account("acc-1");
    deactivated.is_active = false;
    storage.upsert_account(&deactivated).await.unwrap();
    assert!(!storage.get_account("acc-1").await.unwrap().unwrap().is_active);
}

#[tokio::test]
async fn automation_round_trips_with_json_columns() {
    let (storage, _dir) = open_storage().await;
    let mut automation = seed(&storage).await;
    automation.dm_buttons = vec![autodm_core::types::DmButton {
        text: "Shop".to_string(),
        url: Some("https://shop.example".to_string()),
    }];
    storage.upsert_automation(&automation).await.unwrap();

    let loaded = storage.get_automation(&automation.id).await.unwrap().unwrap();
    assert_eq!(loaded, automation);
}

#[tokio::test]
async fn candidates_are_ordered_by_priority_then_age_and_skip_inactive() {
    let (storage, _dir) = open_storage().await;
    storage.upsert_account(&account("acc-1")).await.unwrap();

    let mut low = Automation::new("acc-1", "low", TriggerType::Comment, "x");
    low.priority = 1;
    low.created_at = "2026-01-01T00:00:00.000Z".to_string();
    let mut high_new = Automation::new("acc-1", "high-new", TriggerType::Comment, "x");
    high_new.priority = 5;
    high_new.created_at = "2026-01-03T00:00:00.000Z".to_string();
    let mut high_old = Automation::new("acc-1", "high-old", TriggerType::Comment, "x");
    high_old.priority = 5;
    high_old.created_at = "2026-01-02T00:00:00.000Z".to_string();
    let mut inactive = Automation::new("acc-1", "off", TriggerType::Comment, "x");
    inactive.priority = 10;
    inactive.is_active = false;
    let dm = Automation::new("acc-1", "dm", TriggerType::DmKeyword, "x");

    for a in [&low, &high_new, &high_old, &inactive, &dm] {
        storage.upsert_automation(a).await.unwrap();
    }

    let names: Vec<String> = storage
        .list_candidate_automations("acc-1", TriggerType::Comment)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(names, vec!["high-old", "high-new", "low"]);
}

#[tokio::test]
async fn counters_increment_and_survive_definition_updates() {
    let (storage, _dir) = open_storage().await;
    let automation = seed(&storage).await;

    for _ in 0..3 {
        storage
            .increment_counter(&automation.id, AutomationCounter::Triggers)
            .await
            .unwrap();
    }
    storage
        .increment_counter(&automation.id, AutomationCounter::DmsSent)
        .await
        .unwrap();

    // Re-saving the definition must not reset counters.
    storage.upsert_automation(&automation).await.unwrap();

    let loaded = storage.get_automation(&automation.id).await.unwrap().unwrap();
    assert_eq!(loaded.total_triggers, 3);
    assert_eq!(loaded.total_dms_sent, 1);
    assert_eq!(loaded.total_comment_replies, 0);

    let missing = storage
        .increment_counter("nope", AutomationCounter::Triggers)
        .await;
    assert!(matches!(missing, Err(autodm_core::AutodmError::NotFound { .. })));
}

#[tokio::test]
async fn concurrent_counter_increments_are_not_lost() {
    let (storage, _dir) = open_storage().await;
    let automation = seed(&storage).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let storage = storage.clone();
        let id = automation.id.clone();
        handles.push(tokio::spawn(async move {
            storage
                .increment_counter(&id, AutomationCounter::CommentReplies)
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let loaded = storage.get_automation(&automation.id).await.unwrap().unwrap();
    assert_eq!(loaded.total_comment_replies, 20);
}

#[tokio::test]
async fn trigger_claim_is_exclusive_and_completion_requires_processing() {
    let (storage, _dir) = open_storage().await;
    let automation = seed(&storage).await;
    let trigger = Trigger::pending(&automation, &comment_event("c-1", "u-1"));
    storage.insert_trigger(&trigger).await.unwrap();

    assert!(storage.claim_trigger(&trigger.id).await.unwrap());
    assert!(!storage.claim_trigger(&trigger.id).await.unwrap());

    let mut done = storage.get_trigger(&trigger.id).await.unwrap().unwrap();
    assert_eq!(done.status, TriggerStatus::Processing);
    done.status = TriggerStatus::Sent;
    done.dm_sent_at = Some(now_timestamp());
    done.dm_message_sent = Some("Hi u-1_name".to_string());
    assert!(storage.complete_trigger(&done).await.unwrap());

    // Terminal rows are never rewritten.
    let mut again = done.clone();
    again.status = TriggerStatus::Failed;
    again.failure_reason = Some("late".to_string());
    assert!(!storage.complete_trigger(&again).await.unwrap());

    let stored = storage.get_trigger(&trigger.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TriggerStatus::Sent);
    assert!(stored.failure_reason.is_none());
}

#[tokio::test]
async fn released_trigger_can_be_claimed_again() {
    let (storage, _dir) = open_storage().await;
    let automation = seed(&storage).await;
    let trigger = Trigger::pending(&automation, &comment_event("c-1", "u-1"));
    storage.insert_trigger(&trigger).await.unwrap();

    // Only a processing row can be released.
    assert!(!storage.release_trigger(&trigger.id).await.unwrap());
    assert!(storage.claim_trigger(&trigger.id).await.unwrap());
    assert!(storage.release_trigger(&trigger.id).await.unwrap());
    let stored = storage.get_trigger(&trigger.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TriggerStatus::Pending);
    assert!(storage.claim_trigger(&trigger.id).await.unwrap());

    // Discarding only removes pending rows.
    assert!(!storage.discard_trigger(&trigger.id).await.unwrap());
    let other = Trigger::pending(&automation, &comment_event("c-2", "u-2"));
    storage.insert_trigger(&other).await.unwrap();
    assert!(storage.discard_trigger(&other.id).await.unwrap());
    assert!(storage.get_trigger(&other.id).await.unwrap().is_none());
}

#[tokio::test]
async fn per_user_history_counts_only_sent() {
    let (storage, _dir) = open_storage().await;
    let automation = seed(&storage).await;

    let sent_at = ["2026-02-01T10:00:00.000Z", "2026-02-01T11:00:00.000Z"];
    for (i, at) in sent_at.iter().enumerate() {
        let mut t = Trigger::pending(&automation, &comment_event(&format!("c-{i}"), "u-1"));
        t.status = TriggerStatus::Sent;
        t.dm_sent_at = Some(at.to_string());
        storage.insert_trigger(&t).await.unwrap();
    }
    let mut skipped = Trigger::pending(&automation, &comment_event("c-9", "u-1"));
    skipped.status = TriggerStatus::Skipped;
    storage.insert_trigger(&skipped).await.unwrap();

    assert_eq!(storage.count_sent_for_user(&automation.id, "u-1").await.unwrap(), 2);
    assert_eq!(storage.count_sent_for_user(&automation.id, "u-2").await.unwrap(), 0);
    assert_eq!(
        storage.last_sent_for_user(&automation.id, "u-1").await.unwrap().as_deref(),
        Some("2026-02-01T11:00:00.000Z")
    );
    assert!(storage.last_sent_for_user(&automation.id, "u-2").await.unwrap().is_none());
}

#[tokio::test]
async fn stale_processing_triggers_are_failed() {
    let (storage, _dir) = open_storage().await;
    let automation = seed(&storage).await;

    let stale = Trigger::pending(&automation, &comment_event("c-1", "u-1"));
    let fresh = Trigger::pending(&automation, &comment_event("c-2", "u-2"));
    storage.insert_trigger(&stale).await.unwrap();
    storage.insert_trigger(&fresh).await.unwrap();
    storage.claim_trigger(&stale.id).await.unwrap();

    // Everything touched before the far future counts as stale; only the
    // processing one is swept.
    let swept = storage
        .fail_stale_triggers("9999-01-01T00:00:00.000Z", "processing timed out")
        .await
        .unwrap();
    assert_eq!(swept, vec![stale.id.clone()]);

    let stale = storage.get_trigger(&stale.id).await.unwrap().unwrap();
    assert_eq!(stale.status, TriggerStatus::Failed);
    assert_eq!(stale.failure_reason.as_deref(), Some("processing timed out"));
    let fresh = storage.get_trigger(&fresh.id).await.unwrap().unwrap();
    assert_eq!(fresh.status, TriggerStatus::Pending);

    let counts = storage.count_triggers_by_status().await.unwrap();
    assert!(counts.contains(&(TriggerStatus::Failed, 1)));
    assert!(counts.contains(&(TriggerStatus::Pending, 1)));
}

#[tokio::test]
async fn contact_rollup_accumulates() {
    let (storage, _dir) = open_storage().await;
    seed(&storage).await;

    storage.record_contact_send("acc-1", "u-1", "alice", false).await.unwrap();
    storage.record_contact_send("acc-1", "u-1", "", true).await.unwrap();

    let contact = storage.get_contact("acc-1", "u-1").await.unwrap().unwrap();
    assert_eq!(contact.username, "alice");
    assert_eq!(contact.total_interactions, 2);
    assert_eq!(contact.total_dms_received, 2);
    assert!(contact.is_follower);
    assert!(contact.first_interaction <= contact.last_interaction);
    assert!(contact.tags.is_empty());
}

#[tokio::test]
async fn queue_leases_acks_and_backs_off() {
    let (storage, _dir) = open_storage().await;
    let lease = Duration::from_secs(300);

    let id = storage.enqueue("triggers", "t-1", 2).await.unwrap();
    let entry = storage.dequeue("triggers", lease).await.unwrap().unwrap();
    assert_eq!(entry.id, id);
    assert_eq!(entry.status, "processing");
    assert!(storage.dequeue("triggers", lease).await.unwrap().is_none());

    // First failure: back to pending but not yet available.
    storage.fail(id, Duration::from_secs(3600)).await.unwrap();
    assert!(storage.dequeue("triggers", lease).await.unwrap().is_none());

    // A zero backoff makes it available right away.
    let id2 = storage.enqueue("triggers", "t-2", 2).await.unwrap();
    storage.dequeue("triggers", lease).await.unwrap().unwrap();
    storage.fail(id2, Duration::ZERO).await.unwrap();
    let retry = storage.dequeue("triggers", lease).await.unwrap().unwrap();
    assert_eq!(retry.id, id2);
    assert_eq!(retry.attempts, 1);

    // Second failure exhausts max_attempts = 2.
    storage.fail(id2, Duration::ZERO).await.unwrap();
    assert!(storage.dequeue("triggers", lease).await.unwrap().is_none());

    let id3 = storage.enqueue("triggers", "t-3", 3).await.unwrap();
    storage.dequeue("triggers", lease).await.unwrap().unwrap();
    storage.ack(id3).await.unwrap();
    assert!(storage.dequeue("triggers", lease).await.unwrap().is_none());
}

#[tokio::test]
async fn finished_queue_entries_are_purged_after_retention() {
    let (storage, _dir) = open_storage().await;
    let lease = Duration::from_secs(300);

    let done = storage.enqueue("triggers", "t-1", 1).await.unwrap();
    storage.dequeue("triggers", lease).await.unwrap().unwrap();
    storage.ack(done).await.unwrap();

    let parked = storage.enqueue("triggers", "t-2", 1).await.unwrap();
    storage.dequeue("triggers", lease).await.unwrap().unwrap();
    storage.fail(parked, Duration::ZERO).await.unwrap();
    assert_eq!(storage.queue_entry(parked).await.unwrap().unwrap().status, "failed");

    let waiting = storage.enqueue("triggers", "t-3", 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(storage.purge_finished(Duration::from_secs(3600)).await.unwrap(), 0);
    assert_eq!(storage.purge_finished(Duration::ZERO).await.unwrap(), 2);
    assert!(storage.queue_entry(done).await.unwrap().is_none());
    assert!(storage.queue_entry(parked).await.unwrap().is_none());
    assert_eq!(storage.queue_entry(waiting).await.unwrap().unwrap().status, "pending");
}

#[tokio::test]
async fn expired_lease_is_redelivered() {
    let (storage, _dir) = open_storage().await;
    let id = storage.enqueue("triggers", "t-1", 3).await.unwrap();
    storage.dequeue("triggers", Duration::ZERO).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let again = storage.dequeue("triggers", Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(again.id, id);
}

#[tokio::test]
async fn dedup_claim_is_first_wins_until_expiry() {
    let (storage, _dir) = open_storage().await;
    let ttl = Duration::from_secs(86_400);

    assert!(storage.claim("c-1", ttl).await.unwrap());
    assert!(!storage.claim("c-1", ttl).await.unwrap());
    assert!(storage.claim("c-2", ttl).await.unwrap());

    assert!(storage.claim("short", Duration::ZERO).await.unwrap());
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(storage.claim("short", ttl).await.unwrap());
    assert_eq!(storage.purge_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn forgotten_and_expired_marks_are_gone() {
    let (storage, _dir) = open_storage().await;
    let ttl = Duration::from_secs(86_400);

    assert!(storage.claim("c-1", ttl).await.unwrap());
    storage.forget("c-1").await.unwrap();
    assert!(storage.claim("c-1", ttl).await.unwrap());
    // Forgetting an unknown key is a no-op.
    storage.forget("never-seen").await.unwrap();

    assert!(storage.claim("old-1", Duration::ZERO).await.unwrap());
    assert!(storage.claim("old-2", Duration::ZERO).await.unwrap());
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(storage.purge_expired().await.unwrap(), 2);
    assert!(!storage.claim("c-1", ttl).await.unwrap());
}

#[tokio::test]
async fn concurrent_dedup_claims_admit_one() {
    let (storage, _dir) = open_storage().await;
    let mut handles = Vec::new();
    for _ in 0..10 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            storage.claim("c-race", Duration::from_secs(60)).await.unwrap()
        }));
    }
    let mut wins = 0;
    for h in handles {
        if h.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn rate_window_reserves_slots_atomically() {
    let (storage, _dir) = open_storage().await;
    let window = Duration::from_secs(3600);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            storage.try_acquire("acc-1", 2, window).await.unwrap()
        }));
    }
    let mut allowed = 0;
    for h in handles {
        if h.await.unwrap().is_allowed() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 2);

    // Other keys have their own window.
    assert!(storage.try_acquire("acc-2", 2, window).await.unwrap().is_allowed());
}

#[tokio::test]
async fn released_rate_slot_is_admitted_again() {
    let (storage, _dir) = open_storage().await;
    let window = Duration::from_secs(3600);

    assert!(storage.try_acquire("acc-1", 1, window).await.unwrap().is_allowed());
    assert!(!storage.try_acquire("acc-1", 1, window).await.unwrap().is_allowed());
    storage.release("acc-1").await.unwrap();
    assert!(storage.try_acquire("acc-1", 1, window).await.unwrap().is_allowed());

    // Releasing an empty window does nothing.
    storage.release("acc-2").await.unwrap();
    assert!(storage.try_acquire("acc-2", 1, window).await.unwrap().is_allowed());
}
