// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation rule operations and running counters.

use autodm_core::AutodmError;
use autodm_core::types::{Automation, AutomationCounter, TriggerType, now_timestamp};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{enum_column, json_column};

const AUTOMATION_COLUMNS: &str = "id, account_id, name, trigger_type, keywords, match_mode,
    target_posts, enable_comment_reply, comment_reply_message, dm_message, dm_buttons,
    require_follow, follow_check_message, use_ai_enhancement, ai_context,
    max_triggers_per_user, cooldown_minutes, priority, is_active, total_triggers,
    total_dms_sent, total_comment_replies, created_at, updated_at";

fn automation_from_row(row: &Row<'_>) -> rusqlite::Result<Automation> {
    Ok(Automation {
        id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        trigger_type: enum_column(row, 3)?,
        keywords: json_column(row, 4)?,
        match_mode: enum_column(row, 5)?,
        target_posts: json_column(row, 6)?,
        enable_comment_reply: row.get(7)?,
        comment_reply_message: row.get(8)?,
        dm_message: row.get(9)?,
        dm_buttons: json_column(row, 10)?,
        require_follow: row.get(11)?,
        follow_check_message: row.get(12)?,
        use_ai_enhancement: row.get(13)?,
        ai_context: row.get(14)?,
        max_triggers_per_user: row.get(15)?,
        cooldown_minutes: row.get(16)?,
        priority: row.get(17)?,
        is_active: row.get(18)?,
        total_triggers: row.get(19)?,
        total_dms_sent: row.get(20)?,
        total_comment_replies: row.get(21)?,
        created_at: row.get(22)?,
        updated_at: row.get(23)?,
    })
}

/// Insert or update an automation's definition.
///
/// Running counters are never overwritten by an update; they only move through
/// [`increment_counter`].
pub async fn upsert_automation(db: &Database, automation: &Automation) -> Result<(), AutodmError> {
    let keywords = serde_json::to_string(&automation.keywords)?;
    let target_posts = serde_json::to_string(&automation.target_posts)?;
    let dm_buttons = serde_json::to_string(&automation.dm_buttons)?;
    let a = automation.clone();
    let trigger_type = a.trigger_type.to_string();
    let match_mode = a.match_mode.to_string();

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO automations (id, account_id, name, trigger_type, keywords, match_mode,
                    target_posts, enable_comment_reply, comment_reply_message, dm_message,
                    dm_buttons, require_follow, follow_check_message, use_ai_enhancement,
                    ai_context, max_triggers_per_user, cooldown_minutes, priority, is_active,
                    total_triggers, total_dms_sent, total_comment_replies, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    trigger_type = excluded.trigger_type,
                    keywords = excluded.keywords,
                    match_mode = excluded.match_mode,
                    target_posts = excluded.target_posts,
                    enable_comment_reply = excluded.enable_comment_reply,
                    comment_reply_message = excluded.comment_reply_message,
                    dm_message = excluded.dm_message,
                    dm_buttons = excluded.dm_buttons,
                    require_follow = excluded.require_follow,
                    follow_check_message = excluded.follow_check_message,
                    use_ai_enhancement = excluded.use_ai_enhancement,
                    ai_context = excluded.ai_context,
                    max_triggers_per_user = excluded.max_triggers_per_user,
                    cooldown_minutes = excluded.cooldown_minutes,
                    priority = excluded.priority,
                    is_active = excluded.is_active,
                    updated_at = excluded.updated_at",
                params![
                    a.id,
                    a.account_id,
                    a.name,
                    trigger_type,
                    keywords,
                    match_mode,
                    target_posts,
                    a.enable_comment_reply,
                    a.comment_reply_message,
                    a.dm_message,
                    dm_buttons,
                    a.require_follow,
                    a.follow_check_message,
                    a.use_ai_enhancement,
                    a.ai_context,
                    a.max_triggers_per_user,
                    a.cooldown_minutes,
                    a.priority,
                    a.is_active,
                    a.total_triggers,
                    a.total_dms_sent,
                    a.total_comment_replies,
                    a.created_at,
                    a.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_automation(db: &Database, id: &str) -> Result<Option<Automation>, AutodmError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Automation>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {AUTOMATION_COLUMNS} FROM automations WHERE id = ?1"),
                params![id],
                automation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Active automations of one type for an account, in matching order.
pub async fn list_candidate_automations(
    db: &Database,
    account_id: &str,
    trigger_type: TriggerType,
) -> Result<Vec<Automation>, AutodmError> {
    let account_id = account_id.to_string();
    let trigger_type = trigger_type.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Automation>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUTOMATION_COLUMNS} FROM automations
                 WHERE account_id = ?1 AND trigger_type = ?2 AND is_active = 1
                 ORDER BY priority DESC, created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![account_id, trigger_type], automation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Active automations of one type across all active accounts.
pub async fn list_active_automations(
    db: &Database,
    trigger_type: TriggerType,
) -> Result<Vec<Automation>, AutodmError> {
    let trigger_type = trigger_type.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Automation>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUTOMATION_COLUMNS} FROM automations
                 WHERE trigger_type = ?1 AND is_active = 1
                   AND account_id IN (SELECT id FROM accounts WHERE is_active = 1)
                 ORDER BY account_id, priority DESC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![trigger_type], automation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically bump one running counter.
pub async fn increment_counter(
    db: &Database,
    automation_id: &str,
    counter: AutomationCounter,
) -> Result<(), AutodmError> {
    let column = match counter {
        AutomationCounter::Triggers => "total_triggers",
        AutomationCounter::DmsSent => "total_dms_sent",
        AutomationCounter::CommentReplies => "total_comment_replies",
    };
    let id = automation_id.to_string();
    let now = now_timestamp();
    let updated = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE automations SET {column} = {column} + 1, updated_at = ?1 WHERE id = ?2"
                ),
                params![now, id],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if updated == 0 {
        return Err(AutodmError::NotFound {
            entity: "automation",
            id: automation_id.to_string(),
        });
    }
    Ok(())
}
