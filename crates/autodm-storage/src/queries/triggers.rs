// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger lifecycle operations.
//!
//! Status only moves forward: `claim_trigger` is the single `pending ->
//! processing` edge and `complete_trigger` only writes over a row that is
//! still `processing`. The one exception is `release_trigger`, which hands a
//! claimed row back before anything was sent.

use autodm_core::AutodmError;
use autodm_core::types::{Trigger, TriggerStatus, now_timestamp};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::queries::enum_column;

const TRIGGER_COLUMNS: &str = "id, automation_id, account_id, external_user_id, username,
    post_id, comment_id, event_text, status, failure_reason, comment_reply_sent,
    comment_reply_text, comment_reply_sent_at, dm_sent_at, dm_message_sent,
    was_ai_enhanced, ai_model_used, created_at, updated_at";

fn trigger_from_row(row: &Row<'_>) -> rusqlite::Result<Trigger> {
    Ok(Trigger {
        id: row.get(0)?,
        automation_id: row.get(1)?,
        account_id: row.get(2)?,
        external_user_id: row.get(3)?,
        username: row.get(4)?,
        post_id: row.get(5)?,
        comment_id: row.get(6)?,
        event_text: row.get(7)?,
        status: enum_column(row, 8)?,
        failure_reason: row.get(9)?,
        comment_reply_sent: row.get(10)?,
        comment_reply_text: row.get(11)?,
        comment_reply_sent_at: row.get(12)?,
        dm_sent_at: row.get(13)?,
        dm_message_sent: row.get(14)?,
        was_ai_enhanced: row.get(15)?,
        ai_model_used: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

pub async fn insert_trigger(db: &Database, trigger: &Trigger) -> Result<(), AutodmError> {
    let t = trigger.clone();
    let status = t.status.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                &format!(
                    "INSERT INTO triggers ({TRIGGER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                        ?16, ?17, ?18, ?19)"
                ),
                params![
                    t.id,
                    t.automation_id,
                    t.account_id,
                    t.external_user_id,
                    t.username,
                    t.post_id,
                    t.comment_id,
                    t.event_text,
                    status,
                    t.failure_reason,
                    t.comment_reply_sent,
                    t.comment_reply_text,
                    t.comment_reply_sent_at,
                    t.dm_sent_at,
                    t.dm_message_sent,
                    t.was_ai_enhanced,
                    t.ai_model_used,
                    t.created_at,
                    t.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_trigger(db: &Database, id: &str) -> Result<Option<Trigger>, AutodmError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Trigger>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {TRIGGER_COLUMNS} FROM triggers WHERE id = ?1"),
                params![id],
                trigger_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Compare-and-set `pending -> processing`. Returns whether this call won.
pub async fn claim_trigger(db: &Database, id: &str) -> Result<bool, AutodmError> {
    let id = id.to_string();
    let now = now_timestamp();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE triggers SET status = 'processing', updated_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![now, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Write the outcome fields of a trigger that is still `processing`.
pub async fn complete_trigger(db: &Database, trigger: &Trigger) -> Result<bool, AutodmError> {
    let t = trigger.clone();
    let status = t.status.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE triggers SET
                    status = ?1,
                    failure_reason = ?2,
                    comment_reply_sent = ?3,
                    comment_reply_text = ?4,
                    comment_reply_sent_at = ?5,
                    dm_sent_at = ?6,
                    dm_message_sent = ?7,
                    was_ai_enhanced = ?8,
                    ai_model_used = ?9,
                    updated_at = ?10
                 WHERE id = ?11 AND status = 'processing'",
                params![
                    status,
                    t.failure_reason,
                    t.comment_reply_sent,
                    t.comment_reply_text,
                    t.comment_reply_sent_at,
                    t.dm_sent_at,
                    t.dm_message_sent,
                    t.was_ai_enhanced,
                    t.ai_model_used,
                    t.updated_at,
                    t.id,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Compare-and-set `processing -> pending`. Returns whether the row moved.
pub async fn release_trigger(db: &Database, id: &str) -> Result<bool, AutodmError> {
    let id = id.to_string();
    let now = now_timestamp();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE triggers SET status = 'pending', updated_at = ?1
                 WHERE id = ?2 AND status = 'processing'",
                params![now, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Delete a trigger that never left `pending`.
pub async fn discard_trigger(db: &Database, id: &str) -> Result<bool, AutodmError> {
    let id = id.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM triggers WHERE id = ?1 AND status = 'pending'",
                params![id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

pub async fn count_sent_for_user(
    db: &Database,
    automation_id: &str,
    external_user_id: &str,
) -> Result<i64, AutodmError> {
    let automation_id = automation_id.to_string();
    let user = external_user_id.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM triggers
                 WHERE automation_id = ?1 AND external_user_id = ?2 AND status = 'sent'",
                params![automation_id, user],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn last_sent_for_user(
    db: &Database,
    automation_id: &str,
    external_user_id: &str,
) -> Result<Option<String>, AutodmError> {
    let automation_id = automation_id.to_string();
    let user = external_user_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            conn.query_row(
                "SELECT MAX(dm_sent_at) FROM triggers
                 WHERE automation_id = ?1 AND external_user_id = ?2 AND status = 'sent'",
                params![automation_id, user],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Fail every `processing` trigger last touched before `older_than`.
pub async fn fail_stale_triggers(
    db: &Database,
    older_than: &str,
    reason: &str,
) -> Result<Vec<String>, AutodmError> {
    let older_than = older_than.to_string();
    let reason = reason.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let ids = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM triggers
                     WHERE status = 'processing' AND updated_at < ?1
                     ORDER BY updated_at",
                )?;
                let rows = stmt.query_map(params![older_than], |row| row.get::<_, String>(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            for id in &ids {
                tx.execute(
                    "UPDATE triggers SET status = 'failed', failure_reason = ?1, updated_at = ?2
                     WHERE id = ?3 AND status = 'processing'",
                    params![reason, now, id],
                )?;
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_by_status(db: &Database) -> Result<Vec<(TriggerStatus, i64)>, AutodmError> {
    db.connection()
        .call(|conn| -> Result<Vec<(TriggerStatus, i64)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM triggers GROUP BY status ORDER BY status",
            )?;
            let rows = stmt.query_map([], |row| Ok((enum_column(row, 0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
