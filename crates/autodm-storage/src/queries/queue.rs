// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for at-least-once trigger processing.

use std::time::Duration;

use autodm_core::AutodmError;
use autodm_core::types::{QueueEntry, format_timestamp, now_timestamp};
use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

fn after(delay: Duration) -> String {
    let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
    format_timestamp(Utc::now().checked_add_signed(delay).unwrap_or(chrono::DateTime::<Utc>::MAX_UTC))
}

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    max_attempts: i32,
) -> Result<i64, AutodmError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts, available_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4, ?4)",
                params![queue_name, payload, max_attempts, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Lease the next available entry from the named queue.
///
/// An entry is available when it is `pending` and its `available_at` has
/// passed, or when it is `processing` but its lease ran out. Selection and
/// lease happen in one transaction.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    lease: Duration,
) -> Result<Option<QueueEntry>, AutodmError> {
    let queue_name = queue_name.to_string();
    let now = now_timestamp();
    let locked_until = after(lease);
    db.connection()
        .call(move |conn| -> Result<Option<QueueEntry>, rusqlite::Error> {
            let tx = conn.transaction()?;

            let result = tx.query_row(
                "SELECT id, queue_name, payload, status, attempts, max_attempts,
                        available_at, created_at, updated_at, locked_until
                 FROM queue
                 WHERE queue_name = ?1
                   AND ((status = 'pending' AND available_at <= ?2)
                     OR (status = 'processing' AND locked_until < ?2))
                 ORDER BY available_at ASC, id ASC
                 LIMIT 1",
                params![queue_name, now],
                |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        status: row.get(3)?,
                        attempts: row.get(4)?,
                        max_attempts: row.get(5)?,
                        available_at: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                        locked_until: row.get(9)?,
                    })
                },
            );

            match result {
                Ok(entry) => {
                    tx.execute(
                        "UPDATE queue SET status = 'processing', locked_until = ?1, updated_at = ?2
                         WHERE id = ?3",
                        params![locked_until, now, entry.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        locked_until: Some(locked_until),
                        updated_at: now,
                        ..entry
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an entry as completed.
pub async fn ack(db: &Database, id: i64) -> Result<(), AutodmError> {
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL, updated_at = ?1
                 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt.
///
/// Increments attempts. Once attempts reach `max_attempts` the entry is parked
/// as `failed`; otherwise it returns to `pending`, available after `retry_after`.
pub async fn fail(db: &Database, id: i64, retry_after: Duration) -> Result<(), AutodmError> {
    let now = now_timestamp();
    let available_at = after(retry_after);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            let (attempts, max_attempts): (i32, i32) = tx.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            if new_attempts >= max_attempts {
                tx.execute(
                    "UPDATE queue SET status = 'failed', attempts = ?1, locked_until = NULL,
                     updated_at = ?2 WHERE id = ?3",
                    params![new_attempts, now, id],
                )?;
            } else {
                tx.execute(
                    "UPDATE queue SET status = 'pending', attempts = ?1, locked_until = NULL,
                     available_at = ?2, updated_at = ?3 WHERE id = ?4",
                    params![new_attempts, available_at, now, id],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete finished entries (`completed` or `failed`) not touched since
/// `older_than` ago.
pub async fn purge_finished(db: &Database, older_than: Duration) -> Result<usize, AutodmError> {
    let age = chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(age)
        .map(format_timestamp)
        .unwrap_or_default();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM queue WHERE status IN ('completed', 'failed') AND updated_at < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one entry by id.
pub async fn get_entry(db: &Database, id: i64) -> Result<Option<QueueEntry>, AutodmError> {
    db.connection()
        .call(move |conn| -> Result<Option<QueueEntry>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, queue_name, payload, status, attempts, max_attempts,
                        available_at, created_at, updated_at, locked_until
                 FROM queue WHERE id = ?1",
                params![id],
                |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        status: row.get(3)?,
                        attempts: row.get(4)?,
                        max_attempts: row.get(5)?,
                        available_at: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                        locked_until: row.get(9)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
