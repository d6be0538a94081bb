// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sliding-window admission counters.

use std::time::Duration;

use autodm_core::AutodmError;
use autodm_core::types::{RateDecision, format_timestamp};
use chrono::Utc;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Admit one event for `key` if the window has room, reserving the slot.
///
/// Pruning, counting and reserving run in one transaction on the single
/// writer thread, so concurrent callers cannot overshoot `limit`.
pub async fn try_acquire(
    db: &Database,
    key: &str,
    limit: u32,
    window: Duration,
) -> Result<RateDecision, AutodmError> {
    let key = key.to_string();
    let now = Utc::now();
    let window =
        chrono::Duration::from_std(window).map_err(|e| AutodmError::Internal(e.to_string()))?;
    let cutoff = format_timestamp(now - window);
    let now = format_timestamp(now);
    db.connection()
        .call(move |conn| -> Result<RateDecision, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM rate_events WHERE key = ?1 AND created_at <= ?2",
                params![key, cutoff],
            )?;
            let current: u32 = tx.query_row(
                "SELECT COUNT(*) FROM rate_events WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            let decision = if current < limit {
                tx.execute(
                    "INSERT INTO rate_events (key, created_at) VALUES (?1, ?2)",
                    params![key, now],
                )?;
                RateDecision::Allowed {
                    remaining: limit - current - 1,
                }
            } else {
                RateDecision::Limited { current }
            };
            tx.commit()?;
            Ok(decision)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove the newest reservation for `key`, if any.
pub async fn release(db: &Database, key: &str) -> Result<(), AutodmError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "DELETE FROM rate_events WHERE id = (
                     SELECT id FROM rate_events WHERE key = ?1
                     ORDER BY id DESC LIMIT 1)",
                params![key],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
