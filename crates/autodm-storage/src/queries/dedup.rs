// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seen-event markers with expiry.

use std::time::Duration;

use autodm_core::AutodmError;
use autodm_core::types::{format_timestamp, now_timestamp};
use chrono::Utc;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Set the mark for `key` unless a live one exists. Returns whether this call set it.
///
/// A single upsert: a fresh key inserts, an expired key is overwritten, a live
/// key is left untouched and reports zero changed rows.
pub async fn claim(db: &Database, key: &str, ttl: Duration) -> Result<bool, AutodmError> {
    let key = key.to_string();
    let now = now_timestamp();
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| AutodmError::Internal(e.to_string()))?;
    let expires_at = format_timestamp(Utc::now() + ttl);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "INSERT INTO dedup_keys (key, expires_at) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET expires_at = excluded.expires_at
                 WHERE dedup_keys.expires_at <= ?3",
                params![key, expires_at, now],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Drop the marker for `key`, live or not.
pub async fn forget(db: &Database, key: &str) -> Result<(), AutodmError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute("DELETE FROM dedup_keys WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Drop expired markers. Returns the number removed.
pub async fn purge_expired(db: &Database) -> Result<usize, AutodmError> {
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute("DELETE FROM dedup_keys WHERE expires_at <= ?1", params![now])
        })
        .await
        .map_err(map_tr_err)
}
