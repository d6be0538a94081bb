// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact rollup operations.

use autodm_core::AutodmError;
use autodm_core::types::{Contact, now_timestamp};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::json_column;

/// Upsert the (account, user) contact after a successful private send.
///
/// Counters are incremented in SQL; `first_interaction` is kept from the
/// first insert.
pub async fn record_send(
    db: &Database,
    account_id: &str,
    external_user_id: &str,
    username: &str,
    is_follower: bool,
) -> Result<(), AutodmError> {
    let id = uuid::Uuid::new_v4().to_string();
    let account_id = account_id.to_string();
    let user = external_user_id.to_string();
    let username = username.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO contacts (id, account_id, external_user_id, username,
                    total_interactions, total_dms_received, first_interaction,
                    last_interaction, is_follower)
                 VALUES (?1, ?2, ?3, ?4, 1, 1, ?5, ?5, ?6)
                 ON CONFLICT(account_id, external_user_id) DO UPDATE SET
                    username = CASE WHEN excluded.username = '' THEN contacts.username
                                    ELSE excluded.username END,
                    total_interactions = contacts.total_interactions + 1,
                    total_dms_received = contacts.total_dms_received + 1,
                    last_interaction = excluded.last_interaction,
                    is_follower = contacts.is_follower OR excluded.is_follower",
                params![id, account_id, user, username, now, is_follower],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_contact(
    db: &Database,
    account_id: &str,
    external_user_id: &str,
) -> Result<Option<Contact>, AutodmError> {
    let account_id = account_id.to_string();
    let user = external_user_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Contact>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, account_id, external_user_id, username, full_name,
                        total_interactions, total_dms_received, first_interaction,
                        last_interaction, is_follower, tags
                 FROM contacts WHERE account_id = ?1 AND external_user_id = ?2",
                params![account_id, user],
                |row| {
                    Ok(Contact {
                        id: row.get(0)?,
                        account_id: row.get(1)?,
                        external_user_id: row.get(2)?,
                        username: row.get(3)?,
                        full_name: row.get(4)?,
                        total_interactions: row.get(5)?,
                        total_dms_received: row.get(6)?,
                        first_interaction: row.get(7)?,
                        last_interaction: row.get(8)?,
                        is_follower: row.get(9)?,
                        tags: json_column(row, 10)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
