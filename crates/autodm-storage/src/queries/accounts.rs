// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account mirror operations.

use autodm_core::AutodmError;
use autodm_core::types::Account;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};

const ACCOUNT_COLUMNS: &str = "id, external_id, username, access_token, owner_id, is_active";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        external_id: row.get(1)?,
        username: row.get(2)?,
        access_token: row.get(3)?,
        owner_id: row.get(4)?,
        is_active: row.get(5)?,
    })
}

/// Insert or replace an account, keyed by its internal id.
pub async fn upsert_account(db: &Database, account: &Account) -> Result<(), AutodmError> {
    let account = account.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO accounts (id, external_id, username, access_token, owner_id, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    external_id = excluded.external_id,
                    username = excluded.username,
                    access_token = excluded.access_token,
                    owner_id = excluded.owner_id,
                    is_active = excluded.is_active",
                params![
                    account.id,
                    account.external_id,
                    account.username,
                    account.access_token,
                    account.owner_id,
                    account.is_active,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_account(db: &Database, id: &str) -> Result<Option<Account>, AutodmError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Account>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id],
                account_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Look up an account by platform id, regardless of its active flag.
pub async fn get_account_by_external_id(
    db: &Database,
    external_id: &str,
) -> Result<Option<Account>, AutodmError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Account>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE external_id = ?1"),
                params![external_id],
                account_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
