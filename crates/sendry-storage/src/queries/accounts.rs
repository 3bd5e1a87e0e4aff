// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account queries.

use sendry_core::SendryError;
use sendry_core::types::{AccountId, ChannelId};

use super::invalid_text;
use crate::database::{Database, map_tr_err};
use crate::models::{Account, fmt_ts, parse_ts};

fn account_from_row(row: &rusqlite::Row<'_>) -> Result<Account, rusqlite::Error> {
    let created_at: String = row.get(4)?;
    Ok(Account {
        id: AccountId(row.get(0)?),
        owner: row.get(1)?,
        channel_id: ChannelId(row.get(2)?),
        unlimited: row.get::<_, i64>(3)? != 0,
        created_at: parse_ts(&created_at).map_err(|e| invalid_text(4, e))?,
    })
}

/// Insert or replace an account row.
pub async fn upsert_account(db: &Database, account: &Account) -> Result<(), SendryError> {
    let id = account.id.0.clone();
    let owner = account.owner.clone();
    let channel_id = account.channel_id.0.clone();
    let unlimited = account.unlimited as i64;
    let created_at = fmt_ts(account.created_at);

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO accounts (id, owner, channel_id, unlimited, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(id) DO UPDATE SET \
                 owner = excluded.owner, \
                 channel_id = excluded.channel_id, \
                 unlimited = excluded.unlimited",
                rusqlite::params![id, owner, channel_id, unlimited, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch an account by id.
pub async fn get_account(db: &Database, id: &AccountId) -> Result<Option<Account>, SendryError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Option<Account>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, owner, channel_id, unlimited, created_at \
                 FROM accounts WHERE id = ?1",
                rusqlite::params![id],
                account_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the account bound to a channel.
pub async fn get_account_by_channel(
    db: &Database,
    channel: &ChannelId,
) -> Result<Option<Account>, SendryError> {
    let channel = channel.0.clone();
    db.connection()
        .call(move |conn| -> Result<Option<Account>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, owner, channel_id, unlimited, created_at \
                 FROM accounts WHERE channel_id = ?1",
                rusqlite::params![channel],
                account_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an account (cascades to its tasks, ledger, and moderation state).
pub async fn delete_account(db: &Database, id: &AccountId) -> Result<bool, SendryError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute("DELETE FROM accounts WHERE id = ?1", rusqlite::params![id])
        })
        .await
        .map(|n| n > 0)
        .map_err(map_tr_err)
}
