// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger: atomic, auditable debit/credit against per-account balances.
//!
//! Every operation appends an immutable `ledger_entries` row; the balance is
//! always derived as the sum of entries, never stored as a mutable counter.
//! Debit rows carry negative amounts, so `SUM(amount)` is the balance.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, warn};

use sendry_core::SendryError;
use sendry_core::types::AccountId;
use sendry_storage::database::map_tr_err;
use sendry_storage::models::{fmt_ts, parse_ts};

/// Description used for the one-time signup bonus, also its idempotency key.
const SIGNUP_BONUS_DESC: &str = "signup bonus";

/// Kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Additive adjustment, including compensating refunds.
    Credit,
    /// Consumption; the only kind with a negative amount.
    Debit,
    /// Promotional or signup grant.
    Bonus,
    /// Paid top-up.
    Purchase,
}

/// One immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub account_id: AccountId,
    /// Signed amount; negative for debits.
    pub amount: i64,
    pub kind: EntryKind,
    pub description: String,
    pub created_at: chrono::DateTime<Utc>,
}

/// Daily debit usage, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    /// ISO date (YYYY-MM-DD).
    pub date: String,
    /// Credits consumed that day (positive number).
    pub used: i64,
}

/// Persistent credit ledger backed by SQLite.
///
/// All operations go through the single tokio-rusqlite background thread;
/// `debit` additionally wraps its balance check and append in one SQL
/// transaction, so two concurrent debits can never both pass the check.
pub struct CreditLedger {
    conn: tokio_rusqlite::Connection,
}

impl CreditLedger {
    /// Create a ledger over an existing connection (shared with storage).
    pub fn new(conn: tokio_rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Current balance: sum of all entries, zero for unknown accounts.
    pub async fn balance(&self, account: &AccountId) -> Result<i64, SendryError> {
        let account = account.0.clone();
        self.conn
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE account_id = ?1",
                    rusqlite::params![account],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Attempt to consume `amount` credits.
    ///
    /// Returns `false` (and writes nothing) when the account is missing or
    /// its balance does not cover the amount. Accounts flagged `unlimited`
    /// bypass the balance check but are still audited with a debit row.
    pub async fn debit(
        &self,
        account: &AccountId,
        amount: i64,
        reason: &str,
    ) -> Result<bool, SendryError> {
        if amount <= 0 {
            return Err(SendryError::Internal(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        let account_id = account.0.clone();
        let reason = reason.to_string();
        let reason_db = reason.clone();
        let entry_id = uuid::Uuid::new_v4().to_string();
        let now = fmt_ts(Utc::now());

        let accepted = self
            .conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction()?;

                let unlimited: Option<i64> = tx
                    .query_row(
                        "SELECT unlimited FROM accounts WHERE id = ?1",
                        rusqlite::params![account_id],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                let Some(unlimited) = unlimited else {
                    return Ok(false);
                };

                if unlimited == 0 {
                    let balance: i64 = tx.query_row(
                        "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries \
                         WHERE account_id = ?1",
                        rusqlite::params![account_id],
                        |row| row.get(0),
                    )?;
                    if balance < amount {
                        return Ok(false);
                    }
                }

                tx.execute(
                    "INSERT INTO ledger_entries (id, account_id, amount, kind, description, \
                     created_at) VALUES (?1, ?2, ?3, 'debit', ?4, ?5)",
                    rusqlite::params![entry_id, account_id, -amount, reason_db, now],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)?;

        if accepted {
            info!(account = %account, amount, reason = %reason, "credits debited");
        } else {
            warn!(account = %account, amount, "debit refused: insufficient credit");
        }
        Ok(accepted)
    }

    /// Append an additive entry unconditionally.
    ///
    /// Used for top-ups, bonuses, purchases, and compensating refunds when a
    /// downstream send fails after a debit succeeded.
    pub async fn credit(
        &self,
        account: &AccountId,
        amount: i64,
        kind: EntryKind,
        reason: &str,
    ) -> Result<i64, SendryError> {
        if amount <= 0 {
            return Err(SendryError::Internal(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        if kind == EntryKind::Debit {
            return Err(SendryError::Internal(
                "credit() cannot append a debit entry".to_string(),
            ));
        }
        let account_id = account.0.clone();
        let kind_str = kind.to_string();
        let reason = reason.to_string();
        let reason_db = reason.clone();
        let entry_id = uuid::Uuid::new_v4().to_string();
        let now = fmt_ts(Utc::now());

        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO ledger_entries (id, account_id, amount, kind, description, \
                     created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![entry_id, account_id, amount, kind_str, reason_db, now],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        info!(account = %account, amount, kind = %kind, reason = %reason, "credits added");
        self.balance(account).await
    }

    /// Full audit trail for an account, newest first.
    pub async fn history(&self, account: &AccountId) -> Result<Vec<LedgerEntry>, SendryError> {
        let account = account.0.clone();
        self.conn
            .call(move |conn| -> Result<Vec<LedgerEntry>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, account_id, amount, kind, description, created_at \
                     FROM ledger_entries WHERE account_id = ?1 ORDER BY created_at DESC, id",
                )?;
                let rows = stmt.query_map(rusqlite::params![account], |row| {
                    use std::str::FromStr;
                    let kind: String = row.get(3)?;
                    let created_at: String = row.get(5)?;
                    Ok(LedgerEntry {
                        id: row.get(0)?,
                        account_id: AccountId(row.get(1)?),
                        amount: row.get(2)?,
                        kind: EntryKind::from_str(&kind).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                3,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?,
                        description: row.get(4)?,
                        created_at: parse_ts(&created_at).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                5,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Daily debit totals over the trailing `days` days.
    pub async fn usage_by_day(
        &self,
        account: &AccountId,
        days: u32,
    ) -> Result<Vec<DailyUsage>, SendryError> {
        let account = account.0.clone();
        let cutoff = fmt_ts(Utc::now() - chrono::Duration::days(i64::from(days)));
        self.conn
            .call(move |conn| -> Result<Vec<DailyUsage>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT substr(created_at, 1, 10) AS date, SUM(-amount) AS used \
                     FROM ledger_entries \
                     WHERE account_id = ?1 AND kind = 'debit' AND created_at > ?2 \
                     GROUP BY date ORDER BY date ASC",
                )?;
                let rows = stmt.query_map(rusqlite::params![account, cutoff], |row| {
                    Ok(DailyUsage {
                        date: row.get(0)?,
                        used: row.get(1)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Grant the one-time signup bonus.
    ///
    /// Idempotent: returns `false` without writing when a prior signup bonus
    /// entry exists for the account.
    pub async fn grant_signup_bonus(
        &self,
        account: &AccountId,
        amount: i64,
    ) -> Result<bool, SendryError> {
        let account_id = account.0.clone();
        let already = self
            .conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM ledger_entries \
                     WHERE account_id = ?1 AND kind = 'bonus' AND description = ?2",
                    rusqlite::params![account_id, SIGNUP_BONUS_DESC],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(map_tr_err)?;

        if already {
            info!(account = %account, "signup bonus already granted, skipping");
            return Ok(false);
        }

        self.credit(account, amount, EntryKind::Bonus, SIGNUP_BONUS_DESC)
            .await?;
        Ok(true)
    }
}
