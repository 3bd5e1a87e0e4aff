// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moderation policy and warning record queries.

use chrono::{DateTime, Utc};

use sendry_core::SendryError;
use sendry_core::types::{AccountId, DestinationId, ParticipantId};

use super::invalid_text;
use crate::database::{Database, map_tr_err};
use crate::models::{ModerationPolicy, WarningRecord, fmt_ts, parse_ts};

fn split_terms(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn policy_from_row(row: &rusqlite::Row<'_>) -> Result<ModerationPolicy, rusqlite::Error> {
    let banned_terms: String = row.get(4)?;
    Ok(ModerationPolicy {
        account_id: AccountId(row.get(0)?),
        destination_id: DestinationId(row.get(1)?),
        enabled: row.get::<_, i64>(2)? != 0,
        anti_link: row.get::<_, i64>(3)? != 0,
        banned_terms: split_terms(&banned_terms),
        warning_template: row.get(5)?,
        max_warnings: row.get::<_, i64>(6)? as u32,
        warning_reset_days: row.get::<_, i64>(7)? as u32,
        welcome_enabled: row.get::<_, i64>(8)? != 0,
        welcome_template: row.get(9)?,
    })
}

/// Insert or update the policy for one (account, destination).
pub async fn upsert_policy(db: &Database, policy: &ModerationPolicy) -> Result<(), SendryError> {
    let account_id = policy.account_id.0.clone();
    let destination_id = policy.destination_id.0.clone();
    let enabled = policy.enabled as i64;
    let anti_link = policy.anti_link as i64;
    let banned_terms = policy.banned_terms.join(",");
    let warning_template = policy.warning_template.clone();
    let max_warnings = policy.max_warnings as i64;
    let warning_reset_days = policy.warning_reset_days as i64;
    let welcome_enabled = policy.welcome_enabled as i64;
    let welcome_template = policy.welcome_template.clone();
    let now = fmt_ts(Utc::now());

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO moderation_policies \
                 (account_id, destination_id, enabled, anti_link, banned_terms, \
                  warning_template, max_warnings, warning_reset_days, welcome_enabled, \
                  welcome_template, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                 ON CONFLICT(account_id, destination_id) DO UPDATE SET \
                 enabled = excluded.enabled, \
                 anti_link = excluded.anti_link, \
                 banned_terms = excluded.banned_terms, \
                 warning_template = excluded.warning_template, \
                 max_warnings = excluded.max_warnings, \
                 warning_reset_days = excluded.warning_reset_days, \
                 welcome_enabled = excluded.welcome_enabled, \
                 welcome_template = excluded.welcome_template, \
                 updated_at = excluded.updated_at",
                rusqlite::params![
                    account_id,
                    destination_id,
                    enabled,
                    anti_link,
                    banned_terms,
                    warning_template,
                    max_warnings,
                    warning_reset_days,
                    welcome_enabled,
                    welcome_template,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the policy for one (account, destination).
pub async fn get_policy(
    db: &Database,
    account: &AccountId,
    destination: &DestinationId,
) -> Result<Option<ModerationPolicy>, SendryError> {
    let account = account.0.clone();
    let destination = destination.0.clone();
    db.connection()
        .call(move |conn| -> Result<Option<ModerationPolicy>, rusqlite::Error> {
            conn.query_row(
                "SELECT account_id, destination_id, enabled, anti_link, banned_terms, \
                 warning_template, max_warnings, warning_reset_days, welcome_enabled, \
                 welcome_template \
                 FROM moderation_policies WHERE account_id = ?1 AND destination_id = ?2",
                rusqlite::params![account, destination],
                policy_from_row,
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

/// Increment the offender's warning count and return the new value.
///
/// When `reset_days` is non-zero and the previous warning is older than the
/// window, the count restarts from 1. Reset check, upsert, and count read
/// happen in one connection call, so concurrent violations serialize.
pub async fn record_warning(
    db: &Database,
    account: &AccountId,
    destination: &DestinationId,
    offender: &ParticipantId,
    reset_days: u32,
    now: DateTime<Utc>,
) -> Result<u32, SendryError> {
    let account = account.0.clone();
    let destination = destination.0.clone();
    let offender = offender.0.clone();
    let now_ts = fmt_ts(now);

    db.connection()
        .call(move |conn| -> Result<u32, rusqlite::Error> {
            if reset_days > 0 {
                let last: Option<String> = conn
                    .query_row(
                        "SELECT last_warning_at FROM warning_records \
                         WHERE account_id = ?1 AND destination_id = ?2 AND offender_id = ?3",
                        rusqlite::params![account, destination, offender],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                if let Some(last) = last {
                    let last = parse_ts(&last).map_err(|e| invalid_text(0, e))?;
                    if (now - last).num_days() >= i64::from(reset_days) {
                        conn.execute(
                            "UPDATE warning_records SET count = 0 \
                             WHERE account_id = ?1 AND destination_id = ?2 AND offender_id = ?3",
                            rusqlite::params![account, destination, offender],
                        )?;
                    }
                }
            }

            let count: i64 = conn.query_row(
                "INSERT INTO warning_records \
                 (account_id, destination_id, offender_id, count, last_warning_at) \
                 VALUES (?1, ?2, ?3, 1, ?4) \
                 ON CONFLICT(account_id, destination_id, offender_id) DO UPDATE SET \
                 count = count + 1, last_warning_at = ?4 \
                 RETURNING count",
                rusqlite::params![account, destination, offender, now_ts],
                |row| row.get(0),
            )?;
            Ok(count as u32)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the warning record for one offender, if any.
pub async fn get_warning(
    db: &Database,
    account: &AccountId,
    destination: &DestinationId,
    offender: &ParticipantId,
) -> Result<Option<WarningRecord>, SendryError> {
    let account = account.0.clone();
    let destination = destination.0.clone();
    let offender = offender.0.clone();
    db.connection()
        .call(move |conn| -> Result<Option<WarningRecord>, rusqlite::Error> {
            conn.query_row(
                "SELECT account_id, destination_id, offender_id, count, last_warning_at \
                 FROM warning_records \
                 WHERE account_id = ?1 AND destination_id = ?2 AND offender_id = ?3",
                rusqlite::params![account, destination, offender],
                |row| {
                    let last_warning_at: String = row.get(4)?;
                    Ok(WarningRecord {
                        account_id: AccountId(row.get(0)?),
                        destination_id: DestinationId(row.get(1)?),
                        offender_id: ParticipantId(row.get(2)?),
                        count: row.get::<_, i64>(3)? as u32,
                        last_warning_at: parse_ts(&last_warning_at)
                            .map_err(|e| invalid_text(4, e))?,
                    })
                },
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Account;
    use crate::queries::accounts::upsert_account;
    use chrono::Duration;
    use sendry_core::types::ChannelId;

    async fn test_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        upsert_account(
            &db,
            &Account {
                id: AccountId::from("acct-1"),
                owner: "owner@example.com".into(),
                channel_id: ChannelId::from("ch-1"),
                unlimited: false,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        db
    }

    fn sample_policy() -> ModerationPolicy {
        ModerationPolicy {
            account_id: AccountId::from("acct-1"),
            destination_id: DestinationId::from("group-1"),
            enabled: true,
            anti_link: true,
            banned_terms: vec!["spam".into(), "scam".into()],
            warning_template: None,
            max_warnings: 3,
            warning_reset_days: 7,
            welcome_enabled: false,
            welcome_template: None,
        }
    }

    #[tokio::test]
    async fn policy_upsert_and_get_round_trip() {
        let db = test_db().await;
        let policy = sample_policy();
        upsert_policy(&db, &policy).await.unwrap();

        let fetched = get_policy(&db, &policy.account_id, &policy.destination_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, policy);

        // Second upsert replaces fields.
        let mut updated = policy.clone();
        updated.enabled = false;
        updated.banned_terms = vec!["spam".into()];
        upsert_policy(&db, &updated).await.unwrap();
        let fetched = get_policy(&db, &policy.account_id, &policy.destination_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!fetched.enabled);
        assert_eq!(fetched.banned_terms, vec!["spam".to_string()]);
    }

    #[tokio::test]
    async fn missing_policy_is_none() {
        let db = test_db().await;
        let found = get_policy(
            &db,
            &AccountId::from("acct-1"),
            &DestinationId::from("nope"),
        )
        .await
        .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn warnings_increment_per_offender() {
        let db = test_db().await;
        let account = AccountId::from("acct-1");
        let dest = DestinationId::from("group-1");
        let offender = ParticipantId::from("bad-actor");
        let now = Utc::now();

        assert_eq!(
            record_warning(&db, &account, &dest, &offender, 0, now)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            record_warning(&db, &account, &dest, &offender, 0, now)
                .await
                .unwrap(),
            2
        );

        // A different offender starts from 1.
        let other = ParticipantId::from("other-actor");
        assert_eq!(
            record_warning(&db, &account, &dest, &other, 0, now)
                .await
                .unwrap(),
            1
        );

        let record = get_warning(&db, &account, &dest, &offender)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.count, 2);
    }

    #[tokio::test]
    async fn stale_warnings_reset_before_increment() {
        let db = test_db().await;
        let account = AccountId::from("acct-1");
        let dest = DestinationId::from("group-1");
        let offender = ParticipantId::from("bad-actor");

        let long_ago = Utc::now() - Duration::days(30);
        record_warning(&db, &account, &dest, &offender, 7, long_ago)
            .await
            .unwrap();
        record_warning(&db, &account, &dest, &offender, 7, long_ago)
            .await
            .unwrap();

        // 30 days later with a 7-day window: count restarts at 1.
        let count = record_warning(&db, &account, &dest, &offender, 7, Utc::now())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn recent_warnings_do_not_reset() {
        let db = test_db().await;
        let account = AccountId::from("acct-1");
        let dest = DestinationId::from("group-1");
        let offender = ParticipantId::from("bad-actor");
        let now = Utc::now();

        record_warning(&db, &account, &dest, &offender, 7, now - Duration::days(2))
            .await
            .unwrap();
        let count = record_warning(&db, &account, &dest, &offender, 7, now)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
