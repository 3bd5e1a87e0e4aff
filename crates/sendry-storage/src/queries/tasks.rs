// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled task queries.
//!
//! The `pending -> claimed` transition is a single `UPDATE … RETURNING`
//! statement, so selection and claiming are one atomic operation: a second
//! concurrent poll cycle can never pick up the same rows.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use sendry_core::SendryError;
use sendry_core::types::{AccountId, DestinationId, MediaKind};

use super::invalid_text;
use crate::database::{Database, map_tr_err};
use crate::models::{
    NewTask, Recurrence, ScheduledTask, TaskCategory, TaskFilter, TaskStatus, TaskUpdate, fmt_ts,
    parse_ts,
};

const TASK_COLUMNS: &str = "id, account_id, destination_id, category, body, media_url, \
                            media_kind, scheduled_at, recurrence, status, error_message, \
                            last_run_at, created_at, updated_at";

fn task_from_row(row: &rusqlite::Row<'_>) -> Result<ScheduledTask, rusqlite::Error> {
    let category: String = row.get(3)?;
    let media_kind: Option<String> = row.get(6)?;
    let scheduled_at: String = row.get(7)?;
    let recurrence: String = row.get(8)?;
    let status: String = row.get(9)?;
    let last_run_at: Option<String> = row.get(11)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(ScheduledTask {
        id: row.get(0)?,
        account_id: AccountId(row.get(1)?),
        destination_id: DestinationId(row.get(2)?),
        category: TaskCategory::from_str(&category).map_err(|e| invalid_text(3, e))?,
        body: row.get(4)?,
        media_url: row.get(5)?,
        media_kind: media_kind
            .map(|k| MediaKind::from_str(&k).map_err(|e| invalid_text(6, e)))
            .transpose()?,
        scheduled_at: parse_ts(&scheduled_at).map_err(|e| invalid_text(7, e))?,
        recurrence: Recurrence::from_str(&recurrence).map_err(|e| invalid_text(8, e))?,
        status: TaskStatus::from_str(&status).map_err(|e| invalid_text(9, e))?,
        error_message: row.get(10)?,
        last_run_at: last_run_at
            .map(|t| parse_ts(&t).map_err(|e| invalid_text(11, e)))
            .transpose()?,
        created_at: parse_ts(&created_at).map_err(|e| invalid_text(12, e))?,
        updated_at: parse_ts(&updated_at).map_err(|e| invalid_text(13, e))?,
    })
}

/// Insert a new pending task; returns the generated task id.
pub async fn insert_task(db: &Database, task: &NewTask) -> Result<String, SendryError> {
    let id = uuid::Uuid::new_v4().to_string();
    let returned = id.clone();
    let account_id = task.account_id.0.clone();
    let destination_id = task.destination_id.0.clone();
    let category = task.category.to_string();
    let body = task.body.clone();
    let media_url = task.media_url.clone();
    let media_kind = task.media_kind.map(|k| k.to_string());
    let scheduled_at = fmt_ts(task.scheduled_at);
    let recurrence = task.recurrence.to_string();

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO scheduled_tasks \
                 (id, account_id, destination_id, category, body, media_url, media_kind, \
                  scheduled_at, recurrence, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending')",
                rusqlite::params![
                    id,
                    account_id,
                    destination_id,
                    category,
                    body,
                    media_url,
                    media_kind,
                    scheduled_at,
                    recurrence,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    Ok(returned)
}

/// Fetch a single task by id.
pub async fn get_task(db: &Database, id: &str) -> Result<Option<ScheduledTask>, SendryError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ScheduledTask>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {TASK_COLUMNS} FROM scheduled_tasks WHERE id = ?1"),
                rusqlite::params![id],
                task_from_row,
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

/// List tasks for one (account, destination), soonest first.
pub async fn list_tasks(
    db: &Database,
    account: &AccountId,
    destination: &DestinationId,
) -> Result<Vec<ScheduledTask>, SendryError> {
    let account = account.0.clone();
    let destination = destination.0.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<ScheduledTask>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM scheduled_tasks \
                 WHERE account_id = ?1 AND destination_id = ?2 \
                 ORDER BY scheduled_at ASC"
            ))?;
            let rows = stmt.query_map(rusqlite::params![account, destination], task_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Query task history with optional filters, most recently touched first.
pub async fn task_history(
    db: &Database,
    filter: &TaskFilter,
) -> Result<Vec<ScheduledTask>, SendryError> {
    let mut sql = format!("SELECT {TASK_COLUMNS} FROM scheduled_tasks WHERE 1=1");
    let mut params: Vec<String> = Vec::new();

    if let Some(account) = &filter.account_id {
        sql.push_str(" AND account_id = ?");
        params.push(account.0.clone());
    }
    if let Some(destination) = &filter.destination_id {
        sql.push_str(" AND destination_id = ?");
        params.push(destination.0.clone());
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        params.push(status.to_string());
    }
    sql.push_str(" ORDER BY updated_at DESC LIMIT 100");

    db.connection()
        .call(move |conn| -> Result<Vec<ScheduledTask>, rusqlite::Error> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(params.iter()),
                task_from_row,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically claim every pending task due at or before `now`.
///
/// The returned rows are already in `claimed` state; the caller owns them
/// exclusively until it finalizes or releases each one.
pub async fn claim_due(db: &Database, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>, SendryError> {
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| -> Result<Vec<ScheduledTask>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "UPDATE scheduled_tasks SET status = 'claimed', updated_at = ?1 \
                 WHERE status = 'pending' AND scheduled_at <= ?1 \
                 RETURNING {TASK_COLUMNS}"
            ))?;
            let rows = stmt.query_map(rusqlite::params![now], task_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Revert a claimed task to pending (connectivity loss, nothing billed).
pub async fn release_task(db: &Database, id: &str, now: DateTime<Utc>) -> Result<(), SendryError> {
    let id = id.to_string();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE scheduled_tasks SET status = 'pending', updated_at = ?2 \
                 WHERE id = ?1 AND status = 'claimed'",
                rusqlite::params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a one-shot task completed.
pub async fn complete_task(db: &Database, id: &str, now: DateTime<Utc>) -> Result<(), SendryError> {
    let id = id.to_string();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE scheduled_tasks SET status = 'completed', error_message = NULL, \
                 last_run_at = ?2, updated_at = ?2 WHERE id = ?1",
                rusqlite::params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Put a recurring task back to pending at its next occurrence.
pub async fn reschedule_task(
    db: &Database,
    id: &str,
    next: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), SendryError> {
    let id = id.to_string();
    let next = fmt_ts(next);
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE scheduled_tasks SET status = 'pending', scheduled_at = ?2, \
                 error_message = NULL, last_run_at = ?3, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, next, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a terminal failure with its error message.
pub async fn fail_task(
    db: &Database,
    id: &str,
    error: &str,
    now: DateTime<Utc>,
) -> Result<(), SendryError> {
    let id = id.to_string();
    let error = error.to_string();
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE scheduled_tasks SET status = 'failed', error_message = ?2, \
                 updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, error, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

enum UpdateOutcome {
    Updated,
    WrongState(String),
    NotFound,
}

/// Apply a partial update, allowed only while the task is still pending.
///
/// Returns `InvalidState` when the task is missing or has already left the
/// `pending` state.
pub async fn update_pending(
    db: &Database,
    id: &str,
    update: &TaskUpdate,
    now: DateTime<Utc>,
) -> Result<(), SendryError> {
    let task_id = id.to_string();
    let closure_id = task_id.clone();
    let body = update.body.clone();
    let media_url = update.media_url.clone();
    let media_kind = update.media_kind.map(|k| k.to_string());
    let scheduled_at = update.scheduled_at.map(fmt_ts);
    let recurrence = update.recurrence.map(|r| r.to_string());
    let now = fmt_ts(now);

    let outcome = db
        .connection()
        .call(move |conn| -> Result<UpdateOutcome, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE scheduled_tasks SET \
                 body = COALESCE(?2, body), \
                 media_url = COALESCE(?3, media_url), \
                 media_kind = COALESCE(?4, media_kind), \
                 scheduled_at = COALESCE(?5, scheduled_at), \
                 recurrence = COALESCE(?6, recurrence), \
                 updated_at = ?7 \
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![
                    closure_id,
                    body,
                    media_url,
                    media_kind,
                    scheduled_at,
                    recurrence,
                    now
                ],
            )?;
            if changed > 0 {
                return Ok(UpdateOutcome::Updated);
            }
            conn.query_row(
                "SELECT status FROM scheduled_tasks WHERE id = ?1",
                rusqlite::params![closure_id],
                |row| row.get::<_, String>(0),
            )
            .map(UpdateOutcome::WrongState)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(UpdateOutcome::NotFound),
                other => Err(other),
            })
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        UpdateOutcome::Updated => Ok(()),
        UpdateOutcome::WrongState(status) => Err(SendryError::InvalidState(format!(
            "task {task_id} is {status}, not pending"
        ))),
        UpdateOutcome::NotFound => Err(SendryError::InvalidState(format!(
            "task {task_id} not found"
        ))),
    }
}

/// Delete a task; returns whether a row was removed.
pub async fn delete_task(db: &Database, id: &str) -> Result<bool, SendryError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM scheduled_tasks WHERE id = ?1",
                rusqlite::params![id],
            )
        })
        .await
        .map(|n| n > 0)
        .map_err(map_tr_err)
}
