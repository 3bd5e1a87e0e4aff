// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scheduled task engine.
//!
//! One engine instance serves every account. A poll cycle claims all due
//! pending tasks atomically (status flips to `claimed` in the same statement
//! that selects them), then executes each task on its own spawned task so a
//! slow delivery never stalls the poll loop. Billing is
//! debit-then-compensate: the credit is taken before enqueueing and refunded
//! if the send fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sendry_config::SchedulerConfig;
use sendry_core::{AccountId, DestinationId, MessagePayload, SendryError, Transport};
use sendry_ledger::{CreditLedger, EntryKind};
use sendry_queue::{DeliveryQueue, EnqueueOptions};
use sendry_storage::queries::{accounts, tasks};
use sendry_storage::{
    Database, NewTask, Recurrence, ScheduledTask, TaskFilter, TaskUpdate,
};

use crate::profile::profile_for;

/// Engine that executes due scheduled tasks and manages their lifecycle.
pub struct ScheduledTaskEngine {
    db: Arc<Database>,
    ledger: Arc<CreditLedger>,
    queue: DeliveryQueue,
    transport: Arc<dyn Transport>,
    config: SchedulerConfig,
}

impl ScheduledTaskEngine {
    pub fn new(
        db: Arc<Database>,
        ledger: Arc<CreditLedger>,
        queue: DeliveryQueue,
        transport: Arc<dyn Transport>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            db,
            ledger,
            queue,
            transport,
            config,
        }
    }

    /// Create a task. Rejects tasks with neither text nor media.
    pub async fn schedule_task(&self, task: NewTask) -> Result<String, SendryError> {
        let has_body = task.body.as_deref().is_some_and(|b| !b.trim().is_empty());
        if !has_body && task.media_url.is_none() {
            return Err(SendryError::InvalidState(
                "task needs text or media content".into(),
            ));
        }
        let id = tasks::insert_task(&self.db, &task).await?;
        info!(
            task = %id,
            account = %task.account_id,
            destination = %task.destination_id,
            category = %task.category,
            scheduled_at = %task.scheduled_at,
            "task scheduled"
        );
        Ok(id)
    }

    /// Update a task that has not started executing. Fails with
    /// [`SendryError::InvalidState`] once the task left the pending state.
    pub async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<(), SendryError> {
        tasks::update_pending(&self.db, id, &update, Utc::now()).await
    }

    /// Delete a task regardless of state. Returns whether a row existed.
    pub async fn delete_task(&self, id: &str) -> Result<bool, SendryError> {
        tasks::delete_task(&self.db, id).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>, SendryError> {
        tasks::get_task(&self.db, id).await
    }

    /// Tasks of one account and destination, newest first.
    pub async fn list_tasks(
        &self,
        account: &AccountId,
        destination: &DestinationId,
    ) -> Result<Vec<ScheduledTask>, SendryError> {
        tasks::list_tasks(&self.db, account, destination).await
    }

    /// Execution history across accounts, filtered.
    pub async fn task_history(&self, filter: &TaskFilter) -> Result<Vec<ScheduledTask>, SendryError> {
        tasks::task_history(&self.db, filter).await
    }

    /// Poll loop. Waits out the startup delay, then claims and executes due
    /// tasks every `poll_interval_secs` until the token is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let startup = Duration::from_secs(self.config.startup_delay_secs);
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(startup) => {}
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.config.poll_interval_secs, "scheduler running");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.run_cycle().await {
                        error!(error = %err, "scheduler cycle failed");
                    }
                }
            }
        }
    }

    /// One poll cycle: claim everything due, spawn one execution per task.
    /// Returns the number of tasks claimed.
    pub async fn run_cycle(self: &Arc<Self>) -> Result<usize, SendryError> {
        let due = tasks::claim_due(&self.db, Utc::now()).await?;
        let claimed = due.len();
        if claimed > 0 {
            debug!(claimed, "claimed due tasks");
        }
        for task in due {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                let id = task.id.clone();
                if let Err(err) = engine.execute(task).await {
                    error!(task = %id, error = %err, "task execution failed");
                }
            });
        }
        Ok(claimed)
    }

    /// Execute one claimed task through its full lifecycle.
    async fn execute(&self, task: ScheduledTask) -> Result<(), SendryError> {
        let profile = profile_for(task.category);

        let Some(account) = accounts::get_account(&self.db, &task.account_id).await? else {
            tasks::fail_task(&self.db, &task.id, "account not found", Utc::now()).await?;
            return Ok(());
        };
        let channel = account.channel_id;

        if !self.transport.is_connected(&channel) {
            // Nothing was billed; the task goes back to pending for a later
            // cycle.
            tasks::release_task(&self.db, &task.id, Utc::now()).await?;
            debug!(task = %task.id, channel = %channel, "channel offline, task released");
            return Ok(());
        }

        let payload = match build_payload(&task) {
            Ok(payload) => payload,
            Err(reason) => {
                tasks::fail_task(&self.db, &task.id, &reason, Utc::now()).await?;
                return Ok(());
            }
        };

        let debit_reason = profile.debit_description(&task);
        if !self.ledger.debit(&task.account_id, 1, &debit_reason).await? {
            warn!(task = %task.id, account = %task.account_id, "insufficient credit");
            tasks::fail_task(&self.db, &task.id, "insufficient credit", Utc::now()).await?;
            return Ok(());
        }

        let handle = self
            .queue
            .enqueue(
                &channel,
                task.destination_id.clone(),
                payload,
                EnqueueOptions::default(),
            )
            .await;

        match handle.wait().await {
            Ok(receipt) => {
                info!(
                    task = %task.id,
                    kind = profile.label(),
                    message = %receipt.message_id,
                    "task delivered"
                );
                match next_occurrence(&task) {
                    Some(next) => tasks::reschedule_task(&self.db, &task.id, next, Utc::now()).await?,
                    None => tasks::complete_task(&self.db, &task.id, Utc::now()).await?,
                }
            }
            Err(err) => {
                self.ledger
                    .credit(
                        &task.account_id,
                        1,
                        EntryKind::Credit,
                        &format!("refund: {debit_reason}"),
                    )
                    .await?;
                if err.is_disconnect() {
                    tasks::release_task(&self.db, &task.id, Utc::now()).await?;
                } else {
                    tasks::fail_task(&self.db, &task.id, &err.to_string(), Utc::now()).await?;
                }
                warn!(task = %task.id, error = %err, "task delivery failed, credit refunded");
            }
        }
        Ok(())
    }
}

/// Next run slot, derived from the task's own schedule rather than the
/// execution time so recurring tasks do not drift.
fn next_occurrence(task: &ScheduledTask) -> Option<DateTime<Utc>> {
    match task.recurrence {
        Recurrence::None => None,
        Recurrence::Daily => Some(task.scheduled_at + chrono::Duration::days(1)),
        Recurrence::Weekly => Some(task.scheduled_at + chrono::Duration::weeks(1)),
    }
}

/// Build the outbound payload for a task.
fn build_payload(task: &ScheduledTask) -> Result<MessagePayload, String> {
    let body = task.body.as_deref().unwrap_or("").trim();
    match (&task.media_url, task.media_kind) {
        (Some(url), Some(kind)) => Ok(MessagePayload::Media {
            kind,
            url: url.clone(),
            caption: (!body.is_empty()).then(|| body.to_string()),
        }),
        // A bare URL without a declared kind travels as text, appended to
        // the body unless it is already part of it.
        (Some(url), None) => {
            if body.is_empty() {
                Ok(MessagePayload::text(url.clone()))
            } else if body.contains(url.as_str()) {
                Ok(MessagePayload::text(body))
            } else {
                Ok(MessagePayload::text(format!("{body}\n\n{url}")))
            }
        }
        (None, _) => {
            if body.is_empty() {
                Err("task has no content".into())
            } else {
                Ok(MessagePayload::text(body))
            }
        }
    }
}
