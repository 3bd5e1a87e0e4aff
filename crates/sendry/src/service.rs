// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service assembly and lifecycle.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sendry_config::SendryConfig;
use sendry_core::{SendryError, Transport};
use sendry_ledger::CreditLedger;
use sendry_moderation::ModerationEngine;
use sendry_queue::DeliveryQueue;
use sendry_scheduler::ScheduledTaskEngine;
use sendry_storage::Database;

/// A running Sendry instance.
///
/// Owns the database, the shared delivery queue, and the background
/// scheduler loop. All component handles are cheap to clone out for the
/// embedding API layer.
pub struct Service {
    config: SendryConfig,
    db: Arc<Database>,
    ledger: Arc<CreditLedger>,
    queue: DeliveryQueue,
    scheduler: Arc<ScheduledTaskEngine>,
    moderation: Arc<ModerationEngine>,
    shutdown: CancellationToken,
    scheduler_task: JoinHandle<()>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").finish_non_exhaustive()
    }
}

impl Service {
    /// Open storage, build every engine against the given transport, and
    /// start the scheduler loop.
    pub async fn start(
        config: SendryConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SendryError> {
        // Hand-built configs skip the loader, so re-check the cross-field
        // constraints before any component consumes them.
        sendry_config::validation::validate_config(&config)
            .map_err(|errors| SendryError::Config(errors.join("; ")))?;
        let db = Arc::new(
            Database::open(&config.storage.database_path, config.storage.wal_mode).await?,
        );
        let ledger = Arc::new(CreditLedger::new(db.connection().clone()));
        let queue = DeliveryQueue::new(transport.clone(), config.queue.clone());

        let scheduler = Arc::new(ScheduledTaskEngine::new(
            db.clone(),
            ledger.clone(),
            queue.clone(),
            transport.clone(),
            config.scheduler.clone(),
        ));
        let moderation = Arc::new(ModerationEngine::new(
            db.clone(),
            ledger.clone(),
            queue.clone(),
            transport,
            config.moderation.clone(),
        ));

        let shutdown = CancellationToken::new();
        let scheduler_task = tokio::spawn(scheduler.clone().run(shutdown.clone()));

        info!(service = %config.service.name, "sendry started");
        Ok(Self {
            config,
            db,
            ledger,
            queue,
            scheduler,
            moderation,
            shutdown,
            scheduler_task,
        })
    }

    pub fn config(&self) -> &SendryConfig {
        &self.config
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.ledger
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn scheduler(&self) -> &Arc<ScheduledTaskEngine> {
        &self.scheduler
    }

    pub fn moderation(&self) -> &Arc<ModerationEngine> {
        &self.moderation
    }

    /// Stop the scheduler loop, checkpoint the database, and tear down.
    pub async fn shutdown(self) -> Result<(), SendryError> {
        self.shutdown.cancel();
        if let Err(err) = self.scheduler_task.await {
            error!(error = %err, "scheduler task did not stop cleanly");
        }
        self.db.close().await?;
        info!("sendry stopped");
        Ok(())
    }
}
