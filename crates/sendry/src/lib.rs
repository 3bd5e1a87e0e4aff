// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sendry: a multi-tenant messaging core.
//!
//! Wires the component crates together behind one [`Service`]: SQLite
//! storage, the credit ledger, the paced delivery queue, the scheduled task
//! engine, and the moderation engine. The chat protocol itself is an
//! external collaborator injected through [`sendry_core::Transport`]; the
//! outer API surface (HTTP, auth, billing) lives outside this crate and
//! drives the engines through the handles the service exposes.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sendry::Service;
//!
//! # async fn run(transport: Arc<dyn sendry_core::Transport>) -> Result<(), sendry_core::SendryError> {
//! let config = sendry_config::load_and_validate()
//!     .map_err(|errs| sendry_core::SendryError::Config(errs.join("; ")))?;
//! sendry::init_tracing(&config.service.log_level);
//!
//! let service = Service::start(config, transport).await?;
//! service.scheduler(); // drive from the API layer
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod service;

pub use service::Service;

pub use sendry_config as config;
pub use sendry_core as core;
pub use sendry_ledger as ledger;
pub use sendry_moderation as moderation;
pub use sendry_queue as queue;
pub use sendry_scheduler as scheduler;
pub use sendry_storage as storage;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level, matching the usual
/// env-filter convention.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
