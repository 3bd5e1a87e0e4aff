// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sendry.toml` > `~/.config/sendry/sendry.toml` >
//! `/etc/sendry/sendry.toml` with environment variable overrides via the
//! `SENDRY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SendryConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sendry/sendry.toml` (system-wide)
/// 3. `~/.config/sendry/sendry.toml` (user XDG config)
/// 4. `./sendry.toml` (local directory)
/// 5. `SENDRY_*` environment variables
pub fn load_config() -> Result<SendryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SendryConfig::default()))
        .merge(Toml::file("/etc/sendry/sendry.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sendry/sendry.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sendry.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<SendryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SendryConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SendryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SendryConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `SENDRY_QUEUE_MIN_DELAY_MS`
/// must map to `queue.min_delay_ms`, not `queue.min.delay.ms`.
fn env_provider() -> Env {
    Env::prefixed("SENDRY_").map(|key| {
        // The mapper sees the raw env var name with the prefix stripped but the
        // original casing intact. Example: SENDRY_QUEUE_MIN_DELAY_MS -> "QUEUE_MIN_DELAY_MS"
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("queue_", "queue.", 1)
            .replacen("scheduler_", "scheduler.", 1)
            .replacen("moderation_", "moderation.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_file() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.service.name, "sendry");
        assert_eq!(config.queue.min_delay_ms, 1_000);
        assert_eq!(config.queue.max_delay_ms, 5_000);
        assert_eq!(config.queue.send_timeout_secs, 30);
        assert_eq!(config.scheduler.poll_interval_secs, 60);
        assert_eq!(config.moderation.max_warnings, 5);
        assert!(config.storage.wal_mode);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [queue]
            min_delay_ms = 0
            max_delay_ms = 10
            send_timeout_secs = 2

            [scheduler]
            poll_interval_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.min_delay_ms, 0);
        assert_eq!(config.queue.max_delay_ms, 10);
        assert_eq!(config.queue.send_timeout_secs, 2);
        assert_eq!(config.scheduler.poll_interval_secs, 30);
        // Untouched sections keep their defaults.
        assert_eq!(config.moderation.max_warnings, 5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [queue]
            min_dealy_ms = 100
            "#,
        );
        assert!(result.is_err(), "typo'd key must be rejected");
    }

    #[test]
    fn env_vars_override_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "sendry.toml",
                r#"
                [scheduler]
                poll_interval_secs = 45
                "#,
            )?;
            jail.set_env("SENDRY_SCHEDULER_POLL_INTERVAL_SECS", "15");
            jail.set_env("SENDRY_SERVICE_LOG_LEVEL", "debug");

            let config = load_config().expect("config should load");
            assert_eq!(config.scheduler.poll_interval_secs, 15);
            assert_eq!(config.service.log_level, "debug");
            Ok(())
        });
    }
}
