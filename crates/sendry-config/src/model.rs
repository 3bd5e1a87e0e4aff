// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Sendry messaging core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Sendry configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SendryConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Delivery queue pacing settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Scheduled task engine settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Moderation engine defaults.
    #[serde(default)]
    pub moderation: ModerationConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "sendry".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode (recommended).
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "sendry.db".to_string()
}

fn default_true() -> bool {
    true
}

/// Delivery queue pacing configuration.
///
/// The pacing delay before each send is drawn uniformly from
/// `[min_delay_ms, max_delay_ms]`, plus a congestion bonus of
/// `congestion_step_ms` per queued item, capped at `congestion_cap_ms`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Minimum pacing delay before a send, in milliseconds.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum pacing delay before a send, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Congestion bonus per queued item, in milliseconds.
    #[serde(default = "default_congestion_step_ms")]
    pub congestion_step_ms: u64,

    /// Cap on the total congestion bonus, in milliseconds.
    #[serde(default = "default_congestion_cap_ms")]
    pub congestion_cap_ms: u64,

    /// Simulated typing speed, in milliseconds per character.
    #[serde(default = "default_typing_ms_per_char")]
    pub typing_ms_per_char: u64,

    /// Lower bound on the typing simulation hold, in milliseconds.
    #[serde(default = "default_typing_min_ms")]
    pub typing_min_ms: u64,

    /// Upper bound on the typing simulation hold, in milliseconds.
    #[serde(default = "default_typing_max_ms")]
    pub typing_max_ms: u64,

    /// Hard timeout on a single transport send, in seconds.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            congestion_step_ms: default_congestion_step_ms(),
            congestion_cap_ms: default_congestion_cap_ms(),
            typing_ms_per_char: default_typing_ms_per_char(),
            typing_min_ms: default_typing_min_ms(),
            typing_max_ms: default_typing_max_ms(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_min_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_congestion_step_ms() -> u64 {
    500
}

fn default_congestion_cap_ms() -> u64 {
    5_000
}

fn default_typing_ms_per_char() -> u64 {
    50
}

fn default_typing_min_ms() -> u64 {
    1_000
}

fn default_typing_max_ms() -> u64 {
    10_000
}

fn default_send_timeout_secs() -> u64 {
    30
}

/// Scheduled task engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Polling interval for due tasks, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Grace delay before the first poll after startup, in seconds.
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            startup_delay_secs: default_startup_delay_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_startup_delay_secs() -> u64 {
    5
}

/// Moderation engine defaults, applied when a policy omits a field.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationConfig {
    /// Default warning message template.
    #[serde(default = "default_warning_template")]
    pub warning_template: String,

    /// Default number of warnings before removal.
    #[serde(default = "default_max_warnings")]
    pub max_warnings: u32,

    /// Roster cache time-to-live, in seconds.
    #[serde(default = "default_roster_cache_ttl_secs")]
    pub roster_cache_ttl_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            warning_template: default_warning_template(),
            max_warnings: default_max_warnings(),
            roster_cache_ttl_secs: default_roster_cache_ttl_secs(),
        }
    }
}

fn default_warning_template() -> String {
    "Attention @{{name}}, warning {{count}}/{{max}} for: {{reason}}.".to_string()
}

fn default_max_warnings() -> u32 {
    5
}

fn default_roster_cache_ttl_secs() -> u64 {
    600
}
