// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row models for the persisted Sendry entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use sendry_core::types::{AccountId, ChannelId, DestinationId, MediaKind, ParticipantId};

/// Timestamp column format. Lexicographic order equals chronological order,
/// so plain string comparison works in SQL.
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp for a TEXT column.
pub fn fmt_ts(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

/// Parse a TEXT column timestamp.
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

/// A tenant account bound to one transport channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Reference to the owning user in the excluded API layer.
    pub owner: String,
    pub channel_id: ChannelId,
    /// Unlimited accounts bypass the balance check on debit.
    pub unlimited: bool,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    /// Transient: exclusively owned by one execution attempt.
    Claimed,
    Completed,
    Failed,
}

/// Recurrence of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
}

/// Product surface a scheduled task belongs to.
///
/// Both categories run through the same engine; the category only selects
/// the strategy profile (labels, debit descriptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    /// Scheduled group broadcasts created by the owner.
    Engagement,
    /// Automated group animation content.
    Animation,
}

/// A persisted scheduled task (one possibly recurring outbound message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub account_id: AccountId,
    pub destination_id: DestinationId,
    pub category: TaskCategory,
    /// Text body, or media caption when media is present.
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub scheduled_at: DateTime<Utc>,
    pub recurrence: Recurrence,
    pub status: TaskStatus,
    pub error_message: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a scheduled task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub account_id: AccountId,
    pub destination_id: DestinationId,
    pub category: TaskCategory,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub scheduled_at: DateTime<Utc>,
    pub recurrence: Recurrence,
}

/// Partial update of a pending task. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
}

/// Filter for querying task history.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub account_id: Option<AccountId>,
    pub destination_id: Option<DestinationId>,
    pub status: Option<TaskStatus>,
}

/// Per-destination moderation policy, read-only to the moderation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationPolicy {
    pub account_id: AccountId,
    pub destination_id: DestinationId,
    pub enabled: bool,
    pub anti_link: bool,
    /// Case-insensitive banned terms (stored comma-separated).
    pub banned_terms: Vec<String>,
    /// Warning template; falls back to the configured default when absent.
    pub warning_template: Option<String>,
    pub max_warnings: u32,
    /// Days after which a stale warning count resets; 0 disables the reset.
    pub warning_reset_days: u32,
    pub welcome_enabled: bool,
    pub welcome_template: Option<String>,
}

/// Per-offender warning counter within a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningRecord {
    pub account_id: AccountId,
    pub destination_id: DestinationId,
    pub offender_id: ParticipantId,
    pub count: u32,
    pub last_warning_at: DateTime<Utc>,
}
