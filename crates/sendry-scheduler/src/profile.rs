// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Category profiles.
//!
//! Engagement broadcasts and animation posts run through the same engine;
//! the profile only contributes the wording that differs between them.

use sendry_storage::{ScheduledTask, TaskCategory};

/// Category-specific wording used by the engine.
pub trait CategoryProfile: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    /// Ledger description for the credit consumed by one execution.
    fn debit_description(&self, task: &ScheduledTask) -> String;
}

struct EngagementProfile;

impl CategoryProfile for EngagementProfile {
    fn label(&self) -> &'static str {
        "engagement"
    }

    fn debit_description(&self, task: &ScheduledTask) -> String {
        format!("scheduled message to {}", task.destination_id)
    }
}

struct AnimationProfile;

impl CategoryProfile for AnimationProfile {
    fn label(&self) -> &'static str {
        "animation"
    }

    fn debit_description(&self, task: &ScheduledTask) -> String {
        format!("group animation post to {}", task.destination_id)
    }
}

/// Resolve the profile for a task category.
pub fn profile_for(category: TaskCategory) -> &'static dyn CategoryProfile {
    match category {
        TaskCategory::Engagement => &EngagementProfile,
        TaskCategory::Animation => &AnimationProfile,
    }
}
