// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation of cross-field constraints.

use crate::model::SendryConfig;

/// Validate constraints that serde defaults cannot express.
///
/// Returns a list of human-readable problems; empty means valid.
pub fn validate_config(config: &SendryConfig) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if config.queue.min_delay_ms > config.queue.max_delay_ms {
        problems.push(format!(
            "queue.min_delay_ms ({}) must not exceed queue.max_delay_ms ({})",
            config.queue.min_delay_ms, config.queue.max_delay_ms
        ));
    }

    if config.queue.typing_min_ms > config.queue.typing_max_ms {
        problems.push(format!(
            "queue.typing_min_ms ({}) must not exceed queue.typing_max_ms ({})",
            config.queue.typing_min_ms, config.queue.typing_max_ms
        ));
    }

    if config.queue.send_timeout_secs == 0 {
        problems.push("queue.send_timeout_secs must be at least 1".to_string());
    }

    if config.scheduler.poll_interval_secs == 0 {
        problems.push("scheduler.poll_interval_secs must be at least 1".to_string());
    }

    if config.moderation.max_warnings == 0 {
        problems.push("moderation.max_warnings must be at least 1".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}
