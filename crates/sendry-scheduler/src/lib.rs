// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recurring, credit-gated scheduled messaging.
//!
//! The [`ScheduledTaskEngine`] polls the task table on a fixed interval,
//! claims everything that is due in a single atomic statement, and executes
//! each claimed task independently: debit one credit, enqueue the message
//! through the delivery queue, then complete or reschedule on success and
//! refund on failure.

mod engine;
mod profile;

pub use engine::ScheduledTaskEngine;
pub use profile::{profile_for, CategoryProfile};
