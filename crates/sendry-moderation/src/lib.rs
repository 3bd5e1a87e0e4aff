// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound group moderation.
//!
//! The [`ModerationEngine`] inspects inbound group messages against the
//! destination's policy (link blocking and banned terms), deletes offending
//! messages, escalates per-offender warning counts, and removes repeat
//! offenders once the configured threshold is reached. Every enforced
//! incident costs the account one credit; the credit is refunded when the
//! enforcement sends fail.

mod classify;
mod engine;
mod template;

pub use classify::{classify, Violation};
pub use engine::ModerationEngine;
pub use template::render;
