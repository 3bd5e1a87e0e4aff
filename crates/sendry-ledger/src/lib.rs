// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic, auditable credit ledger for the Sendry messaging core.
//!
//! Usage is metered against a prepaid balance derived from an append-only
//! entry table. Both the scheduled task engine and the moderation engine
//! debit through this crate before dispatching, and refund through it when
//! a billed send fails.

pub mod ledger;

pub use ledger::{CreditLedger, DailyUsage, EntryKind, LedgerEntry};
