// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-paced outbound delivery.
//!
//! Every message leaving a channel goes through a [`DeliveryQueue`], which
//! serializes dispatch per channel, inserts randomized inter-message delays,
//! simulates a typing indicator for text content, and bounds each transport
//! call with a timeout. Callers receive a [`SendHandle`] that resolves once
//! the message has actually been handed to the transport.

mod queue;

pub use queue::{DeliveryQueue, EnqueueOptions, QueueStats, SendHandle};
