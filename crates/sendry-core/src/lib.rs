// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sendry messaging framework.
//!
//! This crate provides the shared id and payload types, the error type, and
//! the `Transport` trait boundary used throughout the Sendry workspace. It
//! carries no business logic of its own.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SendryError;
pub use traits::Transport;
pub use types::{
    AccountId, ChannelId, ConnectivityState, DestinationId, InboundMessage, MediaKind, MessageId,
    MessagePayload, MessageRef, Participant, ParticipantId, ParticipantRole, PresenceState,
    Priority, Roster, SendReceipt,
};
