// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The narrow Transport capability consumed by the Sendry core.
//!
//! The underlying chat protocol (handshake, encryption, pairing) is an
//! external collaborator; the core only ever talks to it through this trait.

use async_trait::async_trait;

use crate::error::SendryError;
use crate::types::{
    ChannelId, DestinationId, MessagePayload, MessageRef, ParticipantId, PresenceState, Roster,
    SendReceipt,
};

/// Capability boundary to the chat transport.
///
/// One live connection per channel; `is_connected` reflects the channel's
/// current connectivity and gates every dispatching component.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a payload to a destination on the given channel.
    async fn send(
        &self,
        channel: &ChannelId,
        destination: &DestinationId,
        payload: &MessagePayload,
    ) -> Result<SendReceipt, SendryError>;

    /// Emit a presence signal (typing simulation) toward a destination.
    async fn set_presence(
        &self,
        channel: &ChannelId,
        destination: &DestinationId,
        state: PresenceState,
    ) -> Result<(), SendryError>;

    /// Delete a previously delivered message.
    async fn delete_message(
        &self,
        channel: &ChannelId,
        target: &MessageRef,
    ) -> Result<(), SendryError>;

    /// Fetch the roster (subject, description, participants with roles) of a
    /// destination.
    async fn fetch_roster(
        &self,
        channel: &ChannelId,
        destination: &DestinationId,
    ) -> Result<Roster, SendryError>;

    /// Remove a participant from a group destination.
    async fn remove_participant(
        &self,
        channel: &ChannelId,
        destination: &DestinationId,
        participant: &ParticipantId,
    ) -> Result<(), SendryError>;

    /// Whether the channel currently holds a live connection.
    fn is_connected(&self, channel: &ChannelId) -> bool;
}
