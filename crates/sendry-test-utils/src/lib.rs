// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles shared by the Sendry crates.
//!
//! [`MockTransport`] is an in-memory [`Transport`] that records every call
//! and lets tests script connectivity, failures, and roster contents.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use sendry_core::{
    ChannelId, DestinationId, MessageId, MessagePayload, MessageRef, ParticipantId, PresenceState,
    Roster, SendReceipt, SendryError, Transport,
};

/// One send recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: ChannelId,
    pub destination: DestinationId,
    pub payload: MessagePayload,
}

#[derive(Default)]
struct Scripting {
    send_errors: VecDeque<SendryError>,
    roster_errors: VecDeque<SendryError>,
    remove_errors: VecDeque<SendryError>,
    send_delay: Option<Duration>,
}

/// In-memory transport double.
///
/// Every channel is connected until [`MockTransport::set_connected`] says
/// otherwise. Scripted errors are consumed in FIFO order, one per call.
#[derive(Default)]
pub struct MockTransport {
    connectivity: Mutex<HashMap<ChannelId, bool>>,
    rosters: Mutex<HashMap<(ChannelId, DestinationId), Roster>>,
    scripting: Mutex<Scripting>,
    sent: Mutex<Vec<SentMessage>>,
    presence: Mutex<Vec<(DestinationId, PresenceState)>>,
    deleted: Mutex<Vec<MessageRef>>,
    removed: Mutex<Vec<(DestinationId, ParticipantId)>>,
    next_id: AtomicU64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle connectivity for a channel.
    pub fn set_connected(&self, channel: &ChannelId, connected: bool) {
        self.connectivity
            .lock()
            .unwrap()
            .insert(channel.clone(), connected);
    }

    /// Script a failure for the next `send` call.
    pub fn push_send_error(&self, err: SendryError) {
        self.scripting.lock().unwrap().send_errors.push_back(err);
    }

    /// Script a failure for the next `fetch_roster` call.
    pub fn push_roster_error(&self, err: SendryError) {
        self.scripting.lock().unwrap().roster_errors.push_back(err);
    }

    /// Script a failure for the next `remove_participant` call.
    pub fn push_remove_error(&self, err: SendryError) {
        self.scripting.lock().unwrap().remove_errors.push_back(err);
    }

    /// Make every `send` hold for `delay` before completing.
    pub fn set_send_delay(&self, delay: Duration) {
        self.scripting.lock().unwrap().send_delay = Some(delay);
    }

    /// Install the roster returned by `fetch_roster` for a destination.
    pub fn set_roster(&self, channel: &ChannelId, roster: Roster) {
        self.rosters
            .lock()
            .unwrap()
            .insert((channel.clone(), roster.destination.clone()), roster);
    }

    /// Every send recorded so far, in dispatch order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Presence transitions recorded so far.
    pub fn presence_events(&self) -> Vec<(DestinationId, PresenceState)> {
        self.presence.lock().unwrap().clone()
    }

    /// Message deletions recorded so far.
    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }

    /// Participant removals recorded so far.
    pub fn removed(&self) -> Vec<(DestinationId, ParticipantId)> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        channel: &ChannelId,
        destination: &DestinationId,
        payload: &MessagePayload,
    ) -> Result<SendReceipt, SendryError> {
        let (delay, scripted) = {
            let mut scripting = self.scripting.lock().unwrap();
            (scripting.send_delay, scripting.send_errors.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = scripted {
            return Err(err);
        }
        self.sent.lock().unwrap().push(SentMessage {
            channel: channel.clone(),
            destination: destination.clone(),
            payload: payload.clone(),
        });
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(SendReceipt {
            message_id: MessageId(format!("mock-{n}")),
        })
    }

    async fn set_presence(
        &self,
        _channel: &ChannelId,
        destination: &DestinationId,
        state: PresenceState,
    ) -> Result<(), SendryError> {
        self.presence
            .lock()
            .unwrap()
            .push((destination.clone(), state));
        Ok(())
    }

    async fn delete_message(
        &self,
        _channel: &ChannelId,
        target: &MessageRef,
    ) -> Result<(), SendryError> {
        self.deleted.lock().unwrap().push(target.clone());
        Ok(())
    }

    async fn fetch_roster(
        &self,
        channel: &ChannelId,
        destination: &DestinationId,
    ) -> Result<Roster, SendryError> {
        if let Some(err) = self.scripting.lock().unwrap().roster_errors.pop_front() {
            return Err(err);
        }
        self.rosters
            .lock()
            .unwrap()
            .get(&(channel.clone(), destination.clone()))
            .cloned()
            .ok_or_else(|| {
                SendryError::transport(format!("no roster installed for {destination}"))
            })
    }

    async fn remove_participant(
        &self,
        _channel: &ChannelId,
        destination: &DestinationId,
        participant: &ParticipantId,
    ) -> Result<(), SendryError> {
        if let Some(err) = self.scripting.lock().unwrap().remove_errors.pop_front() {
            return Err(err);
        }
        self.removed
            .lock()
            .unwrap()
            .push((destination.clone(), participant.clone()));
        Ok(())
    }

    fn is_connected(&self, channel: &ChannelId) -> bool {
        self.connectivity
            .lock()
            .unwrap()
            .get(channel)
            .copied()
            .unwrap_or(true)
    }
}

/// Build a roster with the acting channel present as an admin, which is the
/// common fixture for moderation tests.
pub fn roster_with_self_admin(
    destination: &DestinationId,
    subject: &str,
    members: &[(&str, sendry_core::ParticipantRole)],
) -> Roster {
    let mut participants: Vec<sendry_core::Participant> = members
        .iter()
        .map(|(id, role)| sendry_core::Participant {
            id: ParticipantId::from(*id),
            role: *role,
            is_self: false,
        })
        .collect();
    participants.push(sendry_core::Participant {
        id: ParticipantId::from("self@bot"),
        role: sendry_core::ParticipantRole::Admin,
        is_self: true,
    });
    Roster {
        destination: destination.clone(),
        subject: subject.to_string(),
        description: None,
        participants,
    }
}
