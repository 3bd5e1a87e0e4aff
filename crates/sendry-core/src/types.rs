// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the Sendry components and the Transport boundary.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the underlying id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_newtype!(
    /// Unique identifier for a tenant account (credit owner).
    AccountId
);
id_newtype!(
    /// Unique identifier for a transport-connected messaging channel.
    ChannelId
);
id_newtype!(
    /// Unique identifier for an individual or group chat.
    DestinationId
);
id_newtype!(
    /// Unique identifier for a chat participant.
    ParticipantId
);
id_newtype!(
    /// Transport-assigned identifier for a delivered message.
    MessageId
);

/// Reference to a specific message within a destination, sufficient for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub destination: DestinationId,
    pub message_id: MessageId,
}

/// Transport connectivity state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
}

/// Presence signal emitted during typing simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PresenceState {
    Composing,
    Paused,
}

/// Media attachment kind for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

/// Outbound message payload handed to the delivery queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagePayload {
    /// Plain text, optionally mentioning participants.
    Text {
        body: String,
        #[serde(default)]
        mentions: Vec<ParticipantId>,
    },
    /// Media attachment with an optional caption.
    Media {
        kind: MediaKind,
        url: String,
        caption: Option<String>,
    },
    /// Deletion of a previously delivered message.
    Delete { target: MessageRef },
}

impl MessagePayload {
    /// Shorthand for a plain text payload without mentions.
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text {
            body: body.into(),
            mentions: Vec::new(),
        }
    }

    /// Text length driving typing simulation; `None` for payloads that
    /// should never simulate typing.
    pub fn typing_len(&self) -> Option<usize> {
        match self {
            Self::Text { body, .. } => Some(body.chars().count()),
            Self::Media { .. } | Self::Delete { .. } => None,
        }
    }
}

/// Result of a successful transport send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: MessageId,
}

/// Dispatch priority within a channel queue.
///
/// High-priority items are inserted ahead of the normal backlog; they never
/// overtake an item already handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Role a participant holds on a destination roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Member,
    Admin,
    SuperAdmin,
}

impl ParticipantRole {
    /// Whether this role carries administrative rights.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

/// One entry of a destination roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: ParticipantRole,
    /// True when this entry is the acting channel's own identity.
    pub is_self: bool,
}

/// Roster of a destination as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub destination: DestinationId,
    /// Display name of the destination (group subject).
    pub subject: String,
    /// Free-form description, used as fallback group rules.
    pub description: Option<String>,
    pub participants: Vec<Participant>,
}

impl Roster {
    /// Whether the given participant holds administrative rights here.
    pub fn is_admin(&self, id: &ParticipantId) -> bool {
        self.participants
            .iter()
            .any(|p| &p.id == id && p.role.is_admin())
    }

    /// The acting channel's own roster entry, if present.
    pub fn self_entry(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_self)
    }
}

/// Inbound message delivered by the transport for moderation.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub destination: DestinationId,
    pub sender: ParticipantId,
    /// Extracted text content (body or media caption), if any.
    pub text: Option<String>,
    /// Reference to the message on the transport, sufficient for deletion.
    pub message: MessageRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn id_newtypes_display_and_compare() {
        let a = AccountId::from("acct-1");
        assert_eq!(a.to_string(), "acct-1");
        assert_eq!(a, AccountId("acct-1".into()));
        assert_eq!(a.as_str(), "acct-1");
    }

    #[test]
    fn media_kind_round_trips_through_strings() {
        for kind in [MediaKind::Image, MediaKind::Video, MediaKind::Audio] {
            let s = kind.to_string();
            assert_eq!(MediaKind::from_str(&s).unwrap(), kind);
        }
    }

    #[test]
    fn typing_len_only_applies_to_text() {
        assert_eq!(MessagePayload::text("hello").typing_len(), Some(5));

        let media = MessagePayload::Media {
            kind: MediaKind::Image,
            url: "https://example.com/a.png".into(),
            caption: Some("caption".into()),
        };
        assert_eq!(media.typing_len(), None);

        let delete = MessagePayload::Delete {
            target: MessageRef {
                destination: DestinationId::from("dest"),
                message_id: MessageId::from("m1"),
            },
        };
        assert_eq!(delete.typing_len(), None);
    }

    #[test]
    fn roster_admin_lookup() {
        let roster = Roster {
            destination: DestinationId::from("group-1"),
            subject: "Test Group".into(),
            description: None,
            participants: vec![
                Participant {
                    id: ParticipantId::from("alice"),
                    role: ParticipantRole::Admin,
                    is_self: false,
                },
                Participant {
                    id: ParticipantId::from("bob"),
                    role: ParticipantRole::Member,
                    is_self: true,
                },
            ],
        };

        assert!(roster.is_admin(&ParticipantId::from("alice")));
        assert!(!roster.is_admin(&ParticipantId::from("bob")));
        assert!(!roster.is_admin(&ParticipantId::from("nobody")));
        assert_eq!(
            roster.self_entry().map(|p| p.id.clone()),
            Some(ParticipantId::from("bob"))
        );
    }

    #[test]
    fn priority_defaults_to_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
