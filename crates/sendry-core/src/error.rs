// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sendry messaging core.

use thiserror::Error;

/// The primary error type used across all Sendry components.
#[derive(Debug, Error)]
pub enum SendryError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport-level errors other than disconnection (protocol failures,
    /// malformed destination, roster fetch failure).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The channel has no live transport connection.
    #[error("channel {channel} is not connected")]
    TransportDisconnected { channel: String },

    /// A debit was refused because the account balance does not cover it.
    #[error("insufficient credit for account {account}: need {needed}, have {balance}")]
    InsufficientCredit {
        account: String,
        needed: i64,
        balance: i64,
    },

    /// A send neither succeeded nor failed within the configured timeout.
    #[error("send timed out after {duration:?}")]
    SendTimeout { duration: std::time::Duration },

    /// The transport reported a definite send failure.
    #[error("send failed: {message}")]
    SendFailed { message: String },

    /// An operation was attempted against an entity in the wrong state
    /// (e.g. updating a task that is no longer pending).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SendryError {
    /// Construct a transport error from a plain message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// True when the failure should revert work without billing: the channel
    /// dropped, so nothing was delivered and nothing will be.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::TransportDisconnected { .. })
    }
}
