//! Protocol error types.

use std::time::Duration;

use thiserror::Error;

use crate::peer::PeerId;

/// Errors that can occur in the peer protocol layer.
///
/// None of these are fatal to the process; the worst case is an
/// unresolved request that the caller may re-issue.
#[derive(Debug, Error)]
pub enum P2pError {
    /// The transport could not open or route a stream.
    #[error("transport failure: {0}")]
    Transport(String),

    /// I/O failure on an open stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes on the wire were not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    /// The agent name is already claimed by a different peer.
    #[error("agent name '{name}' is already taken by peer {}", .owner.short())]
    NameConflict {
        /// The contested display name.
        name: String,
        /// The identity that currently owns the name.
        owner: PeerId,
    },

    /// No reply arrived before the caller's deadline.
    #[error("no reply from peer {0} within {1:?}")]
    Timeout(PeerId, Duration),

    /// The inbound dispatcher rejected the message.
    #[error("handler error: {0}")]
    Handler(String),
}

/// A specialized Result type for peer protocol operations.
pub type Result<T> = std::result::Result<T, P2pError>;
