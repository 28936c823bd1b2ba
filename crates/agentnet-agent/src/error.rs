//! Agent-layer error types.

use agentnet_p2p::{P2pError, PeerId};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the agent coordination layer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A protocol-layer failure.
    #[error(transparent)]
    P2p(#[from] P2pError),

    /// A payload could not be (de)serialized.
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The completion backend failed.
    #[error("completion backend: {0}")]
    Backend(String),

    /// A directed request elicited no reply.
    #[error("no response from peer {0}")]
    NoResponse(PeerId),

    /// The remote agent answered with an error envelope.
    #[error("remote error from peer {peer}: {message}")]
    Remote {
        /// The replying peer.
        peer: PeerId,
        /// The error text it sent.
        message: String,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {}", format_violations(.0))]
    Config(Vec<ConfigError>),
}

impl From<AgentError> for P2pError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::P2p(inner) => inner,
            other => P2pError::Handler(other.to_string()),
        }
    }
}

fn format_violations(violations: &[ConfigError]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
