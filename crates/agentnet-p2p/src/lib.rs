//! # Agentnet P2P
//!
//! Peer message protocol for the agentnet mesh.
//!
//! This crate provides the envelope and codec, the stream-based
//! request/response exchange, peer tracking with agent-name arbitration,
//! and concurrent broadcast fan-out. The discovery/transport substrate is
//! consumed through the narrow traits in [`transport`]; an in-process
//! implementation for tests lives in [`memory`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod message;
mod node;
mod peer;
mod registry;
mod transport;

pub mod memory;

pub use error::{P2pError, Result};
pub use message::{
    AnnouncePayload, ChatChoice, ChatMessage, ChatRequest, ChatResponse, Envelope, ErrorPayload,
    MessageKind, RegisterPayload,
};
pub use node::{Dispatch, Node, NodeHandle};
pub use peer::{PeerId, PeerInfo};
pub use registry::PeerRegistry;
pub use transport::{IncomingStream, PeerEvent, RawStream, StreamTransport};

use std::time::Duration;

/// Protocol identifier distinguishing agentnet streams from any other
/// protocol multiplexed over the same transport substrate.
pub const PROTOCOL_ID: &str = "/agentnet/1.0.0";

/// Default deadline for a directed request/response exchange.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum encoded envelope size carried on a single stream.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
