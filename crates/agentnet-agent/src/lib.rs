//! # Agentnet Agent
//!
//! Agent coordination layer over the agentnet peer protocol: inbound
//! message dispatch (registration, chat, ping, announce), the directory
//! of registered remote agents, and the completion-backend boundary the
//! surrounding application implements.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod agent;
mod backend;
mod config;
mod directory;
mod error;

pub use agent::Agent;
pub use backend::CompletionBackend;
pub use config::{AgentConfig, ConfigError};
pub use directory::{AgentDirectory, AgentRecord, AgentSummary};
pub use error::{AgentError, Result};
