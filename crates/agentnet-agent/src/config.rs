//! Agent configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single configuration violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ConfigError {
    /// The offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Configuration for a local agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name claimed on the network.
    pub agent_name: String,
    /// P2P listen port.
    pub p2p_port: u16,
    /// Gateway HTTP port.
    pub http_port: u16,
    /// Models advertised during registration.
    pub models: Vec<String>,
    /// Bootstrap peer address, if any.
    pub bootstrap_peer: Option<String>,
    /// API key handed to the completion backend, if it needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_name: "agent".to_string(),
            p2p_port: 4001,
            http_port: 8080,
            models: vec!["gpt-4".to_string(), "gpt-3.5-turbo".to_string()],
            bootstrap_peer: None,
            api_key: None,
        }
    }
}

impl AgentConfig {
    /// Checks the configuration, reporting every violation at once.
    pub fn validate(&self) -> std::result::Result<(), Vec<ConfigError>> {
        let mut violations = Vec::new();

        if self.agent_name.len() < 2 {
            violations.push(ConfigError::new(
                "agent_name",
                "agent name must be at least 2 characters",
            ));
        } else if self.agent_name.len() > 32 {
            violations.push(ConfigError::new(
                "agent_name",
                "agent name cannot exceed 32 characters",
            ));
        }
        if !self.agent_name.chars().all(valid_name_char) {
            violations.push(ConfigError::new(
                "agent_name",
                "agent name can only contain letters, numbers, dashes, and underscores",
            ));
        }

        for (field, port) in [("p2p_port", self.p2p_port), ("http_port", self.http_port)] {
            if port < 1024 {
                violations.push(ConfigError::new(
                    field,
                    "ports below 1024 require elevated privileges, use a port >= 1024",
                ));
            }
        }
        if self.p2p_port == self.http_port {
            violations.push(ConfigError::new(
                "ports",
                "HTTP port and P2P port cannot be the same",
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// The endpoint advertised in registration payloads.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://localhost:{}", self.http_port)
    }
}

fn valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
