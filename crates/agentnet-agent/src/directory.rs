//! The directory of registered remote agents.

use std::collections::HashMap;

use agentnet_p2p::PeerId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Metadata advertised by a remote agent during registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// The registering peer.
    pub peer: PeerId,
    /// Display name the agent claimed.
    pub name: String,
    /// Endpoint the agent is reachable at.
    pub endpoint: String,
    /// Models the agent can serve.
    pub models: Vec<String>,
}

/// Registration records keyed by peer identity.
///
/// A record is overwritten on each successful re-registration and never
/// independently expired.
#[derive(Debug, Default)]
pub struct AgentDirectory {
    records: RwLock<HashMap<PeerId, AgentRecord>>,
}

impl AgentDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the record for `record.peer`.
    pub fn upsert(&self, record: AgentRecord) {
        self.records.write().insert(record.peer.clone(), record);
    }

    /// Returns the record for `peer`, if it has registered.
    pub fn get(&self, peer: &PeerId) -> Option<AgentRecord> {
        self.records.read().get(peer).cloned()
    }

    /// Snapshot of every registration record.
    pub fn records(&self) -> Vec<AgentRecord> {
        self.records.read().values().cloned().collect()
    }
}

/// One row of the agent listing: peer state merged with its
/// registration record, when one exists.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    /// The peer's identity.
    pub peer: PeerId,
    /// Whether the peer is currently connected.
    pub connected: bool,
    /// Registered display name, if the agent has registered.
    pub name: Option<String>,
    /// Registered endpoint, if the agent has registered.
    pub endpoint: Option<String>,
    /// Registered models, empty if the agent has not registered.
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reregistration_overwrites_the_record() {
        let directory = AgentDirectory::new();
        let peer = PeerId::new("peer-1");

        directory.upsert(AgentRecord {
            peer: peer.clone(),
            name: "alice".to_string(),
            endpoint: "http://localhost:8080".to_string(),
            models: vec!["gpt-4".to_string()],
        });
        directory.upsert(AgentRecord {
            peer: peer.clone(),
            name: "alice".to_string(),
            endpoint: "http://localhost:9090".to_string(),
            models: vec!["gpt-4".to_string()],
        });

        let record = directory.get(&peer).unwrap();
        assert_eq!(record.endpoint, "http://localhost:9090");
        assert_eq!(directory.records().len(), 1);
    }
}
