//! Peer identities and per-peer state.

use serde::{Deserialize, Serialize};

/// A stable, opaque handle identifying a network participant,
/// independent of its current network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Creates a peer ID from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the full string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short prefix suitable for human display.
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short())
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// State tracked for one known network identity.
///
/// An entry is created on first sighting and never deleted: a
/// disconnected peer survives as a tombstone so a re-appearance under
/// the same identity is recognized and its name claims are preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    /// The peer's identity.
    pub id: PeerId,
    /// Addresses the peer has advertised.
    pub addresses: Vec<String>,
    /// Whether the peer is currently connected.
    pub connected: bool,
}

impl PeerInfo {
    pub(crate) fn new(id: PeerId) -> Self {
        Self {
            id,
            addresses: Vec::new(),
            connected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_long_identities() {
        let peer = PeerId::new("12D3KooWB1b3qZxWJanuhtseF3DmPggHCtG36KZ9ixkqHtdKH9fh");
        assert_eq!(peer.short(), "12D3KooWB1b3");
        assert_eq!(peer.to_string(), "12D3KooWB1b3");
    }

    #[test]
    fn short_id_keeps_short_identities_whole() {
        let peer = PeerId::new("p1");
        assert_eq!(peer.short(), "p1");
        assert_eq!(peer.as_str(), "p1");
    }
}
