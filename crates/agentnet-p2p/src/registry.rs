//! Peer tracking and agent-name arbitration.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{P2pError, Result};
use crate::peer::{PeerId, PeerInfo};

#[derive(Default)]
struct RegistryState {
    peers: HashMap<PeerId, PeerInfo>,
    names: HashMap<String, PeerId>,
}

/// Tracks known peers and arbitrates agent display names.
///
/// Both maps live behind one lock so a name claim can never interleave
/// with a connection transition mid-update; the raw maps are never
/// exposed. Peer records are never deleted: a disconnected peer survives
/// as a tombstone and keeps its name claims.
///
/// Arbitration is local to this registry. It guarantees that *this* peer
/// has not seen a conflict, not that a name is unique network-wide.
#[derive(Default)]
pub struct PeerRegistry {
    state: RwLock<RegistryState>,
}

impl PeerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name` for `peer`.
    ///
    /// First claim wins. Re-claiming by the current owner succeeds
    /// silently; any other claimant gets [`P2pError::NameConflict`]
    /// naming the existing owner. Claims are never released, not even
    /// when the owner disconnects.
    pub fn claim_name(&self, name: &str, peer: &PeerId) -> Result<()> {
        let mut state = self.state.write();
        if let Some(owner) = state.names.get(name) {
            if owner != peer {
                return Err(P2pError::NameConflict {
                    name: name.to_string(),
                    owner: owner.clone(),
                });
            }
            return Ok(());
        }
        state.names.insert(name.to_string(), peer.clone());
        Ok(())
    }

    /// Returns the current owner of `name`, if it is claimed.
    pub fn name_owner(&self, name: &str) -> Option<PeerId> {
        self.state.read().names.get(name).cloned()
    }

    /// Marks `peer` as connected, creating its record on first sighting.
    /// Idempotent: a double-connect leaves everything else unchanged.
    pub fn record_connect(&self, peer: &PeerId) {
        let mut state = self.state.write();
        state
            .peers
            .entry(peer.clone())
            .or_insert_with(|| PeerInfo::new(peer.clone()))
            .connected = true;
    }

    /// Marks `peer` as disconnected. A disconnect of an unknown peer is
    /// a no-op; known records are retained as tombstones.
    pub fn record_disconnect(&self, peer: &PeerId) {
        if let Some(info) = self.state.write().peers.get_mut(peer) {
            info.connected = false;
        }
    }

    /// Merges advertised addresses into the peer's record, creating it
    /// on first sighting.
    pub fn record_addresses(&self, peer: &PeerId, addresses: Vec<String>) {
        let mut state = self.state.write();
        let info = state
            .peers
            .entry(peer.clone())
            .or_insert_with(|| PeerInfo::new(peer.clone()));
        for address in addresses {
            if !info.addresses.contains(&address) {
                info.addresses.push(address);
            }
        }
    }

    /// Snapshot of the identities currently connected.
    ///
    /// The returned set is a copy, safe to iterate after the internal
    /// lock is released.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.state
            .read()
            .peers
            .values()
            .filter(|info| info.connected)
            .map(|info| info.id.clone())
            .collect()
    }

    /// Snapshot of every known peer, tombstones included.
    pub fn peers(&self) -> Vec<PeerInfo> {
        self.state.read().peers.values().cloned().collect()
    }
}
