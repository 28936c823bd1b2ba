//! In-process transport for tests and multi-node simulations.
//!
//! Streams are [`tokio::io::duplex`] pairs; the hub hands the far half
//! to the destination's inbound queue. Connectivity events are injected
//! explicitly so tests control the lifecycle, and dropping a peer from
//! the hub forces subsequent stream opens to it to fail.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::{P2pError, Result};
use crate::peer::PeerId;
use crate::transport::{IncomingStream, PeerEvent, RawStream, StreamTransport};
use crate::MAX_MESSAGE_SIZE;

const QUEUE_CAPACITY: usize = 64;

#[derive(Clone)]
struct Endpoint {
    incoming: mpsc::Sender<IncomingStream>,
    events: mpsc::Sender<PeerEvent>,
}

/// A hub connecting in-process peers.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    endpoints: Arc<RwLock<HashMap<PeerId, Endpoint>>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a peer, returning its stream opener plus the
    /// inbound-stream and lifecycle-event receivers a node consumes.
    pub fn join(
        &self,
        peer: PeerId,
    ) -> (
        MemoryTransport,
        mpsc::Receiver<IncomingStream>,
        mpsc::Receiver<PeerEvent>,
    ) {
        let (incoming_tx, incoming_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(QUEUE_CAPACITY);
        self.endpoints.write().insert(
            peer.clone(),
            Endpoint {
                incoming: incoming_tx,
                events: events_tx,
            },
        );
        (
            MemoryTransport {
                local: peer,
                endpoints: Arc::clone(&self.endpoints),
            },
            incoming_rx,
            events_rx,
        )
    }

    /// Notifies both peers that a connection between them exists.
    pub async fn connect(&self, a: &PeerId, b: &PeerId) {
        self.notify(a, PeerEvent::Connected(b.clone())).await;
        self.notify(b, PeerEvent::Connected(a.clone())).await;
    }

    /// Notifies both peers that the connection between them is gone.
    pub async fn disconnect(&self, a: &PeerId, b: &PeerId) {
        self.notify(a, PeerEvent::Disconnected(b.clone())).await;
        self.notify(b, PeerEvent::Disconnected(a.clone())).await;
    }

    /// Detaches a peer entirely; stream opens to it fail from then on.
    pub fn drop_peer(&self, peer: &PeerId) {
        self.endpoints.write().remove(peer);
    }

    async fn notify(&self, peer: &PeerId, event: PeerEvent) {
        let endpoint = self.endpoints.read().get(peer).cloned();
        if let Some(endpoint) = endpoint {
            let _ = endpoint.events.send(event).await;
        }
    }
}

/// Stream opener for one attached peer.
pub struct MemoryTransport {
    local: PeerId,
    endpoints: Arc<RwLock<HashMap<PeerId, Endpoint>>>,
}

#[async_trait]
impl StreamTransport for MemoryTransport {
    async fn open_stream(&self, peer: &PeerId) -> Result<Box<dyn RawStream>> {
        let endpoint = self
            .endpoints
            .read()
            .get(peer)
            .cloned()
            .ok_or_else(|| P2pError::Transport(format!("no route to peer {peer}")))?;

        let (near, far) = tokio::io::duplex(MAX_MESSAGE_SIZE);
        endpoint
            .incoming
            .send(IncomingStream {
                from: self.local.clone(),
                stream: Box::new(far),
            })
            .await
            .map_err(|_| P2pError::Transport(format!("peer {peer} stopped accepting streams")))?;

        Ok(Box::new(near))
    }
}
