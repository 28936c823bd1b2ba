//! The protocol node: request/response exchange, broadcast fan-out and
//! connection lifecycle tracking.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{P2pError, Result};
use crate::message::Envelope;
use crate::peer::PeerId;
use crate::registry::PeerRegistry;
use crate::transport::{IncomingStream, PeerEvent, StreamTransport};
use crate::DEFAULT_SEND_TIMEOUT;

/// Inbound message dispatcher, implemented by the surrounding
/// application and injected into the node.
///
/// Invoked once per inbound stream. Returning `Ok(None)` means no reply
/// is written and the stream closes empty; the remote side observes a
/// legitimate "no reply".
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// Handles one decoded envelope sent by `from`.
    async fn dispatch(&self, from: &PeerId, envelope: Envelope) -> Result<Option<Envelope>>;
}

/// Handles to a node's background service loops.
pub struct NodeHandle {
    inbound: JoinHandle<()>,
    lifecycle: JoinHandle<()>,
}

impl NodeHandle {
    /// Aborts both service loops.
    pub fn abort(&self) {
        self.inbound.abort();
        self.lifecycle.abort();
    }
}

struct NodeInner {
    local_id: PeerId,
    transport: Arc<dyn StreamTransport>,
    registry: Arc<PeerRegistry>,
    dispatcher: RwLock<Option<Arc<dyn Dispatch>>>,
}

/// A protocol node bound to one local identity.
///
/// The node owns the peer registry and drives every exchange over the
/// injected transport. Cloning is cheap and shares the same node; all
/// per-call state is stack-local, the registry is the only shared
/// mutable state.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Creates a node over the given transport.
    pub fn new(local_id: PeerId, transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                local_id,
                transport,
                registry: Arc::new(PeerRegistry::new()),
                dispatcher: RwLock::new(None),
            }),
        }
    }

    /// Returns the local identity.
    #[must_use]
    pub fn local_id(&self) -> &PeerId {
        &self.inner.local_id
    }

    /// Returns the peer registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.inner.registry
    }

    /// Installs the inbound dispatcher.
    pub fn set_dispatcher(&self, dispatcher: Arc<dyn Dispatch>) {
        *self.inner.dispatcher.write() = Some(dispatcher);
    }

    /// Starts servicing inbound streams and lifecycle notifications.
    ///
    /// Each inbound stream gets its own task, so a slow handler never
    /// holds up other peers. Lifecycle events go straight into the
    /// registry; the update is a short lock operation, keeping the
    /// transport's notification path unblocked.
    pub fn start(
        &self,
        mut incoming: mpsc::Receiver<IncomingStream>,
        mut events: mpsc::Receiver<PeerEvent>,
    ) -> NodeHandle {
        let node = self.clone();
        let inbound = tokio::spawn(async move {
            while let Some(stream) = incoming.recv().await {
                let node = node.clone();
                tokio::spawn(async move { node.handle_stream(stream).await });
            }
        });

        let registry = Arc::clone(&self.inner.registry);
        let lifecycle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    PeerEvent::Connected(peer) => {
                        registry.record_connect(&peer);
                        info!(peer = %peer, "peer connected");
                    }
                    PeerEvent::Disconnected(peer) => {
                        registry.record_disconnect(&peer);
                        info!(peer = %peer, "peer disconnected");
                    }
                }
            }
        });

        info!(peer_id = %self.inner.local_id, "node started");
        NodeHandle { inbound, lifecycle }
    }

    /// Sends one request to `peer` and waits for at most one reply.
    ///
    /// The exchange is scoped to a single fresh stream: write the
    /// envelope, half-close, read until the peer closes. An empty read
    /// is a legitimate "no reply" (`Ok(None)`), not an error — some
    /// kinds never elicit a response. Failures are surfaced to the
    /// caller and never retried internally. Dropping the returned future
    /// releases the stream without affecting other in-flight exchanges.
    pub async fn send_and_await(
        &self,
        peer: &PeerId,
        envelope: &Envelope,
        deadline: Duration,
    ) -> Result<Option<Envelope>> {
        tokio::time::timeout(deadline, self.exchange(peer, envelope))
            .await
            .map_err(|_| P2pError::Timeout(peer.clone(), deadline))?
    }

    async fn exchange(&self, peer: &PeerId, envelope: &Envelope) -> Result<Option<Envelope>> {
        let mut stream = self.inner.transport.open_stream(peer).await?;
        stream.write_all(&envelope.encode()?).await?;
        stream.close_write().await?;

        let data = stream.read_to_end().await?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(Envelope::decode(&data)?))
    }

    /// Sends `envelope` to every currently connected peer.
    ///
    /// Takes a point-in-time snapshot of the connected set, then spawns
    /// one independent task per peer: a failure or timeout against one
    /// peer never delays, cancels or fails delivery to the others.
    /// Returns as soon as all sends are dispatched; per-peer failures
    /// are logged and discarded.
    pub fn broadcast(&self, envelope: Envelope) {
        let peers = self.inner.registry.connected_peers();
        debug!(kind = ?envelope.kind, peers = peers.len(), "broadcasting");

        for peer in peers {
            let node = self.clone();
            let envelope = envelope.clone();
            tokio::spawn(async move {
                if let Err(err) = node
                    .send_and_await(&peer, &envelope, DEFAULT_SEND_TIMEOUT)
                    .await
                {
                    debug!(peer = %peer, error = %err, "broadcast delivery failed");
                }
            });
        }
    }

    async fn handle_stream(&self, incoming: IncomingStream) {
        let IncomingStream { from, mut stream } = incoming;

        let data = match stream.read_to_end().await {
            Ok(data) => data,
            Err(err) => {
                warn!(peer = %from, error = %err, "failed to read inbound stream");
                return;
            }
        };

        // Structurally invalid input drops the stream, no reply attempted.
        let envelope = match Envelope::decode(&data) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(peer = %from, error = %err, "dropping malformed envelope");
                return;
            }
        };

        let dispatcher = self.inner.dispatcher.read().clone();
        let dispatcher = match dispatcher {
            Some(dispatcher) => dispatcher,
            None => {
                warn!(peer = %from, "no dispatcher installed");
                return;
            }
        };

        let reply = match dispatcher.dispatch(&from, envelope).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(peer = %from, error = %err, "dispatch failed");
                return;
            }
        };

        if let Some(reply) = reply {
            let encoded = match reply.encode() {
                Ok(encoded) => encoded,
                Err(err) => {
                    warn!(peer = %from, error = %err, "failed to encode reply");
                    return;
                }
            };
            if let Err(err) = stream.write_all(&encoded).await {
                debug!(peer = %from, error = %err, "failed to write reply");
            }
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("local_id", &self.inner.local_id)
            .field(
                "connected_peers",
                &self.inner.registry.connected_peers().len(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryNetwork;
    use crate::message::MessageKind;

    /// Replies to pings with a pong, stays silent otherwise.
    struct Ponger {
        local: PeerId,
    }

    #[async_trait]
    impl Dispatch for Ponger {
        async fn dispatch(&self, _from: &PeerId, envelope: Envelope) -> Result<Option<Envelope>> {
            match envelope.kind {
                MessageKind::Ping => {
                    Ok(Some(Envelope::new(MessageKind::Pong, self.local.clone())))
                }
                _ => Ok(None),
            }
        }
    }

    /// Forwards every received envelope to a channel, never replies.
    struct Recorder {
        seen: mpsc::UnboundedSender<(PeerId, Envelope)>,
    }

    #[async_trait]
    impl Dispatch for Recorder {
        async fn dispatch(&self, from: &PeerId, envelope: Envelope) -> Result<Option<Envelope>> {
            let _ = self.seen.send((from.clone(), envelope));
            Ok(None)
        }
    }

    fn ponger(id: &str) -> Arc<Ponger> {
        Arc::new(Ponger {
            local: PeerId::new(id),
        })
    }

    fn start_node(
        network: &MemoryNetwork,
        id: &str,
        dispatcher: Arc<dyn Dispatch>,
    ) -> (Node, NodeHandle) {
        let peer = PeerId::new(id);
        let (transport, incoming, events) = network.join(peer.clone());
        let node = Node::new(peer, Arc::new(transport));
        node.set_dispatcher(dispatcher);
        let handle = node.start(incoming, events);
        (node, handle)
    }

    #[tokio::test]
    async fn ping_gets_a_correlated_pong() {
        let network = MemoryNetwork::new();
        let (a, _ha) = start_node(&network, "peer-a", ponger("peer-a"));
        let (b, _hb) = start_node(&network, "peer-b", ponger("peer-b"));

        let ping = Envelope::new(MessageKind::Ping, a.local_id().clone());
        let reply = a
            .send_and_await(b.local_id(), &ping, Duration::from_secs(1))
            .await
            .unwrap()
            .expect("ping should be answered");
        assert_eq!(reply.kind, MessageKind::Pong);
        assert_eq!(&reply.from, b.local_id());
    }

    #[tokio::test]
    async fn silent_handler_yields_no_reply_not_an_error() {
        let network = MemoryNetwork::new();
        let (seen_tx, _seen_rx) = mpsc::unbounded_channel();
        let (a, _ha) = start_node(&network, "peer-a", ponger("peer-a"));
        let (b, _hb) = start_node(&network, "peer-b", Arc::new(Recorder { seen: seen_tx }));

        let announce = Envelope::new(MessageKind::Announce, a.local_id().clone());
        let reply = a
            .send_and_await(b.local_id(), &announce, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let network = MemoryNetwork::new();
        let (a, _ha) = start_node(&network, "peer-a", ponger("peer-a"));
        // peer-silent joins the network but never services its inbound
        // queue, so the stream stays open without ever closing.
        let silent = PeerId::new("peer-silent");
        let (_transport, _incoming, _events) = network.join(silent.clone());

        let ping = Envelope::new(MessageKind::Ping, a.local_id().clone());
        let err = a
            .send_and_await(&silent, &ping, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, P2pError::Timeout(peer, _) if peer == silent));
    }

    #[tokio::test]
    async fn broadcast_survives_one_failed_peer() {
        let network = MemoryNetwork::new();
        let (a, _ha) = start_node(&network, "peer-a", ponger("peer-a"));

        let mut receivers = Vec::new();
        for id in ["peer-1", "peer-2", "peer-3"] {
            let (seen_tx, seen_rx) = mpsc::unbounded_channel();
            let (node, _handle) = start_node(&network, id, Arc::new(Recorder { seen: seen_tx }));
            a.registry().record_connect(node.local_id());
            receivers.push((node.local_id().clone(), seen_rx));
        }

        // Force peer-2's stream opens to fail.
        network.drop_peer(&PeerId::new("peer-2"));

        let announce = Envelope::new(MessageKind::Announce, a.local_id().clone());
        a.broadcast(announce.clone());

        for (peer, mut seen_rx) in receivers {
            if peer.as_str() == "peer-2" {
                continue;
            }
            let (from, received) = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
                .await
                .unwrap_or_else(|_| panic!("peer {peer} never received the broadcast"))
                .unwrap();
            assert_eq!(&from, a.local_id());
            assert_eq!(received, announce);

            // Exactly one copy per peer.
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(seen_rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn lifecycle_events_drive_the_registry() {
        let network = MemoryNetwork::new();
        let (a, _ha) = start_node(&network, "peer-a", ponger("peer-a"));
        let b = PeerId::new("peer-b");
        let (_transport_b, _incoming_b, _events_b) = network.join(b.clone());

        network.connect(a.local_id(), &b).await;
        wait_until(|| a.registry().connected_peers().contains(&b)).await;

        network.disconnect(a.local_id(), &b).await;
        wait_until(|| !a.registry().connected_peers().contains(&b)).await;

        // The record survives the disconnect as a tombstone.
        assert_eq!(a.registry().peers().len(), 1);
    }

    #[tokio::test]
    async fn malformed_inbound_bytes_are_dropped_without_reply() {
        let network = MemoryNetwork::new();
        let (b, _hb) = start_node(&network, "peer-b", ponger("peer-b"));

        let (transport_a, _incoming_a, _events_a) = network.join(PeerId::new("peer-a"));
        let mut stream = transport_a.open_stream(b.local_id()).await.unwrap();
        stream.write_all(b"{{{ not an envelope").await.unwrap();
        stream.close_write().await.unwrap();

        // The offending stream closes with no reply written.
        assert!(stream.read_to_end().await.unwrap().is_empty());
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within deadline");
    }
}
