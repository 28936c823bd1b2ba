//! The narrow boundary the protocol layer requires from the peer
//! substrate.
//!
//! Connection establishment, address resolution, NAT traversal and
//! encryption all live behind these traits. The protocol layer only ever
//! opens one fresh stream per logical request, services inbound streams
//! as they arrive, and reacts to connect/disconnect notifications.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::peer::PeerId;
use crate::Result;

/// A single bidirectional byte stream scoped to one request/response
/// exchange: write the request, half-close, read until the peer closes.
#[async_trait]
pub trait RawStream: Send {
    /// Writes the whole buffer to the peer.
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Half-closes the write side: the peer observes EOF but may still
    /// send data back.
    async fn close_write(&mut self) -> std::io::Result<()>;

    /// Reads until the peer closes its write side.
    async fn read_to_end(&mut self) -> std::io::Result<Vec<u8>>;
}

#[async_trait]
impl<T> RawStream for T
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        AsyncWriteExt::write_all(self, data).await
    }

    async fn close_write(&mut self) -> std::io::Result<()> {
        self.shutdown().await
    }

    async fn read_to_end(&mut self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::new();
        AsyncReadExt::read_to_end(self, &mut data).await?;
        Ok(data)
    }
}

/// Opens fresh outbound streams to peers.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Opens a new bidirectional stream to the peer, one per logical
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`crate::P2pError::Transport`] when no stream can be
    /// opened; the failure is surfaced to the caller, never retried here.
    async fn open_stream(&self, peer: &PeerId) -> Result<Box<dyn RawStream>>;
}

/// An inbound stream accepted by the transport.
pub struct IncomingStream {
    /// Identity of the remote peer that opened the stream.
    pub from: PeerId,
    /// The stream itself.
    pub stream: Box<dyn RawStream>,
}

/// Connection lifecycle notification from the transport.
///
/// Delivered at most once per transition, with no ordering guarantee
/// relative to stream activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A connection to the peer was established.
    Connected(PeerId),
    /// The connection to the peer was torn down.
    Disconnected(PeerId),
}
