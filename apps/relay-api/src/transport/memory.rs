//! In-process transport backed by channels.
//!
//! Used by tests to drive sessions without sockets. The [`MemoryPeer`] plays
//! the remote client: it feeds messages into the session and observes what
//! the session writes back.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Payload, Transport, TransportError, TransportReader, TransportWriter};

/// Default number of frames the peer buffers before session writes block.
const DEFAULT_PEER_CAPACITY: usize = 1024;

/// What the session wrote to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFrame {
    Message(Payload),
    Close,
}

type Inbound = Result<Payload, TransportError>;

pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::Sender<PeerFrame>,
}

pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

pub struct MemoryWriter {
    outbound: mpsc::Sender<PeerFrame>,
}

/// Remote end of a [`MemoryTransport`].
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    frames: mpsc::Receiver<PeerFrame>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        Self::with_peer_capacity(DEFAULT_PEER_CAPACITY)
    }

    /// Build a pair whose peer buffers at most `capacity` unread frames.
    /// Once full, session writes block until the peer reads.
    pub fn with_peer_capacity(capacity: usize) -> (MemoryTransport, MemoryPeer) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::channel(capacity.max(1));
        let transport = MemoryTransport {
            inbound: inbound_rx,
            outbound: frames_tx,
        };
        let peer = MemoryPeer {
            inbound: Some(inbound_tx),
            frames: frames_rx,
        };
        (transport, peer)
    }
}

impl Transport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (
            MemoryReader {
                inbound: self.inbound,
            },
            MemoryWriter {
                outbound: self.outbound,
            },
        )
    }
}

#[async_trait]
impl TransportReader for MemoryReader {
    async fn recv(&mut self) -> Result<Option<Payload>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TransportWriter for MemoryWriter {
    async fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        self.outbound
            .send(PeerFrame::Message(payload))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outbound
            .send(PeerFrame::Close)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

impl MemoryPeer {
    /// Deliver a message to the session. Ignored once the peer has closed.
    pub fn send(&self, payload: Payload) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(payload));
        }
    }

    /// Close the connection from the peer side (orderly close).
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Make the session's next read fail, then close.
    pub fn fail(&mut self, reason: &str) {
        if let Some(tx) = self.inbound.take() {
            let _ = tx.send(Err(TransportError::Read(reason.to_string().into())));
        }
    }

    /// Refuse further writes from the session, as a dead socket would.
    pub fn stop_reading(&mut self) {
        self.frames.close();
    }

    /// Wait for the next frame written by the session. `None` once the
    /// session's write side is gone.
    pub async fn next_frame(&mut self) -> Option<PeerFrame> {
        self.frames.recv().await
    }

    /// Return a frame if one is already buffered.
    pub fn try_next_frame(&mut self) -> Option<PeerFrame> {
        self.frames.try_recv().ok()
    }
}
