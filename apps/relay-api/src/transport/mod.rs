//! Bidirectional message transport consumed by sessions.
//!
//! A transport is split into an independent reader and writer so a session
//! can drive its receive and send loops concurrently. Payloads are opaque:
//! the frame kind is preserved but the content is never inspected.

#[cfg(test)]
pub mod memory;
pub mod ws;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::Utf8Bytes;
use axum::BoxError;

/// A single relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(Utf8Bytes),
    Binary(Bytes),
}

impl Payload {
    pub fn text(text: impl Into<Utf8Bytes>) -> Self {
        Self::Text(text.into())
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.as_str().len(),
            Self::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-session transport failure. Never escapes the owning session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport read failed: {0}")]
    Read(#[source] BoxError),
    #[error("transport write failed: {0}")]
    Write(#[source] BoxError),
    #[error("transport write timed out")]
    WriteTimeout,
    #[error("transport closed")]
    Closed,
}

/// Read half of a transport.
#[async_trait]
pub trait TransportReader: Send + 'static {
    /// Wait for the next message. `Ok(None)` means the peer closed cleanly.
    async fn recv(&mut self) -> Result<Option<Payload>, TransportError>;
}

/// Write half of a transport.
#[async_trait]
pub trait TransportWriter: Send + 'static {
    async fn send(&mut self, payload: Payload) -> Result<(), TransportError>;

    /// Send a close notification to the peer and shut the write side.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A connection produced by the gateway once an upgrade completes.
pub trait Transport: Send + 'static {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}
