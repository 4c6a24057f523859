//! Per-connection session: bridges one transport to a room's hub.
//!
//! A session runs two loops. The receive loop forwards every inbound message
//! to the hub; the send loop drains the session's outbound queue into the
//! transport. The session never closes its own outbound queue: it hands the
//! only producer to the hub on registration and keeps just the consumer.

use std::fmt;
use std::time::Duration;

use relay_common::id::prefix;
use relay_common::PrefixedId;
use tokio::sync::{mpsc, watch};
use tokio::time;

use crate::config::Config;
use crate::hub::Hub;
use crate::transport::{Payload, Transport, TransportError, TransportReader, TransportWriter};

/// Opaque per-connection handle (`ses_` prefixed ULID).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Self::generate())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PrefixedId for SessionId {
    const PREFIX: &'static str = prefix::SESSION;
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle: `Connecting → Active → Closing → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet registered with the hub.
    Connecting,
    /// Registered; both loops running.
    Active,
    /// A loop has ended or the hub evicted the session.
    Closing,
    /// Both loops have exited and the transport is closed.
    Closed,
}

/// Per-session limits.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the outbound queue. A full queue at broadcast time gets
    /// the session evicted.
    pub outbound_capacity: usize,
    /// Close the session if the peer sends nothing for this long.
    pub idle_timeout: Option<Duration>,
    /// Treat a single transport write taking longer than this as a failure.
    pub write_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            idle_timeout: None,
            write_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            outbound_capacity: config.outbound_queue_capacity,
            idle_timeout: config.idle_timeout,
            write_timeout: config.write_timeout,
        }
    }
}

pub struct Session<T: Transport> {
    id: SessionId,
    hub: Hub,
    transport: T,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
}

impl<T: Transport> Session<T> {
    pub fn new(hub: Hub, transport: T, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            id: SessionId::new(),
            hub,
            transport,
            config,
            state,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Watch the session's lifecycle state.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Register with the hub and run both loops until the session ends.
    pub async fn run(self) {
        let Session {
            id,
            hub,
            transport,
            config,
            state,
        } = self;

        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (mut reader, mut writer) = transport.split();

        if hub.register(id.clone(), outbound_tx).await.is_err() {
            tracing::debug!(session_id = %id, room = %hub.name(), "hub stopped before registration");
            state.send_replace(SessionState::Closing);
            let _ = write_with_deadline(writer.close(), config.write_timeout).await;
            state.send_replace(SessionState::Closed);
            return;
        }
        state.send_replace(SessionState::Active);
        tracing::info!(session_id = %id, room = %hub.name(), "session active");

        let mut send_task = tokio::spawn(send_loop(
            id.clone(),
            writer,
            outbound_rx,
            config.write_timeout,
        ));

        // Whichever loop finishes first ends the session; a dead writer
        // cancels a receive loop that may be parked on a silent peer.
        let send_finished = tokio::select! {
            () = receive_loop(&id, &hub, &mut reader, config.idle_timeout) => false,
            joined = &mut send_task => {
                if let Err(e) = joined {
                    tracing::warn!(session_id = %id, error = %e, "send loop aborted");
                }
                true
            }
        };

        state.send_replace(SessionState::Closing);
        hub.unregister(&id);
        drop(reader);

        if !send_finished {
            if let Err(e) = send_task.await {
                tracing::warn!(session_id = %id, error = %e, "send loop aborted");
            }
        }

        state.send_replace(SessionState::Closed);
        tracing::info!(session_id = %id, room = %hub.name(), "session closed");
    }
}

async fn receive_loop<R: TransportReader>(
    id: &SessionId,
    hub: &Hub,
    reader: &mut R,
    idle_timeout: Option<Duration>,
) {
    loop {
        let next = match idle_timeout {
            Some(limit) => match time::timeout(limit, reader.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::debug!(session_id = %id, "idle timeout");
                    return;
                }
            },
            None => reader.recv().await,
        };

        match next {
            Ok(Some(payload)) => {
                if hub.broadcast(payload).await.is_err() {
                    tracing::debug!(session_id = %id, "hub stopped");
                    return;
                }
            }
            Ok(None) => {
                tracing::debug!(session_id = %id, "peer closed");
                return;
            }
            Err(e) => {
                tracing::debug!(session_id = %id, error = %e, "transport read failed");
                return;
            }
        }
    }
}

async fn send_loop<W: TransportWriter>(
    id: SessionId,
    mut writer: W,
    mut outbound: mpsc::Receiver<Payload>,
    write_timeout: Option<Duration>,
) {
    while let Some(payload) = outbound.recv().await {
        if let Err(e) = write_with_deadline(writer.send(payload), write_timeout).await {
            tracing::debug!(session_id = %id, error = %e, "transport write failed");
            return;
        }
    }

    // The hub closed the queue.
    if let Err(e) = write_with_deadline(writer.close(), write_timeout).await {
        tracing::trace!(session_id = %id, error = %e, "close notification not delivered");
    }
}

async fn write_with_deadline<F>(write: F, limit: Option<Duration>) -> Result<(), TransportError>
where
    F: std::future::Future<Output = Result<(), TransportError>>,
{
    match limit {
        Some(limit) => time::timeout(limit, write)
            .await
            .unwrap_or(Err(TransportError::WriteTimeout)),
        None => write.await,
    }
}
