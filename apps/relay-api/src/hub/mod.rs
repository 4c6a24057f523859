//! Room hub: the single owner of the session registry.
//!
//! All membership changes and broadcasts are funnelled through three control
//! channels into one reactor task. The channels are polled fairly, except
//! that unregisters queued ahead of a broadcast are applied before it. The
//! registry itself is a plain `HashMap` owned by that task, so no lock is
//! needed and every broadcast sees a settled snapshot.
//!
//! Each registry entry holds the only producer handle of a session's
//! outbound queue. Removing the entry drops that handle, which closes the
//! queue; this is the one place a queue is ever closed.

pub mod directory;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

use crate::session::SessionId;
use crate::transport::Payload;

/// Capacity of the register and broadcast control channels.
const CONTROL_CHANNEL_CAPACITY: usize = 1024;

/// Producer side of a session's outbound queue.
pub type Outbound = mpsc::Sender<Payload>;

/// The hub's reactor is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("hub reactor has stopped")]
pub struct HubClosed;

struct Registration {
    id: SessionId,
    outbound: Outbound,
    ack: oneshot::Sender<()>,
}

/// Cloneable handle to a running hub.
#[derive(Clone)]
pub struct Hub {
    name: Arc<str>,
    register_tx: mpsc::Sender<Registration>,
    // Unbounded so a closing session never waits on a busy reactor.
    unregister_tx: mpsc::UnboundedSender<SessionId>,
    broadcast_tx: mpsc::Sender<Payload>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    live: Arc<AtomicUsize>,
}

/// The reactor half of a hub. Drive it with [`HubReactor::run`].
pub struct HubReactor {
    name: Arc<str>,
    registry: HashMap<SessionId, Outbound>,
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::UnboundedReceiver<SessionId>,
    broadcast_rx: mpsc::Receiver<Payload>,
    shutdown_rx: watch::Receiver<bool>,
    live: Arc<AtomicUsize>,
}

impl Hub {
    /// Create a hub handle and its (not yet running) reactor.
    pub fn new(name: &str) -> (Hub, HubReactor) {
        let name: Arc<str> = Arc::from(name);
        let (register_tx, register_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let live = Arc::new(AtomicUsize::new(0));

        let hub = Hub {
            name: name.clone(),
            register_tx,
            unregister_tx,
            broadcast_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            live: live.clone(),
        };
        let reactor = HubReactor {
            name,
            registry: HashMap::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            shutdown_rx,
            live,
        };
        (hub, reactor)
    }

    /// Create a hub and start its reactor on the current runtime.
    pub fn spawn(name: &str) -> Hub {
        let (hub, reactor) = Self::new(name);
        tokio::spawn(reactor.run());
        hub
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a session to the registry. Resolves once the reactor has
    /// processed the request; registering an id twice keeps the first entry.
    pub async fn register(&self, id: SessionId, outbound: Outbound) -> Result<(), HubClosed> {
        let (ack, registered) = oneshot::channel();
        self.register_tx
            .send(Registration { id, outbound, ack })
            .await
            .map_err(|_| HubClosed)?;
        registered.await.map_err(|_| HubClosed)
    }

    /// Remove a session and close its outbound queue. Unknown or already
    /// removed sessions are ignored, as is a stopped hub.
    pub fn unregister(&self, id: &SessionId) {
        let _ = self.unregister_tx.send(id.clone());
    }

    /// Queue a message for fan-out to every registered session.
    pub async fn broadcast(&self, payload: Payload) -> Result<(), HubClosed> {
        self.broadcast_tx.send(payload).await.map_err(|_| HubClosed)
    }

    /// Number of registered sessions as of the reactor's last event.
    pub fn session_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Ask the reactor to stop. Every registered session's queue is closed.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        self.broadcast_tx.is_closed()
    }

    /// No sessions are registered and no other handle to this hub exists.
    pub(crate) fn is_unused(&self) -> bool {
        self.session_count() == 0 && Arc::strong_count(&self.shutdown_tx) == 1
    }
}

impl HubReactor {
    /// Run until [`Hub::shutdown`] is called or every [`Hub`] handle is gone.
    pub async fn run(mut self) {
        tracing::info!(room = %self.name, "hub reactor started");

        loop {
            // A pending shutdown wins over queued work.
            if self.shutdown_rx.has_changed().unwrap_or(true) {
                break;
            }

            tokio::select! {
                // Also fires when every handle (and so the sender) is dropped.
                _ = self.shutdown_rx.changed() => break,
                Some(registration) = self.register_rx.recv() => self.on_register(registration),
                Some(id) = self.unregister_rx.recv() => self.on_unregister(&id),
                Some(payload) = self.broadcast_rx.recv() => {
                    self.drain_unregisters();
                    self.on_broadcast(payload);
                }
                else => break,
            }
        }

        let ids: Vec<SessionId> = self.registry.keys().cloned().collect();
        let closed = ids.len();
        self.evict(ids);
        tracing::info!(room = %self.name, closed, "hub reactor stopped");
    }

    fn on_register(&mut self, registration: Registration) {
        let Registration { id, outbound, ack } = registration;
        match self.registry.entry(id) {
            Entry::Occupied(entry) => {
                tracing::debug!(room = %self.name, session_id = %entry.key(), "duplicate register ignored");
            }
            Entry::Vacant(entry) => {
                tracing::debug!(room = %self.name, session_id = %entry.key(), "session registered");
                entry.insert(outbound);
                self.publish_count();
            }
        }
        let _ = ack.send(());
    }

    fn on_unregister(&mut self, id: &SessionId) {
        if self.registry.contains_key(id) {
            tracing::debug!(room = %self.name, session_id = %id, "session unregistered");
            self.evict(vec![id.clone()]);
        }
    }

    /// Apply unregisters that are already queued, so a broadcast never
    /// reaches a session that left before it was sent.
    fn drain_unregisters(&mut self) {
        while let Ok(id) = self.unregister_rx.try_recv() {
            self.on_unregister(&id);
        }
    }

    fn on_broadcast(&mut self, payload: Payload) {
        let mut dropped = Vec::new();
        for (id, outbound) in &self.registry {
            match outbound.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        room = %self.name,
                        session_id = %id,
                        "outbound queue full, evicting slow consumer"
                    );
                    dropped.push(id.clone());
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(room = %self.name, session_id = %id, "outbound queue closed, evicting");
                    dropped.push(id.clone());
                }
            }
        }
        if !dropped.is_empty() {
            self.evict(dropped);
        }
    }

    /// Remove sessions and close their queues.
    fn evict(&mut self, ids: Vec<SessionId>) {
        let closing: Vec<Outbound> = ids
            .iter()
            .filter_map(|id| self.registry.remove(id))
            .collect();
        // Publish before the queues close so anyone observing a closed queue
        // also observes the new count.
        self.publish_count();
        drop(closing);
    }

    fn publish_count(&self) {
        self.live.store(self.registry.len(), Ordering::Release);
    }
}
