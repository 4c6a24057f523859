//! Named rooms, one hub per room.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::Hub;

/// Longest accepted room name.
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Room names are 1–64 characters of ASCII letters, digits, `-`, `_` or `.`.
pub fn is_valid_room_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_ROOM_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Registry of running hubs keyed by room name.
///
/// Hubs are created on first use. The default room lives until
/// [`RoomDirectory::shutdown_all`]; other rooms are dropped by
/// [`RoomDirectory::reap_idle`] once nothing uses them.
pub struct RoomDirectory {
    hubs: DashMap<String, Hub>,
    default_room: String,
}

impl RoomDirectory {
    /// Create the directory and start the default room's hub.
    pub fn new(default_room: impl Into<String>) -> Self {
        let default_room = default_room.into();
        let hubs = DashMap::new();
        hubs.insert(default_room.clone(), Hub::spawn(&default_room));
        Self { hubs, default_room }
    }

    pub fn default_room(&self) -> &str {
        &self.default_room
    }

    /// Hub for `room`, starting one if it does not exist yet.
    pub fn get_or_create(&self, room: &str) -> Hub {
        if let Some(hub) = self.hubs.get(room) {
            return hub.clone();
        }
        self.hubs
            .entry(room.to_string())
            .or_insert_with(|| {
                tracing::info!(room, "room created");
                Hub::spawn(room)
            })
            .clone()
    }

    pub fn get(&self, room: &str) -> Option<Hub> {
        self.hubs.get(room).map(|hub| hub.clone())
    }

    /// `(room, sessions)` for every room, sorted by name.
    pub fn rooms(&self) -> Vec<(String, usize)> {
        let mut rooms: Vec<(String, usize)> = self
            .hubs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().session_count()))
            .collect();
        rooms.sort_by(|a, b| a.0.cmp(&b.0));
        rooms
    }

    pub fn total_sessions(&self) -> usize {
        self.hubs.iter().map(|entry| entry.value().session_count()).sum()
    }

    /// Remove and stop every non-default room that has no sessions and no
    /// handle outside the directory. Returns how many rooms were removed.
    pub fn reap_idle(&self) -> usize {
        let candidates: Vec<String> = self
            .hubs
            .iter()
            .filter(|entry| entry.key() != &self.default_room && entry.value().is_unused())
            .map(|entry| entry.key().clone())
            .collect();

        let mut reaped = 0;
        for room in candidates {
            // Re-checked under the shard lock: a concurrent `get_or_create`
            // either sees the entry gone or holds a handle that blocks removal.
            if let Some((room, hub)) = self.hubs.remove_if(&room, |_, hub| hub.is_unused()) {
                hub.shutdown();
                tracing::info!(room = %room, "idle room reaped");
                reaped += 1;
            }
        }
        reaped
    }

    /// Run [`RoomDirectory::reap_idle`] every `every` until the directory is dropped.
    pub fn spawn_reaper(rooms: &Arc<RoomDirectory>, every: Duration) -> JoinHandle<()> {
        let rooms = Arc::downgrade(rooms);
        tokio::spawn(async move {
            let mut ticks = time::interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(rooms) = rooms.upgrade() else {
                    break;
                };
                rooms.reap_idle();
            }
        })
    }

    /// Stop every hub; connected sessions receive a close notification.
    pub fn shutdown_all(&self) {
        for entry in self.hubs.iter() {
            entry.value().shutdown();
        }
        tracing::info!(rooms = self.hubs.len(), "all hubs shut down");
    }
}
