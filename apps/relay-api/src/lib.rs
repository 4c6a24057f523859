pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod routes;
pub mod session;
pub mod transport;

use std::sync::Arc;

use config::Config;
use hub::directory::RoomDirectory;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomDirectory>,
}

impl AppState {
    /// Build the state, start the default room's hub and, if configured,
    /// the idle room reaper.
    pub fn new(config: Config) -> Self {
        let rooms = Arc::new(RoomDirectory::new(config.default_room.clone()));
        if let Some(every) = config.room_reap_interval {
            RoomDirectory::spawn_reaper(&rooms, every);
        }
        Self {
            config: Arc::new(config),
            rooms,
        }
    }
}
