use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::hub::directory::is_valid_room_name;

/// Relay API configuration, loaded from environment variables.
///
/// Every variable is optional; unset or unparsable values fall back to the
/// defaults below.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface the HTTP server binds to.
    pub host: IpAddr,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Room served at `/ws`.
    pub default_room: String,
    /// Pending messages buffered per session before it counts as a slow consumer.
    pub outbound_queue_capacity: usize,
    /// WebSocket read buffer size in bytes.
    pub read_buffer_size: usize,
    /// WebSocket write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
    /// Origins allowed to connect. `None` accepts any origin.
    pub allowed_origins: Option<Vec<String>>,
    /// Cap on concurrent sessions across all rooms. `None` is unlimited.
    pub max_connections: Option<usize>,
    /// Close sessions whose peer stays silent this long.
    pub idle_timeout: Option<Duration>,
    /// Deadline for a single transport write.
    pub write_timeout: Option<Duration>,
    /// How often empty rooms other than the default one are removed.
    pub room_reap_interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            default_room: "lobby".to_string(),
            outbound_queue_capacity: 256,
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            max_message_size: 64 * 1024,
            allowed_origins: None,
            max_connections: None,
            idle_timeout: None,
            write_timeout: Some(Duration::from_secs(10)),
            room_reap_interval: Some(Duration::from_secs(60)),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: parsed(&var, "HOST").unwrap_or(defaults.host),
            port: parsed(&var, "PORT").unwrap_or(defaults.port),
            default_room: var("DEFAULT_ROOM")
                .filter(|room| valid_default_room(room))
                .unwrap_or(defaults.default_room),
            outbound_queue_capacity: parsed(&var, "OUTBOUND_QUEUE_CAPACITY")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.outbound_queue_capacity),
            read_buffer_size: parsed(&var, "READ_BUFFER_SIZE").unwrap_or(defaults.read_buffer_size),
            write_buffer_size: parsed(&var, "WRITE_BUFFER_SIZE").unwrap_or(defaults.write_buffer_size),
            max_message_size: parsed(&var, "MAX_MESSAGE_SIZE").unwrap_or(defaults.max_message_size),
            allowed_origins: var("ALLOWED_ORIGINS").and_then(|v| origin_list(&v)),
            max_connections: parsed(&var, "MAX_CONNECTIONS").filter(|&n: &usize| n > 0),
            idle_timeout: parsed(&var, "IDLE_TIMEOUT_SECS").and_then(seconds),
            write_timeout: match parsed(&var, "WRITE_TIMEOUT_SECS") {
                Some(secs) => seconds(secs),
                None => defaults.write_timeout,
            },
            room_reap_interval: match parsed(&var, "ROOM_REAP_INTERVAL_SECS") {
                Some(secs) => seconds(secs),
                None => defaults.room_reap_interval,
            },
        }
    }
}

fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let value = var(name)?;
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(name, value = %value, "ignoring unparsable env var");
            None
        }
    }
}

fn valid_default_room(room: &str) -> bool {
    let valid = is_valid_room_name(room);
    if !valid {
        tracing::warn!(room, "ignoring invalid DEFAULT_ROOM");
    }
    valid
}

/// Zero disables the timeout.
fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn origin_list(value: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = value
        .split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();
    (!origins.is_empty()).then_some(origins)
}
