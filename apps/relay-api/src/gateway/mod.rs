//! Connection gateway: turns upgrade requests into running sessions.

pub mod server;
