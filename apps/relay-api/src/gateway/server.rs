//! WebSocket upgrade endpoints.
//!
//! `GET /ws` joins the default room and `GET /ws/{room}` a named one. Every
//! admission check runs before the handshake completes, so a rejected
//! request never reaches a hub.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::header::ORIGIN;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::error::{ApiError, UpgradeError};
use crate::hub::directory::is_valid_room_name;
use crate::session::{Session, SessionConfig};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_default))
        .route("/ws/{room}", get(ws_room))
}

async fn ws_default(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let room = state.config.default_room.clone();
    accept(state, &headers, ws, &room).map_err(ApiError::from)
}

async fn ws_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    if !is_valid_room_name(&room) {
        return Err(UpgradeError::InvalidRoom.into());
    }
    accept(state, &headers, ws, &room).map_err(ApiError::from)
}

fn accept(
    state: AppState,
    headers: &HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    room: &str,
) -> Result<Response, UpgradeError> {
    let config = state.config.clone();
    check_origin(config.allowed_origins.as_deref(), headers)?;
    let ws = ws?;

    if let Some(limit) = config.max_connections {
        // Counts registered sessions only; upgrades in flight can overshoot slightly.
        if state.rooms.total_sessions() >= limit {
            return Err(UpgradeError::ConnectionLimit(limit));
        }
    }

    let hub = state.rooms.get_or_create(room);
    let session_config = SessionConfig::from(&*config);

    Ok(ws
        .read_buffer_size(config.read_buffer_size)
        .write_buffer_size(config.write_buffer_size)
        .max_message_size(config.max_message_size)
        .on_failed_upgrade(|e| tracing::debug!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            let session = Session::new(hub, socket, session_config);
            tracing::debug!(session_id = %session.id(), "connection upgraded");
            session.run().await;
        }))
}

/// Enforce the origin allow-list, if one is configured. Requests without an
/// `Origin` header come from non-browser clients and are let through.
fn check_origin(allowed: Option<&[String]>, headers: &HeaderMap) -> Result<(), UpgradeError> {
    let Some(allowed) = allowed else {
        return Ok(());
    };
    let Some(value) = headers.get(ORIGIN) else {
        return Ok(());
    };

    let origin = value.to_str().unwrap_or_default().trim_end_matches('/');
    if allowed.iter().any(|a| a == origin) {
        Ok(())
    } else {
        Err(UpgradeError::OriginRejected(origin.to_string()))
    }
}
