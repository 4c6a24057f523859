//! Read-only room introspection.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{room}", get(get_room))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomInfo {
    pub name: String,
    /// Sessions currently registered with the room's hub.
    pub sessions: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListRoomsResponse {
    pub rooms: Vec<RoomInfo>,
    pub total_sessions: usize,
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    responses((status = 200, description = "All rooms with live session counts", body = ListRoomsResponse)),
)]
pub async fn list_rooms(State(state): State<AppState>) -> Json<ListRoomsResponse> {
    let rooms: Vec<RoomInfo> = state
        .rooms
        .rooms()
        .into_iter()
        .map(|(name, sessions)| RoomInfo { name, sessions })
        .collect();
    let total_sessions = rooms.iter().map(|r| r.sessions).sum();

    Json(ListRoomsResponse {
        rooms,
        total_sessions,
    })
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/:room
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room}",
    tag = "Rooms",
    params(("room" = String, Path, description = "Room name")),
    responses(
        (status = 200, description = "Room found", body = RoomInfo),
        (status = 404, description = "No such room", body = ApiErrorBody),
    ),
)]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<RoomInfo>, ApiError> {
    let hub = state
        .rooms
        .get(&room)
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    Ok(Json(RoomInfo {
        name: room,
        sessions: hub.session_count(),
    }))
}
