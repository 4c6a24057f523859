pub mod health;
pub mod rooms;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest("/api/v1", rooms::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        rooms::list_rooms,
        rooms::get_room,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            health::HealthResponse,
            rooms::RoomInfo,
            rooms::ListRoomsResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Rooms", description = "Room introspection"),
    )
)]
pub struct ApiDoc;
