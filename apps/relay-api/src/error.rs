use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// A connection attempt rejected before any session exists.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    #[error("origin {0} is not allowed")]
    OriginRejected(String),
    #[error("invalid room name")]
    InvalidRoom,
    #[error("connection limit of {0} reached")]
    ConnectionLimit(usize),
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] WebSocketUpgradeRejection),
}

impl From<UpgradeError> for ApiError {
    fn from(err: UpgradeError) -> Self {
        tracing::debug!(error = %err, "upgrade rejected");
        match err {
            UpgradeError::OriginRejected(_) => Self::forbidden(err.to_string()),
            UpgradeError::InvalidRoom => Self::bad_request(err.to_string()),
            UpgradeError::ConnectionLimit(_) => Self::service_unavailable(err.to_string()),
            UpgradeError::Handshake(rejection) => Self::new(
                rejection.status(),
                "HANDSHAKE_FAILED",
                rejection.body_text(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_errors_map_to_statuses() {
        let origin: ApiError = UpgradeError::OriginRejected("http://evil.test".into()).into();
        assert_eq!(origin.status, StatusCode::FORBIDDEN);
        assert!(origin.message.contains("http://evil.test"));

        let room: ApiError = UpgradeError::InvalidRoom.into();
        assert_eq!(room.status, StatusCode::BAD_REQUEST);

        let limit: ApiError = UpgradeError::ConnectionLimit(10).into();
        assert_eq!(limit.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(limit.code, "SERVICE_UNAVAILABLE");
    }
}
