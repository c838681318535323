//! Request handlers.

mod http;
mod websocket;

pub use http::{get_active_rooms, get_room_messages, get_room_participants, health_check};
pub use websocket::websocket_handler;

use std::str::FromStr;

use axum::{Json, http::StatusCode};

use crate::{
    domain::RoomId,
    infrastructure::dto::http::ErrorResponseDto,
    usecase::AuthError,
};

/// Error response: status code plus `{"error": "..."}`
pub(crate) type ApiError = (StatusCode, Json<ErrorResponseDto>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponseDto {
            error: error.into(),
        }),
    )
}

pub(crate) fn parse_room_id(raw: &str) -> Result<RoomId, ApiError> {
    RoomId::from_str(raw).map_err(|e| {
        tracing::debug!("Rejected room id '{}': {}", raw, e);
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    })
}

pub(crate) fn auth_error_response(error: AuthError) -> ApiError {
    match error {
        AuthError::InvalidToken => api_error(StatusCode::UNAUTHORIZED, error.to_string()),
        AuthError::Unavailable(_) => {
            api_error(StatusCode::SERVICE_UNAVAILABLE, "auth service unavailable")
        }
    }
}
