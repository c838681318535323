//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
};

use crate::{
    infrastructure::dto::{
        http::{ActiveRoomDto, MessagesQuery, MessagesResponseDto, RoomParticipantsDto},
        websocket::MessageDto,
    },
    ui::state::AppState,
    usecase::{AuthError, GetMessagesError},
};

use super::{ApiError, api_error, auth_error_response, parse_room_id};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Rooms that currently have at least one connection
pub async fn get_active_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<ActiveRoomDto>> {
    let rooms = state.list_active_rooms_usecase.execute().await;

    // Domain Model から DTO への変換
    Json(rooms.into_iter().map(ActiveRoomDto::from).collect())
}

/// Connected users of one active room
pub async fn get_room_participants(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomParticipantsDto>, ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let Some(participants) = state
        .list_active_rooms_usecase
        .participants(&room_id)
        .await
    else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("room '{}' is not active", room_id),
        ));
    };
    Ok(Json(RoomParticipantsDto {
        room_id: room_id.to_string(),
        participants: participants.iter().map(ToString::to_string).collect(),
    }))
}

/// Message history of a room, newest first
///
/// Requires `Authorization: Bearer <token>`.
pub async fn get_room_messages(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
) -> Result<Json<MessagesResponseDto>, ApiError> {
    let token = bearer_token(&headers).ok_or_else(|| auth_error_response(AuthError::InvalidToken))?;
    let user = state
        .authenticate_usecase
        .execute(token)
        .await
        .map_err(auth_error_response)?;
    let room_id = parse_room_id(&room_id)?;

    let page = state
        .get_messages_usecase
        .execute(room_id, query.limit.unwrap_or(0), query.offset.unwrap_or(0))
        .await
        .map_err(|e| match e {
            GetMessagesError::Persistence(err) => {
                tracing::error!("Failed to load history of room '{}': {}", room_id, err);
                api_error(StatusCode::SERVICE_UNAVAILABLE, "message store unavailable")
            }
        })?;

    tracing::debug!(
        "User '{}' fetched {} message(s) of room '{}'",
        user.user_id,
        page.messages.len(),
        room_id
    );
    Ok(Json(MessagesResponseDto {
        room_id: room_id.to_string(),
        limit: page.pagination.limit(),
        offset: page.pagination.offset(),
        messages: page.messages.into_iter().map(MessageDto::from).collect(),
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
