//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

use super::websocket::MessageDto;

/// Query parameters of the message history endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Message history page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponseDto {
    pub room_id: String,
    pub limit: u32,
    pub offset: u32,
    pub messages: Vec<MessageDto>,
}

/// Active room summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRoomDto {
    pub room_id: String,
    pub participants: Vec<String>,
    /// RFC 3339
    pub last_activity: String,
}

/// Participants of one active room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomParticipantsDto {
    pub room_id: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponseDto {
    pub error: String,
}
